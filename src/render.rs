//! HTML rendering of the index page

use std::fmt::Write as _;

use crate::classifier::SizeCategory;
use crate::models::{CategoryBucket, ClassificationResult};

/// Everything the index page shows
#[derive(Debug, Default)]
pub struct IndexView<'a> {
    pub authenticated: bool,
    pub error: Option<&'a str>,
    pub max_results: Option<u32>,
    pub result: Option<&'a ClassificationResult>,
}

pub fn render_index(view: &IndexView<'_>) -> String {
    let mut body = String::new();

    if let Some(error) = view.error {
        let _ = write!(body, "<p class=\"error\">{}</p>\n", escape_html(error));
    }

    match (view.authenticated, view.result) {
        (true, Some(result)) => {
            render_limit_form(&mut body, view.max_results);
            render_summary(&mut body, result);
            for (category, bucket) in result.iter() {
                render_bucket(&mut body, category, bucket);
            }
        }
        _ => {
            body.push_str("<p>Sign in with Google to see your messages grouped by size.</p>\n");
            body.push_str("<p><a class=\"login\" href=\"/login\">Login with Gmail</a></p>\n");
        }
    }

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Gmail Size Sorter</title>\n<style>{}</style>\n</head>\n<body>\n\
         <h1>Gmail Size Sorter</h1>\n{}</body>\n</html>\n",
        STYLE, body
    )
}

const STYLE: &str = "body{font-family:sans-serif;margin:2em}\
table{border-collapse:collapse;width:100%;margin-bottom:2em}\
th,td{border:1px solid #ccc;padding:4px 8px;text-align:left}\
td.size{text-align:right;white-space:nowrap}\
.error{color:#b00020}";

fn render_limit_form(body: &mut String, max_results: Option<u32>) {
    let value = max_results.map(|v| v.to_string()).unwrap_or_default();
    let _ = write!(
        body,
        "<form method=\"get\" action=\"/\">\n\
         <label for=\"max_results\">Messages to scan:</label>\n\
         <input type=\"number\" id=\"max_results\" name=\"max_results\" min=\"1\" value=\"{}\">\n\
         <button type=\"submit\">Refresh</button>\n</form>\n",
        value
    );
}

fn render_summary(body: &mut String, result: &ClassificationResult) {
    body.push_str("<table class=\"stats\">\n<tr><th>Category</th><th>Count</th><th>Total size</th></tr>\n");
    for (category, bucket) in result.iter() {
        let _ = write!(
            body,
            "<tr><td>{}</td><td>{}</td><td class=\"size\">{}</td></tr>\n",
            category, bucket.count, bucket.total_size_formatted
        );
    }
    body.push_str("</table>\n");
}

fn render_bucket(body: &mut String, category: SizeCategory, bucket: &CategoryBucket) {
    let _ = write!(
        body,
        "<h2>{} ({} messages, {})</h2>\n",
        category, bucket.count, bucket.total_size_formatted
    );

    if bucket.is_empty() {
        body.push_str("<p class=\"empty\">No messages.</p>\n");
        return;
    }

    body.push_str("<table>\n<tr><th>Subject</th><th>Size</th><th>Thread</th></tr>\n");
    for message in &bucket.items {
        let subject = if message.subject.is_empty() {
            "(no subject)".to_string()
        } else {
            escape_html(&message.subject)
        };
        let _ = write!(
            body,
            "<tr><td>{}</td><td class=\"size\">{}</td><td>{}</td></tr>\n",
            subject,
            message.size_formatted(),
            escape_html(&message.thread_id)
        );
    }
    body.push_str("</table>\n");
}

/// Escape text for use in HTML element content and quoted attributes
pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
