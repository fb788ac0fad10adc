//! Gmail message listing for the size report

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use google_gmail1::{
    api::Message,
    hyper_rustls::{self, HttpsConnector},
    hyper_util::{self, client::legacy::connect::HttpConnector},
    Gmail,
};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::auth::{AccessToken, READONLY_SCOPES};
use crate::config::FetchConfig;
use crate::error::{GmailError, Result};
use crate::models::MessageSummary;

/// Type alias for Gmail Hub to simplify type signatures
pub type GmailHub = Gmail<HttpsConnector<HttpConnector>>;

/// Remote source of message metadata
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Fetch at most `limit` messages from a single listing page
    async fn list_messages(&self, token: &AccessToken, limit: u32) -> Result<Vec<MessageSummary>>;
}

/// Message source backed by the Gmail REST API
///
/// A hub is built per call around the caller's access token, so no
/// credential outlives the request that supplied it.
pub struct GmailMessageSource {
    connector: HttpsConnector<HttpConnector>,
    max_concurrent: usize,
    request_timeout: Duration,
}

impl GmailMessageSource {
    pub fn new(max_concurrent: usize, request_timeout: Duration) -> Result<Self> {
        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(|e| GmailError::ConfigError(format!("Failed to load TLS roots: {}", e)))?
            .https_or_http()
            .enable_http1()
            .build();

        Ok(Self {
            connector,
            max_concurrent: max_concurrent.max(1),
            request_timeout,
        })
    }

    pub fn from_config(config: &FetchConfig) -> Result<Self> {
        Self::new(
            config.max_concurrent_requests,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn hub(&self, token: &AccessToken) -> GmailHub {
        let client = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
            .build(self.connector.clone());
        Gmail::new(client, token.secret().to_string())
    }

    async fn list_message_ids(&self, hub: &GmailHub, limit: u32) -> Result<Vec<String>> {
        let call = hub
            .users()
            .messages_list("me")
            .max_results(limit)
            .add_scope(READONLY_SCOPES[0])
            .doit();
        let (_, response) = with_timeout(self.request_timeout, "messages.list", call).await?;

        let ids: Vec<String> = response
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|msg_ref| msg_ref.id)
            .collect();

        if response.next_page_token.is_some() {
            debug!("More messages available beyond the first page; not fetched");
        }

        Ok(ids)
    }

    async fn fetch_summary(&self, hub: &GmailHub, id: &str) -> Result<MessageSummary> {
        let call = hub
            .users()
            .messages_get("me", id)
            .format("metadata")
            .add_metadata_headers("Subject")
            .add_scope(READONLY_SCOPES[0])
            .doit();
        let (_, message) = with_timeout(self.request_timeout, "messages.get", call).await?;
        parse_message_summary(message)
    }
}

#[async_trait]
impl MessageSource for GmailMessageSource {
    async fn list_messages(&self, token: &AccessToken, limit: u32) -> Result<Vec<MessageSummary>> {
        let hub = self.hub(token);
        let ids = self.list_message_ids(&hub, limit).await?;
        debug!("Listed {} message ids (limit {})", ids.len(), limit);

        let hub = &hub;
        let summaries = fetch_in_order(ids, self.max_concurrent, |id| async move {
            self.fetch_summary(hub, &id).await
        })
        .await?;

        info!("Fetched metadata for {} messages", summaries.len());
        Ok(summaries)
    }
}

/// Fetch every id with bounded concurrency, keeping the input order
///
/// The first failing fetch fails the whole batch.
async fn fetch_in_order<F, Fut>(
    ids: Vec<String>,
    max_concurrent: usize,
    fetch: F,
) -> Result<Vec<MessageSummary>>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<MessageSummary>>,
{
    // `buffered` keeps the listing order, which fixes the order of
    // equally-sized messages after the stable sort
    stream::iter(ids)
        .map(fetch)
        .buffered(max_concurrent.max(1))
        .try_collect()
        .await
}

/// Run one API call under a timeout
async fn with_timeout<T, F>(timeout: Duration, operation_name: &str, call: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, google_gmail1::Error>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result.map_err(GmailError::from),
        Err(_) => {
            warn!("Gmail API {} call timed out after {:?}", operation_name, timeout);
            Err(GmailError::NetworkError(format!(
                "API call timed out after {:?}",
                timeout
            )))
        }
    }
}

/// Convert a Gmail API message into a summary
///
/// `id`, `threadId` and `sizeEstimate` are required; a negative size estimate
/// is rejected. A missing `Subject` header yields an empty subject.
pub fn parse_message_summary(msg: Message) -> Result<MessageSummary> {
    let id = msg
        .id
        .ok_or_else(|| GmailError::InvalidMessageFormat("Missing message ID".to_string()))?;

    let thread_id = msg.thread_id.ok_or_else(|| {
        GmailError::InvalidMessageFormat(format!("Message {} has no thread ID", id))
    })?;

    let raw_size = msg.size_estimate.ok_or_else(|| {
        GmailError::InvalidMessageFormat(format!("Message {} has no size estimate", id))
    })?;
    let size_estimate = u64::try_from(raw_size).map_err(|_| {
        GmailError::InvalidMessageFormat(format!(
            "Message {} has negative size estimate {}",
            id, raw_size
        ))
    })?;

    let subject = msg
        .payload
        .as_ref()
        .and_then(|p| p.headers.as_ref())
        .and_then(|headers| {
            headers.iter().find_map(|header| match (&header.name, &header.value) {
                (Some(name), Some(value)) if name.eq_ignore_ascii_case("subject") => {
                    Some(value.clone())
                }
                _ => None,
            })
        })
        .unwrap_or_default();

    Ok(MessageSummary {
        id,
        size_estimate,
        subject,
        thread_id,
    })
}
