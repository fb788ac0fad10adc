//! Grouping of classified messages into size buckets

use tracing::debug;

use crate::classifier::SizeClassifier;
use crate::format::format_total_size;
use crate::models::{ClassificationResult, MessageSummary};

/// Group messages by size category
///
/// Each bucket ends up sorted by size, largest first. The sort is stable so
/// messages of equal size keep their input order. Byte totals saturate at
/// `u64::MAX`.
pub fn aggregate<I, C>(messages: I, classifier: &C) -> ClassificationResult
where
    I: IntoIterator<Item = MessageSummary>,
    C: SizeClassifier + ?Sized,
{
    let mut result = ClassificationResult::default();

    for message in messages {
        let category = classifier.classify(message.size_estimate);
        let bucket = result.bucket_mut(category);
        bucket.count += 1;
        bucket.total_size_bytes = bucket.total_size_bytes.saturating_add(message.size_estimate);
        bucket.items.push(message);
    }

    for category in crate::classifier::SizeCategory::DISPLAY_ORDER {
        let bucket = result.bucket_mut(category);
        bucket
            .items
            .sort_by(|a, b| b.size_estimate.cmp(&a.size_estimate));
        bucket.total_size_formatted = format_total_size(bucket.total_size_bytes);
        debug!(
            "{} bucket: {} messages, {}",
            category, bucket.count, bucket.total_size_formatted
        );
    }

    result
}
