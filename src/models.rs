use serde::{Deserialize, Serialize};

use crate::classifier::SizeCategory;
use crate::format::{format_size, format_total_size};

/// Metadata of one fetched message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSummary {
    pub id: String,
    pub size_estimate: u64,
    pub subject: String,
    pub thread_id: String,
}

impl MessageSummary {
    /// Size as shown next to a single message, e.g. `"87.9KB"`
    pub fn size_formatted(&self) -> String {
        format_size(self.size_estimate)
    }
}

/// Messages of one size category plus summary statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryBucket {
    pub items: Vec<MessageSummary>,
    pub count: usize,
    pub total_size_bytes: u64,
    pub total_size_formatted: String,
}

impl Default for CategoryBucket {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            count: 0,
            total_size_bytes: 0,
            total_size_formatted: format_total_size(0),
        }
    }
}

impl CategoryBucket {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One bucket per size category. All three are always present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    #[serde(rename = "Small")]
    small: CategoryBucket,
    #[serde(rename = "Medium")]
    medium: CategoryBucket,
    #[serde(rename = "Large")]
    large: CategoryBucket,
}

impl ClassificationResult {
    pub fn bucket(&self, category: SizeCategory) -> &CategoryBucket {
        match category {
            SizeCategory::Small => &self.small,
            SizeCategory::Medium => &self.medium,
            SizeCategory::Large => &self.large,
        }
    }

    pub(crate) fn bucket_mut(&mut self, category: SizeCategory) -> &mut CategoryBucket {
        match category {
            SizeCategory::Small => &mut self.small,
            SizeCategory::Medium => &mut self.medium,
            SizeCategory::Large => &mut self.large,
        }
    }

    /// Buckets in display order
    pub fn iter(&self) -> impl Iterator<Item = (SizeCategory, &CategoryBucket)> + '_ {
        SizeCategory::DISPLAY_ORDER
            .iter()
            .map(move |&category| (category, self.bucket(category)))
    }

    pub fn total_count(&self) -> usize {
        self.iter().map(|(_, bucket)| bucket.count).sum()
    }

    pub fn total_size_bytes(&self) -> u64 {
        self.iter()
            .fold(0u64, |total, (_, bucket)| total.saturating_add(bucket.total_size_bytes))
    }
}
