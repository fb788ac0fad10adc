//! Size-based message classification

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{GmailError, Result};

/// Messages below this size are Small (100 KiB)
pub const DEFAULT_MEDIUM_MIN_BYTES: u64 = 100 * 1024;

/// Messages at or above this size are Large (1 MiB)
pub const DEFAULT_LARGE_MIN_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SizeCategory {
    Small,
    Medium,
    Large,
}

impl SizeCategory {
    /// Order in which categories are rendered, smallest first
    pub const DISPLAY_ORDER: [SizeCategory; 3] =
        [SizeCategory::Small, SizeCategory::Medium, SizeCategory::Large];

    pub fn label(&self) -> &'static str {
        match self {
            SizeCategory::Small => "Small",
            SizeCategory::Medium => "Medium",
            SizeCategory::Large => "Large",
        }
    }
}

impl fmt::Display for SizeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Anything that assigns a category to a byte count
pub trait SizeClassifier {
    fn classify(&self, size_bytes: u64) -> SizeCategory;
}

impl<F> SizeClassifier for F
where
    F: Fn(u64) -> SizeCategory,
{
    fn classify(&self, size_bytes: u64) -> SizeCategory {
        self(size_bytes)
    }
}

/// Threshold table for the three categories
///
/// `[0, medium_min_bytes)` is Small, `[medium_min_bytes, large_min_bytes)` is
/// Medium and `[large_min_bytes, ∞)` is Large. The ranges never overlap and
/// leave no gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeThresholds {
    medium_min_bytes: u64,
    large_min_bytes: u64,
}

impl Default for SizeThresholds {
    fn default() -> Self {
        Self {
            medium_min_bytes: DEFAULT_MEDIUM_MIN_BYTES,
            large_min_bytes: DEFAULT_LARGE_MIN_BYTES,
        }
    }
}

impl SizeThresholds {
    /// Build a threshold table, requiring `0 < medium_min_bytes < large_min_bytes`
    pub fn new(medium_min_bytes: u64, large_min_bytes: u64) -> Result<Self> {
        if medium_min_bytes == 0 {
            return Err(GmailError::ConfigError(
                "medium threshold must be greater than 0".to_string(),
            ));
        }
        if medium_min_bytes >= large_min_bytes {
            return Err(GmailError::ConfigError(format!(
                "medium threshold ({}) must be below large threshold ({})",
                medium_min_bytes, large_min_bytes
            )));
        }
        Ok(Self {
            medium_min_bytes,
            large_min_bytes,
        })
    }

    pub fn medium_min_bytes(&self) -> u64 {
        self.medium_min_bytes
    }

    pub fn large_min_bytes(&self) -> u64 {
        self.large_min_bytes
    }

    /// Classify a size held in a signed integer, rejecting negative values
    pub fn classify_signed(&self, size_bytes: i64) -> Result<SizeCategory> {
        u64::try_from(size_bytes)
            .map(|size| self.classify(size))
            .map_err(|_| GmailError::InvalidSize(size_bytes))
    }
}

impl SizeClassifier for SizeThresholds {
    fn classify(&self, size_bytes: u64) -> SizeCategory {
        if size_bytes < self.medium_min_bytes {
            SizeCategory::Small
        } else if size_bytes < self.large_min_bytes {
            SizeCategory::Medium
        } else {
            SizeCategory::Large
        }
    }
}

/// Classify with the default thresholds
pub fn classify(size_bytes: u64) -> SizeCategory {
    SizeThresholds::default().classify(size_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries() {
        assert_eq!(classify(0), SizeCategory::Small);
        assert_eq!(classify(102399), SizeCategory::Small);
        assert_eq!(classify(102400), SizeCategory::Medium);
        assert_eq!(classify(1048575), SizeCategory::Medium);
        assert_eq!(classify(1048576), SizeCategory::Large);
        assert_eq!(classify(u64::MAX), SizeCategory::Large);
    }

    #[test]
    fn test_negative_size_rejected() {
        let thresholds = SizeThresholds::default();
        let result = thresholds.classify_signed(-1);
        assert!(matches!(result, Err(GmailError::InvalidSize(-1))));
        assert_eq!(thresholds.classify_signed(0).unwrap(), SizeCategory::Small);
        assert_eq!(
            thresholds.classify_signed(2_000_000).unwrap(),
            SizeCategory::Large
        );
    }

    #[test]
    fn test_custom_thresholds() {
        let thresholds = SizeThresholds::new(10, 20).unwrap();
        assert_eq!(thresholds.classify(9), SizeCategory::Small);
        assert_eq!(thresholds.classify(10), SizeCategory::Medium);
        assert_eq!(thresholds.classify(19), SizeCategory::Medium);
        assert_eq!(thresholds.classify(20), SizeCategory::Large);
    }

    #[test]
    fn test_invalid_thresholds() {
        assert!(SizeThresholds::new(0, 20).is_err());
        assert!(SizeThresholds::new(20, 20).is_err());
        let err = SizeThresholds::new(30, 20).unwrap_err();
        assert!(err.to_string().contains("must be below large threshold"));
    }

    #[test]
    fn test_closure_classifier() {
        let everything_large = |_: u64| SizeCategory::Large;
        assert_eq!(everything_large.classify(1), SizeCategory::Large);
    }

    #[test]
    fn test_category_labels() {
        assert_eq!(SizeCategory::Small.to_string(), "Small");
        assert_eq!(SizeCategory::Medium.label(), "Medium");
        assert_eq!(SizeCategory::Large.label(), "Large");
    }
}
