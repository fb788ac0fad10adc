//! Bounds on the `max_results` request parameter

use std::num::IntErrorKind;

use crate::error::{GmailError, Result};

pub const DEFAULT_MAX_RESULTS: u32 = 1000;
pub const MIN_MAX_RESULTS: u32 = 1;
pub const MAX_MAX_RESULTS: u32 = 5000;

/// Default and inclusive range applied to `max_results`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLimits {
    default: u32,
    min: u32,
    max: u32,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            default: DEFAULT_MAX_RESULTS,
            min: MIN_MAX_RESULTS,
            max: MAX_MAX_RESULTS,
        }
    }
}

impl RequestLimits {
    pub fn new(default: u32, min: u32, max: u32) -> Result<Self> {
        if min > max {
            return Err(GmailError::ConfigError(format!(
                "max_results lower bound ({}) exceeds upper bound ({})",
                min, max
            )));
        }
        if default < min || default > max {
            return Err(GmailError::ConfigError(format!(
                "default max_results ({}) must lie within [{}, {}]",
                default, min, max
            )));
        }
        Ok(Self { default, min, max })
    }

    pub fn default_limit(&self) -> u32 {
        self.default
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    /// Resolve a raw query value into a fetch bound
    ///
    /// Missing or non-numeric input falls back to the default. Numbers are
    /// clamped into `[min, max]`, including ones too large for `i64`.
    pub fn clamp(&self, raw: Option<&str>) -> u32 {
        let Some(raw) = raw else {
            return self.default;
        };

        match raw.trim().parse::<i64>() {
            Ok(value) => value.clamp(i64::from(self.min), i64::from(self.max)) as u32,
            Err(e) => match e.kind() {
                IntErrorKind::PosOverflow => self.max,
                IntErrorKind::NegOverflow => self.min,
                _ => self.default,
            },
        }
    }
}

/// Clamp `max_results` with the default bounds (1000, 1..=5000)
pub fn clamp_request_limit(raw: Option<&str>) -> u32 {
    RequestLimits::default().clamp(raw)
}
