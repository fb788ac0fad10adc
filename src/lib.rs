//! Gmail Size Sorter
//!
//! A small web application that signs a user in with Google, reads the
//! metadata of their most recent Gmail messages and groups them by size.
//!
//! # Overview
//!
//! - **Authentication**: OAuth2 authorization code flow with per-session credentials
//! - **Fetching**: concurrent metadata retrieval through the Gmail API
//! - **Classification**: Small (< 100 KiB), Medium (< 1 MiB) and Large buckets
//! - **Reporting**: an HTML page and a JSON endpoint with per-bucket totals
//!
//! # Example Usage
//!
//! ```
//! use gmail_size_sorter::{aggregate, MessageSummary, SizeCategory, SizeThresholds};
//!
//! let messages = vec![MessageSummary {
//!     id: "m1".to_string(),
//!     size_estimate: 2_000_000,
//!     subject: "Holiday photos".to_string(),
//!     thread_id: "t1".to_string(),
//! }];
//!
//! let result = aggregate(messages, &SizeThresholds::default());
//! assert_eq!(result.bucket(SizeCategory::Large).count, 1);
//! assert_eq!(result.bucket(SizeCategory::Large).total_size_formatted, "1.9 MB");
//! ```
//!
//! # Module Organization
//!
//! - [`aggregator`] - Grouping messages into size buckets
//! - [`auth`] - OAuth2 web flow and token refresh
//! - [`classifier`] - Size thresholds and categories
//! - [`cli`] - Command-line interface and server wiring
//! - [`client`] - Gmail API message source
//! - [`config`] - Configuration management
//! - [`error`] - Error types and result aliases
//! - [`format`] - Human-readable byte sizes
//! - [`limits`] - Clamping of the requested message count
//! - [`models`] - Core data structures
//! - [`render`] - HTML report
//! - [`session`] - Cookie-keyed session storage
//! - [`web`] - HTTP routes

pub mod aggregator;
pub mod auth;
pub mod classifier;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod format;
pub mod limits;
pub mod models;
pub mod render;
pub mod session;
pub mod web;

// Re-export commonly used types for convenience
pub use error::{GmailError, Result};

// Core data models
pub use models::{CategoryBucket, ClassificationResult, MessageSummary};

// Classification
pub use aggregator::aggregate;
pub use classifier::{classify, SizeCategory, SizeClassifier, SizeThresholds};
pub use format::{format_size, format_total_size};
pub use limits::{clamp_request_limit, RequestLimits};

// Config types
pub use config::{ClassificationConfig, Config, FetchConfig, ServerConfig};

// Seams for the web layer
pub use auth::{AccessToken, StoredCredentials, TokenProvider};
pub use client::{GmailMessageSource, MessageSource};
pub use session::{SessionData, SessionStore};
pub use web::{router, AppState, ClassificationEnvelope};

// CLI types (for binary usage)
pub use cli::{Cli, Commands};
