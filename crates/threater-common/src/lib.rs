//! ThreatER Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared pieces used by every ThreatER workspace member.
//!
//! # Overview
//!
//! - **Logging**: tracing subscriber setup driven by [`logging::LogConfig`]
//! - **Types**: checkpoint keys and high-water-mark comparison
//!
//! # Example
//!
//! ```no_run
//! use threater_common::types::HighWaterMark;
//!
//! let mut mark = HighWaterMark::new(Some("2024-01-01T00:00:00Z".to_string()));
//! assert!(mark.advance("2024-01-03T00:00:00Z"));
//! assert!(!mark.advance("2024-01-02T00:00:00Z"));
//! ```

pub mod logging;
pub mod types;

// Re-export commonly used types
pub use types::{CheckpointKey, HighWaterMark};
