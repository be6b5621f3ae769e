//! ThreatER API access
//!
//! HTTP client, endpoint helpers and the page envelope.

pub mod client;
pub mod endpoints;
pub mod types;

pub use client::{ApiClient, ProbeOutcome};
pub use types::*;
