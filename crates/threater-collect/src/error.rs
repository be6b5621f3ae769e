//! Error types for the ThreatER collector
//!
//! Every variant aborts the current run. The only retry is the next scheduled
//! invocation, which resumes from the last committed checkpoint.

use thiserror::Error;

/// Result type alias for collector operations
pub type Result<T> = std::result::Result<T, CollectError>;

/// Exit status for a successful run.
pub const EXIT_OK: i32 = 0;
/// Exit status for any failure not classified by the upstream API.
pub const EXIT_UNEXPECTED: i32 = 1;
/// Exit status for failures classified by [`ApiErrorKind`].
pub const EXIT_API: i32 = 2;

/// How an upstream request failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Connect, TLS or timeout failure; no HTTP status was received
    Network,
    /// 401/403: the API is reachable but rejected the credentials
    Auth,
    /// 5xx (or any other non-success status outside 4xx)
    ServerError,
    /// 4xx other than 401/403
    ClientError,
}

impl ApiErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ApiErrorKind::Network => "network",
            ApiErrorKind::Auth => "auth",
            ApiErrorKind::ServerError => "server_error",
            ApiErrorKind::ClientError => "client_error",
        }
    }
}

impl std::fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed upstream request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl ApiError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Network,
            status: None,
            message: message.into(),
        }
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            401 | 403 => ApiErrorKind::Auth,
            400..=499 => ApiErrorKind::ClientError,
            _ => ApiErrorKind::ServerError,
        };
        Self {
            kind,
            status: Some(status),
            message: message.into(),
        }
    }

    /// True when the server answered at all, i.e. credentials or the request
    /// itself are the problem rather than connectivity.
    pub fn is_reachable(&self) -> bool {
        self.kind != ApiErrorKind::Network
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} failure (HTTP {}): {}", self.kind, status, self.message),
            None => write!(f, "{} failure: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for ApiError {}

/// Top-level collector error
#[derive(Error, Debug)]
pub enum CollectError {
    /// Missing or malformed settings; the run never starts
    #[error("Configuration error: {0}. Check threater.toml and the THREATER_* environment variables.")]
    Config(String),

    /// Upstream request failed
    #[error("ThreatER API error: {0}")]
    Api(#[from] ApiError),

    /// Upstream answered with a body that is not a page envelope
    #[error("Unexpected response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    /// Checkpoint persistence failed
    #[error("Checkpoint store error: {0}")]
    Checkpoint(String),

    /// Event sink rejected a write or flush
    #[error("Event sink error: {0}")]
    Sink(String),

    /// Pagination ran past the configured ceiling
    #[error("Pagination of {endpoint} exceeded {max_pages} pages; the API may be returning a looping cursor")]
    PageLimit { endpoint: String, max_pages: u32 },

    /// Stream name not present in the catalog
    #[error("Unknown stream '{0}'. Run 'threater-collect streams' to list available streams.")]
    UnknownStream(String),

    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Checkpoint database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl CollectError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn checkpoint(msg: impl Into<String>) -> Self {
        Self::Checkpoint(msg.into())
    }

    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }

    pub fn decode(endpoint: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Decode {
            endpoint: endpoint.into(),
            message: msg.into(),
        }
    }

    /// True for failures classified by the upstream API.
    pub fn is_api(&self) -> bool {
        matches!(self, Self::Api(_))
    }

    /// Process exit status communicated to the scheduler.
    pub fn exit_code(&self) -> i32 {
        if self.is_api() {
            EXIT_API
        } else {
            EXIT_UNEXPECTED
        }
    }
}
