//! HTTP client for the ThreatER v3 API
//!
//! Issues authenticated GET requests and classifies every failure into an
//! [`ApiError`]. There is no retry: a failed request ends the run
//! and the scheduler's next invocation resumes from the last checkpoint.

use crate::api::endpoints;
use crate::api::types::{Page, PageEnvelope, QueryParams, LIMIT_PARAM};
use crate::config::ConnectionConfig;
use crate::error::{ApiError, CollectError, Result};
use crate::pagination::PageSource;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, Proxy};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

// ============================================================================
// API Client Constants
// ============================================================================

/// User-Agent sent with every request.
pub const USER_AGENT_VALUE: &str = concat!("threater-collect/", env!("CARGO_PKG_VERSION"));

/// Longest slice of an error body kept in [`ApiError::message`].
const MAX_ERROR_BODY: usize = 512;

/// Authentication compatibility policy.
///
/// The API has accepted the key under different header names across
/// releases, so when a key is configured it is sent under every recognised
/// variant at once: `(header, value prefix)`.
pub const AUTH_HEADER_VARIANTS: &[(&str, &str)] = &[
    ("authorization", "Bearer "),
    ("x-api-key", ""),
    ("api-key", ""),
];

/// Result of a successful [`ApiClient::probe`]
#[derive(Debug, Clone, Copy)]
pub struct ProbeOutcome {
    pub status: u16,
    pub elapsed: Duration,
}

impl ProbeOutcome {
    /// Round-trip time in whole milliseconds, saturating at `u64::MAX`.
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX)
    }
}

/// API client bound to one [`ConnectionConfig`]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl ApiClient {
    /// Build a client honouring timeout, TLS verification and proxy settings.
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(config.timeout())
            .default_headers(default_headers(config.api_key.as_deref())?)
            .danger_accept_invalid_certs(!config.verify_ssl);

        if let Some(ref proxy) = config.proxy {
            let mut p = Proxy::all(&proxy.url).map_err(|e| {
                CollectError::config(format!("invalid proxy URL '{}': {}", proxy.url, e))
            })?;
            if let Some(ref user) = proxy.username {
                p = p.basic_auth(user, proxy.password.as_deref().unwrap_or_default());
            }
            builder = builder.proxy(p);
        }

        let client = builder
            .build()
            .map_err(|e| CollectError::config(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            timeout: config.timeout(),
        })
    }

    /// GET `endpoint_path` and return the status and raw body of a successful
    /// response.
    async fn get_body(&self, endpoint_path: &str, params: &QueryParams) -> Result<(u16, String)> {
        let url = endpoints::endpoint_url(&self.base_url, endpoint_path);
        debug!(url = %url, ?params, "GET");

        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| self.transport_error(&url, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(&url, e))?;
        debug!(url = %url, status = status.as_u16(), bytes = body.len(), "response");

        if status.is_success() || status.is_redirection() {
            Ok((status.as_u16(), body))
        } else {
            Err(ApiError::from_status(status.as_u16(), truncate(&body, MAX_ERROR_BODY)).into())
        }
    }

    /// GET any JSON document.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint_path: &str,
        params: &QueryParams,
    ) -> Result<T> {
        let (_, body) = self.get_body(endpoint_path, params).await?;
        serde_json::from_str(&body).map_err(|e| CollectError::decode(endpoint_path, e.to_string()))
    }

    /// GET one page of a list endpoint.
    pub async fn get_page(&self, endpoint_path: &str, params: &QueryParams) -> Result<Page> {
        let envelope: PageEnvelope = self.get_json(endpoint_path, params).await?;
        Ok(envelope.into())
    }

    /// Single lightweight request used for diagnostics. An `Auth` error means
    /// reachable but unauthorized.
    pub async fn probe(&self, endpoint_path: &str) -> std::result::Result<ProbeOutcome, ApiError> {
        let mut params = QueryParams::new();
        params.insert(LIMIT_PARAM.to_string(), "1".to_string());

        let started = Instant::now();
        match self.get_body(endpoint_path, &params).await {
            Ok((status, _)) => Ok(ProbeOutcome {
                status,
                elapsed: started.elapsed(),
            }),
            Err(CollectError::Api(e)) => Err(e),
            Err(other) => Err(ApiError::network(other.to_string())),
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn transport_error(&self, url: &str, err: reqwest::Error) -> CollectError {
        let message = if err.is_timeout() {
            format!("request to {} timed out after {}s", url, self.timeout.as_secs())
        } else if err.is_connect() {
            format!("cannot connect to {}: {}", url, err)
        } else {
            format!("request to {} failed: {}", url, err)
        };
        ApiError::network(message).into()
    }
}

#[async_trait]
impl PageSource for ApiClient {
    async fn fetch(&self, endpoint_path: &str, params: &QueryParams) -> Result<Page> {
        self.get_page(endpoint_path, params).await
    }
}

fn default_headers(api_key: Option<&str>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

    if let Some(key) = api_key.filter(|k| !k.is_empty()) {
        for &(name, prefix) in AUTH_HEADER_VARIANTS {
            let mut value = HeaderValue::from_str(&format!("{}{}", prefix, key))
                .map_err(|_| CollectError::config("API key contains characters not allowed in HTTP headers"))?;
            value.set_sensitive(true);
            headers.insert(HeaderName::from_static(name), value);
        }
    }

    Ok(headers)
}

fn truncate(body: &str, max: usize) -> String {
    if body.len() <= max {
        return body.to_string();
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
