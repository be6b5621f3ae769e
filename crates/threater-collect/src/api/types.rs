//! Wire types for the ThreatER v3 API
//!
//! List endpoints answer with `{"data": [...], "meta": {"next_cursor": ...}}`.
//! Records are kept as raw JSON text so they can be forwarded unchanged.

use crate::error::Result;
use serde::Deserialize;
use serde_json::value::RawValue;
use std::collections::BTreeMap;

/// One opaque upstream record, byte-for-byte as received
pub type Record = Box<RawValue>;

/// Query string parameters for a list request
pub type QueryParams = BTreeMap<String, String>;

/// Query parameter carrying the page size.
pub const LIMIT_PARAM: &str = "limit";

/// Query parameter carrying the pagination cursor.
pub const CURSOR_PARAM: &str = "cursor";

/// One page of results
#[derive(Debug, Default)]
pub struct Page {
    pub records: Vec<Record>,
    /// Absent when this is the last page
    pub next_cursor: Option<String>,
}

/// `{"data": [...], "meta": {...}}` as sent by list endpoints
#[derive(Deserialize)]
pub struct PageEnvelope {
    #[serde(default)]
    data: Option<Vec<Record>>,
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Deserialize, Default)]
struct Meta {
    #[serde(default)]
    next_cursor: Option<Cursor>,
    #[serde(default, rename = "nextCursor")]
    next_cursor_camel: Option<Cursor>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Cursor {
    Text(String),
    Number(serde_json::Number),
}

impl Cursor {
    fn into_token(self) -> Option<String> {
        let token = match self {
            Cursor::Text(s) => s,
            Cursor::Number(n) => n.to_string(),
        };
        (!token.is_empty()).then_some(token)
    }
}

impl Page {
    pub fn new(records: Vec<Record>, next_cursor: Option<String>) -> Self {
        Self {
            records,
            next_cursor,
        }
    }

    /// Decode a response body. `endpoint` only labels errors.
    #[cfg(test)]
    pub fn from_body(endpoint: &str, body: &str) -> Result<Self> {
        let envelope: PageEnvelope = serde_json::from_str(body)
            .map_err(|e| crate::error::CollectError::decode(endpoint, format!("not a page envelope: {}", e)))?;
        Ok(envelope.into())
    }

    #[cfg(test)]
    pub fn is_last(&self) -> bool {
        self.next_cursor.is_none()
    }
}

impl From<PageEnvelope> for Page {
    fn from(envelope: PageEnvelope) -> Self {
        let meta = envelope.meta.unwrap_or_default();
        let next_cursor = meta
            .next_cursor
            .and_then(Cursor::into_token)
            .or_else(|| meta.next_cursor_camel.and_then(Cursor::into_token));

        Self {
            records: envelope.data.unwrap_or_default(),
            next_cursor,
        }
    }
}

/// Parse a JSON literal into a [`Record`]; used to build pages by hand.
pub fn record(json: &str) -> Result<Record> {
    Ok(RawValue::from_string(json.to_string())?)
}
