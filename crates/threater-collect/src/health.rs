//! Ingestion health heartbeat

use crate::error::Result;
use crate::sink::Event;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::value::RawValue;

pub const HEALTH_SOURCETYPE: &str = "threater:ingestion_health";

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub timestamp: String,
    pub status: &'static str,
    pub component: &'static str,
    pub message: String,
    pub details: HealthDetails,
}

#[derive(Debug, Serialize)]
pub struct HealthDetails {
    pub inputs_checked: Vec<String>,
    pub errors: Vec<String>,
}

impl HealthReport {
    pub fn ok(now: DateTime<Utc>, inputs_checked: Vec<String>) -> Self {
        Self {
            timestamp: now.to_rfc3339_opts(SecondsFormat::Micros, true),
            status: "ok",
            component: "ingestion",
            message: "ThreatER ingestion health check executed successfully".to_string(),
            details: HealthDetails {
                inputs_checked,
                errors: Vec::new(),
            },
        }
    }

    pub fn into_event(self) -> Result<Event> {
        let payload = RawValue::from_string(serde_json::to_string(&self)?)?;
        Ok(Event::new(HEALTH_SOURCETYPE, payload))
    }
}
