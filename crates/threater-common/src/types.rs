//! Checkpoint types shared by the collector and its tooling

use serde::{Deserialize, Serialize};

/// Identity of one stored checkpoint: the connector that owns it plus the
/// connector-local key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckpointKey {
    pub connector: String,
    pub key: String,
}

impl CheckpointKey {
    pub fn new(connector: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            connector: connector.into(),
            key: key.into(),
        }
    }
}

impl std::fmt::Display for CheckpointKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.connector, self.key)
    }
}

/// Newest timestamp observed during a run, seeded with the stored checkpoint.
///
/// Ordering is plain lexicographic string comparison. That ordering is only
/// chronological when every source emits ISO 8601 timestamps with the same
/// layout and precision, which is what the ThreatER API does today.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HighWaterMark {
    initial: Option<String>,
    current: Option<String>,
}

impl HighWaterMark {
    /// Start from the value read at the beginning of a run.
    pub fn new(initial: Option<String>) -> Self {
        // An empty stored value carries no position.
        let initial = initial.filter(|v| !v.is_empty());
        Self {
            current: initial.clone(),
            initial,
        }
    }

    /// Offer a candidate timestamp. Returns `true` when it strictly exceeds
    /// the current mark and was taken.
    pub fn advance(&mut self, candidate: &str) -> bool {
        if candidate.is_empty() {
            return false;
        }
        let newer = match self.current.as_deref() {
            Some(current) => candidate > current,
            None => true,
        };
        if newer {
            self.current = Some(candidate.to_string());
        }
        newer
    }

    /// Value the run started from.
    pub fn initial(&self) -> Option<&str> {
        self.initial.as_deref()
    }

    /// Newest value seen so far (the initial value when nothing newer arrived).
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// The value to commit, present only when the mark moved past the
    /// initial value.
    pub fn committable(&self) -> Option<&str> {
        if self.current != self.initial {
            self.current.as_deref()
        } else {
            None
        }
    }
}
