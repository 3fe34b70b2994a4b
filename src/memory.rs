//! Optional memory side channel for orchestration runs.
//!
//! The coordinator and execution engine write summaries to an attached
//! [`MemorySink`] at defined points: worker registration, per-subtask working
//! results, and a confidence-scored fact after a fully successful run. The
//! sink is strictly write-only from the core's perspective; no control
//! decision ever reads from it, and every call site works identically when no
//! sink is attached.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Retention level for a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryLevel {
    /// Scratch data scoped to the current run.
    Working,
    /// Durable knowledge that outlives a run.
    LongTerm,
}

impl std::fmt::Display for MemoryLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryLevel::Working => write!(f, "working"),
            MemoryLevel::LongTerm => write!(f, "long_term"),
        }
    }
}

/// Write-only sink for run side effects.
///
/// Implementations must tolerate concurrent appends: a batch of subtasks
/// completing at the same time may all call [`MemorySink::store`].
pub trait MemorySink: Send + Sync {
    /// Store a keyed value at the given retention level.
    fn store(&self, key: &str, value: serde_json::Value, level: MemoryLevel);

    /// Store a free-text fact with a confidence score and its source.
    fn store_fact(&self, text: &str, confidence: f64, source: &str);
}

/// A keyed record captured by [`InMemorySink`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub key: String,
    pub value: serde_json::Value,
    pub level: MemoryLevel,
    pub stored_at: DateTime<Utc>,
}

/// A fact captured by [`InMemorySink`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactRecord {
    pub text: String,
    pub confidence: f64,
    pub source: String,
    pub stored_at: DateTime<Utc>,
}

/// Process-lifetime, append-only memory sink.
///
/// Suitable for tests and for embedding callers that want to inspect what a
/// run recorded. Appends are guarded by a mutex held only for the push.
#[derive(Debug, Default)]
pub struct InMemorySink {
    records: Mutex<Vec<MemoryRecord>>,
    facts: Mutex<Vec<FactRecord>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all stored records in insertion order.
    pub fn records(&self) -> Vec<MemoryRecord> {
        self.records.lock().expect("memory sink poisoned").clone()
    }

    /// Snapshot of all stored facts in insertion order.
    pub fn facts(&self) -> Vec<FactRecord> {
        self.facts.lock().expect("memory sink poisoned").clone()
    }

    /// Find the most recent record stored under `key`.
    pub fn get(&self, key: &str) -> Option<MemoryRecord> {
        self.records
            .lock()
            .expect("memory sink poisoned")
            .iter()
            .rev()
            .find(|r| r.key == key)
            .cloned()
    }
}

impl MemorySink for InMemorySink {
    fn store(&self, key: &str, value: serde_json::Value, level: MemoryLevel) {
        let record = MemoryRecord {
            key: key.to_string(),
            value,
            level,
            stored_at: Utc::now(),
        };
        self.records.lock().expect("memory sink poisoned").push(record);
    }

    fn store_fact(&self, text: &str, confidence: f64, source: &str) {
        let fact = FactRecord {
            text: text.to_string(),
            confidence,
            source: source.to_string(),
            stored_at: Utc::now(),
        };
        self.facts.lock().expect("memory sink poisoned").push(fact);
    }
}
