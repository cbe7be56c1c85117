use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Started,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    pub stage: String,
    pub timestamp: DateTime<Utc>,
    pub status: AuditStatus,
    pub details: serde_json::Map<String, serde_json::Value>,
}

/// Audit details as a map: objects pass through, `null` is empty, and any
/// other value is stored under `"value"`.
pub fn details_map(details: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    match details {
        serde_json::Value::Object(map) => map,
        serde_json::Value::Null => serde_json::Map::new(),
        other => {
            let mut map = serde_json::Map::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

/// Append-only run log.
///
/// Producers that run concurrently each fill their own `AuditLog` and hand it
/// back; the owner merges them once every producer has settled. `merge` is
/// plain concatenation, so it is associative and nothing is ever appended to
/// a log from two places at once.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct AuditLog {
    entries: Vec<AuditEntry>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        stage: &str,
        status: AuditStatus,
        details: serde_json::Map<String, serde_json::Value>,
    ) {
        self.entries.push(AuditEntry {
            stage: stage.to_string(),
            timestamp: Utc::now(),
            status,
            details,
        });
    }

    /// Record with details built from a `serde_json::json!({...})` object.
    /// Non-object values are stored under `"value"`.
    pub fn record_json(&mut self, stage: &str, status: AuditStatus, details: serde_json::Value) {
        self.record(stage, status, details_map(details));
    }

    pub fn merge(mut self, other: AuditLog) -> AuditLog {
        self.entries.extend(other.entries);
        self
    }

    pub fn extend(&mut self, other: AuditLog) {
        self.entries.extend(other.entries);
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn stage(&self, stage: &str) -> impl Iterator<Item = &AuditEntry> {
        let stage = stage.to_string();
        self.entries.iter().filter(move |e| e.stage == stage)
    }

    /// Final status recorded for a stage, if the stage ran.
    pub fn last_status(&self, stage: &str) -> Option<AuditStatus> {
        self.stage(stage).last().map(|e| e.status)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<AuditEntry> {
        self.entries
    }
}
