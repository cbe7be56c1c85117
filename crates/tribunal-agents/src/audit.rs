use std::time::Instant;

use serde_json::{json, Value};
use tribunal_models::audit::{details_map, AuditLog, AuditStatus};

pub const INGESTION: &str = "ingestion";
pub const AGENT_SELECTION: &str = "agent_selection";
pub const MEMORY_RETRIEVAL: &str = "memory_retrieval";
pub const AGENT_DISPATCH: &str = "agent_dispatch";
pub const SIGNAL_PERSISTENCE: &str = "signal_persistence";
pub const SIGNAL_FUSION: &str = "signal_fusion";
pub const THESIS_CONSTRUCTION: &str = "thesis_construction";
pub const CROSS_EXAMINATION: &str = "cross_examination";
pub const CONSENSUS: &str = "consensus";
pub const RECOMMENDATION: &str = "recommendation";

/// Pipeline stages in run order.
pub const STAGES: [&str; 10] = [
    INGESTION,
    AGENT_SELECTION,
    MEMORY_RETRIEVAL,
    AGENT_DISPATCH,
    SIGNAL_PERSISTENCE,
    SIGNAL_FUSION,
    THESIS_CONSTRUCTION,
    CROSS_EXAMINATION,
    CONSENSUS,
    RECOMMENDATION,
];

/// An open stage: `started` is already recorded, and exactly one of
/// `complete` or `fail` closes it with `duration_ms`.
#[must_use]
pub struct Stage {
    name: &'static str,
    start: Instant,
}

impl Stage {
    pub fn begin(audit: &mut AuditLog, name: &'static str) -> Self {
        audit.record_json(name, AuditStatus::Started, Value::Null);
        Self {
            name,
            start: Instant::now(),
        }
    }

    fn close(self, audit: &mut AuditLog, status: AuditStatus, details: Value) {
        let mut details = details_map(details);
        details.insert(
            "duration_ms".to_string(),
            json!(self.start.elapsed().as_millis() as u64),
        );
        audit.record(self.name, status, details);
    }

    pub fn complete(self, audit: &mut AuditLog, details: Value) {
        self.close(audit, AuditStatus::Completed, details);
    }

    /// Close the stage as failed, naming the error and the value used instead.
    pub fn fail(self, audit: &mut AuditLog, error: &str, fallback: &str) {
        self.close(audit, AuditStatus::Failed, json!({ "error": error, "fallback": fallback }));
    }
}
