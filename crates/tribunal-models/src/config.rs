use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::agent_message::SpecialistCategory;

/// Top-level configuration for the tribunal pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TribunalConfig {
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Configuration for the signal history store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MemoryConfig {
    /// Path to the SQLite signal history database.
    pub sqlite_path: String,
    /// Maximum number of entries in the in-memory moka cache.
    pub memory_max_capacity: u64,
    /// TTL in seconds for moka entries.
    pub memory_ttl_seconds: u64,
    /// Prior estimates handed to each specialist.
    pub history_limit: usize,
    /// A history query slower than this is treated as empty.
    pub query_timeout_ms: u64,
    /// Write successful estimates back to the store after each run.
    pub persist_signals: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            sqlite_path: "data/tribunal_signals.db".to_string(),
            memory_max_capacity: 10_000,
            memory_ttl_seconds: 300,
            history_limit: 3,
            query_timeout_ms: 2_000,
            persist_signals: true,
        }
    }
}

/// Configuration for specialist selection and dispatch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentsConfig {
    /// Per-specialist timeout in seconds, wrapping every retry.
    pub specialist_timeout_seconds: u64,
    /// Retries after the first attempt. Timeouts are never retried.
    pub max_retries: u32,
    /// Backoff before the first retry; doubled for every later retry.
    pub initial_backoff_ms: u64,
    /// Fewer selected specialists than this is logged, not corrected.
    pub min_specialists: usize,
    /// Default model for CLI-backed specialists.
    pub specialist_model: String,
    /// Model for the cross-examination collaborator.
    pub examiner_model: String,
    pub examiner_timeout_seconds: u64,
    pub enabled_categories: Vec<SpecialistCategory>,
    /// Per-specialist overrides, matched by name.
    pub specialists: Vec<SpecialistConfig>,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            specialist_timeout_seconds: 45,
            max_retries: 2,
            initial_backoff_ms: 1_000,
            min_specialists: 3,
            specialist_model: "claude-3-5-haiku-latest".to_string(),
            examiner_model: "claude-sonnet-4-5-20250929".to_string(),
            examiner_timeout_seconds: 90,
            enabled_categories: SpecialistCategory::ALL.to_vec(),
            specialists: Vec::new(),
        }
    }
}

/// Overrides for a single specialist.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpecialistConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub timeout_seconds: Option<u64>,
    pub max_retries: Option<u32>,
    /// Falls back to `AgentsConfig::specialist_model`.
    pub model: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Resolved invocation limits for one specialist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvocationSettings {
    pub timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl AgentsConfig {
    pub fn is_category_enabled(&self, category: SpecialistCategory) -> bool {
        self.enabled_categories.contains(&category)
    }

    pub fn is_specialist_enabled(&self, name: &str) -> bool {
        self.override_for(name).map_or(true, |s| s.enabled)
    }

    pub fn override_for(&self, name: &str) -> Option<&SpecialistConfig> {
        self.specialists.iter().find(|s| s.name == name)
    }

    pub fn model_for(&self, name: &str) -> String {
        self.override_for(name)
            .and_then(|s| s.model.clone())
            .unwrap_or_else(|| self.specialist_model.clone())
    }

    pub fn settings_for(&self, name: &str) -> InvocationSettings {
        let overrides = self.override_for(name);
        InvocationSettings {
            timeout: Duration::from_secs(
                overrides
                    .and_then(|s| s.timeout_seconds)
                    .unwrap_or(self.specialist_timeout_seconds),
            ),
            max_retries: overrides
                .and_then(|s| s.max_retries)
                .unwrap_or(self.max_retries),
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
        }
    }
}

/// Thresholds for the decision stages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum |consensus - market| before any trade is recommended.
    pub min_edge_threshold: f64,
    /// Use the local rule-based examiner instead of the CLI collaborator.
    pub offline_examiner: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_edge_threshold: 0.05,
            offline_examiner: false,
        }
    }
}
