//! Tribunal - multi-specialist prediction-market analysis
//!
//! Turns one market brief into a bounded trade recommendation by consulting a
//! panel of specialist Claude CLI agents, cross-examining the bull and bear
//! theses they produce, and calibrating a consensus probability.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use tribunal::models::config::TribunalConfig;
//! use tribunal::models::market::MarketBrief;
//! use tribunal::agents::{Orchestrator, SpecialistRegistry, RuleBasedExaminer};
//! use tribunal::memory::{NoopMemory, SqliteSignalStore};
//! ```

pub use tribunal_agents as agents;
pub use tribunal_engine as engine;
pub use tribunal_memory as memory;
pub use tribunal_models as models;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tribunal_agents::claude_cli::ClaudeCliConfig;
use tribunal_agents::{
    ClaudeCrossExaminer, CrossExaminer, Orchestrator, RuleBasedExaminer, SpecialistRegistry,
};
use tribunal_memory::{SignalMemory, SqliteSignalStore};
use tribunal_models::config::TribunalConfig;
use tribunal_models::decision::AnalysisReport;
use tribunal_models::market::{IngestionError, MarketBrief};

/// Parse a TOML configuration. Missing sections and keys take their defaults.
pub fn load_config(raw: &str) -> Result<TribunalConfig, anyhow::Error> {
    toml::from_str(raw).context("Failed to parse config")
}

/// The cross-examiner selected by `engine.offline_examiner`.
pub fn build_examiner(config: &TribunalConfig) -> Arc<dyn CrossExaminer> {
    if config.engine.offline_examiner {
        Arc::new(RuleBasedExaminer)
    } else {
        Arc::new(ClaudeCrossExaminer::new(ClaudeCliConfig {
            model: config.agents.examiner_model.clone(),
            timeout: Duration::from_secs(config.agents.examiner_timeout_seconds),
        }))
    }
}

/// Build an Orchestrator over the given signal memory with CLI-backed specialists.
pub fn build_orchestrator_with_memory(config: &TribunalConfig, memory: Arc<dyn SignalMemory>) -> Orchestrator {
    let registry = SpecialistRegistry::with_claude_specialists(&config.agents);
    info!(
        specialists = registry.len(),
        offline_examiner = config.engine.offline_examiner,
        "Orchestrator configured"
    );
    Orchestrator::new(registry, memory, build_examiner(config), config)
}

/// Build an Orchestrator from configuration, opening the SQLite signal history.
pub fn build_orchestrator(config: &TribunalConfig) -> Result<Orchestrator, anyhow::Error> {
    if let Some(dir) = Path::new(&config.memory.sqlite_path).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
    }
    let store = SqliteSignalStore::from_config(&config.memory)
        .with_context(|| format!("Failed to open signal history: {}", config.memory.sqlite_path))?;
    Ok(build_orchestrator_with_memory(config, Arc::new(store)))
}

/// Analyze a market brief using the given orchestrator.
pub async fn analyze(orchestrator: &Orchestrator, brief: &MarketBrief) -> Result<AnalysisReport, IngestionError> {
    orchestrator.analyze(brief).await
}
