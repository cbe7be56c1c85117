use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::json;
use tracing::{debug, error, info, warn};
use tribunal_memory::SignalMemory;
use tribunal_models::agent_message::{
    FailureKind, SpecialistEstimate, SpecialistFailure, SpecialistRequest,
};
use tribunal_models::audit::{AuditLog, AuditStatus};
use tribunal_models::config::{AgentsConfig, InvocationSettings, MemoryConfig};
use tribunal_models::market::MarketBrief;
use uuid::Uuid;

use crate::audit::{AGENT_DISPATCH, MEMORY_RETRIEVAL};
use crate::error::AgentError;
use crate::registry::SelectedSpecialist;
use crate::specialist::SpecialistAgent;

/// Successes and failures of one dispatch group. Every dispatched specialist
/// is in exactly one of the two lists, in selection order.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    pub estimates: Vec<SpecialistEstimate>,
    pub failures: Vec<SpecialistFailure>,
    /// Per-specialist audit entries, merged after the barrier.
    pub audit: AuditLog,
    /// Specialists whose memory lookup failed or timed out.
    pub memory_fallbacks: usize,
}

impl DispatchOutcome {
    pub fn timeouts(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| f.kind == FailureKind::Timeout)
            .count()
    }
}

/// What one dispatch unit hands back through its join handle.
struct UnitResult {
    outcome: Result<SpecialistEstimate, SpecialistFailure>,
    audit: AuditLog,
    memory_fallback: bool,
}

/// Fans a market out to the selected specialists, one task each.
pub struct Dispatcher {
    memory: Arc<dyn SignalMemory>,
    config: AgentsConfig,
    history_limit: usize,
    memory_timeout: Duration,
}

impl Dispatcher {
    pub fn new(memory: Arc<dyn SignalMemory>, config: AgentsConfig, memory_config: &MemoryConfig) -> Self {
        Self {
            memory,
            config,
            history_limit: memory_config.history_limit,
            memory_timeout: Duration::from_millis(memory_config.query_timeout_ms),
        }
    }

    /// Run every selected specialist concurrently and wait for all of them.
    ///
    /// Each unit owns its own result slot and audit log; the slots are read
    /// back in selection order once every unit has settled.
    pub async fn dispatch(&self, brief: &MarketBrief, selected: &[SelectedSpecialist]) -> DispatchOutcome {
        let brief = Arc::new(brief.clone());
        let mut handles = Vec::with_capacity(selected.len());

        for specialist in selected {
            let unit = DispatchUnit {
                name: specialist.name.clone(),
                agent: Arc::clone(&specialist.agent),
                brief: Arc::clone(&brief),
                memory: Arc::clone(&self.memory),
                history_limit: self.history_limit,
                memory_timeout: self.memory_timeout,
                settings: self.config.settings_for(&specialist.name),
            };
            handles.push((specialist.name.clone(), tokio::spawn(unit.run())));
        }

        let mut outcome = DispatchOutcome::default();
        for (name, handle) in handles {
            match handle.await {
                Ok(result) => {
                    outcome.audit.extend(result.audit);
                    outcome.memory_fallbacks += usize::from(result.memory_fallback);
                    match result.outcome {
                        Ok(estimate) => outcome.estimates.push(estimate),
                        Err(failure) => outcome.failures.push(failure),
                    }
                }
                Err(e) => {
                    error!(agent = %name, error = %e, "Specialist task panicked");
                    outcome
                        .failures
                        .push(SpecialistFailure::execution_failed(&name, format!("task aborted: {e}")));
                }
            }
        }

        info!(
            market = %brief.market_id,
            succeeded = outcome.estimates.len(),
            failed = outcome.failures.len(),
            timeouts = outcome.timeouts(),
            "Dispatch group settled"
        );
        outcome
    }
}

struct DispatchUnit {
    name: String,
    agent: Arc<dyn SpecialistAgent>,
    brief: Arc<MarketBrief>,
    memory: Arc<dyn SignalMemory>,
    history_limit: usize,
    memory_timeout: Duration,
    settings: InvocationSettings,
}

impl DispatchUnit {
    async fn run(self) -> UnitResult {
        let mut audit = AuditLog::new();
        let (history, memory_fallback) = self.load_memory(&mut audit).await;

        let deadline = Utc::now()
            + chrono::Duration::from_std(self.settings.timeout)
                .unwrap_or_else(|_| chrono::Duration::days(1));
        let request = SpecialistRequest {
            request_id: Uuid::new_v4(),
            agent_name: self.name.clone(),
            brief: (*self.brief).clone(),
            memory: history,
            deadline,
        };

        let start = Instant::now();
        let attempts = AtomicU32::new(0);
        let timeout_ms = self.settings.timeout.as_millis() as u64;

        let outcome = match tokio::time::timeout(
            self.settings.timeout,
            invoke_with_retry(self.agent.as_ref(), &self.name, &request, &self.settings, &attempts),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(agent = %self.name, timeout_ms, "Specialist timed out");
                Err(SpecialistFailure::timeout(&self.name, timeout_ms)
                    .with_details(json!({ "attempts": attempts.load(Ordering::SeqCst) })))
            }
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        let attempts = attempts.load(Ordering::SeqCst);
        match &outcome {
            Ok(estimate) => {
                info!(
                    agent = %self.name,
                    stance = ?estimate.stance,
                    fair_probability = estimate.fair_probability,
                    confidence = estimate.confidence,
                    attempts,
                    elapsed_ms,
                    "Specialist succeeded"
                );
                audit.record_json(
                    AGENT_DISPATCH,
                    AuditStatus::Completed,
                    json!({ "agent": self.name, "attempts": attempts, "duration_ms": elapsed_ms }),
                );
            }
            Err(failure) => {
                warn!(agent = %self.name, kind = %failure.kind, error = %failure.message, attempts, elapsed_ms, "Specialist failed");
                audit.record_json(
                    AGENT_DISPATCH,
                    AuditStatus::Failed,
                    json!({
                        "agent": self.name,
                        "kind": failure.kind,
                        "error": failure.message,
                        "attempts": attempts,
                        "duration_ms": elapsed_ms,
                    }),
                );
            }
        }

        UnitResult {
            outcome,
            audit,
            memory_fallback,
        }
    }

    /// Prior estimates for this specialist. Errors and timeouts fall back to
    /// an empty history.
    async fn load_memory(&self, audit: &mut AuditLog) -> (Vec<SpecialistEstimate>, bool) {
        let start = Instant::now();
        let lookup = self
            .memory
            .recent_signals(&self.brief.market_id, &self.name, self.history_limit);

        let error = match tokio::time::timeout(self.memory_timeout, lookup).await {
            Ok(Ok(history)) => {
                debug!(agent = %self.name, rows = history.len(), "Memory loaded");
                return (history, false);
            }
            Ok(Err(e)) => AgentError::from(e).to_string(),
            Err(_) => format!("memory query exceeded {}ms", self.memory_timeout.as_millis()),
        };

        warn!(agent = %self.name, error = %error, "Memory unavailable, continuing with empty history");
        audit.record_json(
            MEMORY_RETRIEVAL,
            AuditStatus::Failed,
            json!({
                "agent": self.name,
                "error": error,
                "fallback": "empty history",
                "duration_ms": start.elapsed().as_millis() as u64,
            }),
        );
        (Vec::new(), true)
    }
}

/// Invoke a specialist until it succeeds, reports a timeout, or runs out of
/// retries. `attempts` stays readable if the caller's timeout drops this future.
async fn invoke_with_retry(
    agent: &dyn SpecialistAgent,
    name: &str,
    request: &SpecialistRequest,
    settings: &InvocationSettings,
    attempts: &AtomicU32,
) -> Result<SpecialistEstimate, SpecialistFailure> {
    let mut backoff = settings.initial_backoff;
    let mut last_error = String::new();

    for attempt in 0..=settings.max_retries {
        attempts.fetch_add(1, Ordering::SeqCst);

        match agent.evaluate(request).await {
            Ok(mut estimate) => {
                estimate.agent_name = name.to_string();
                match estimate.validate() {
                    Ok(()) => return Ok(estimate),
                    Err(e) => last_error = AgentError::InvalidEstimate(e).to_string(),
                }
            }
            Err(AgentError::Timeout(ms)) => {
                return Err(SpecialistFailure::timeout(name, ms)
                    .with_details(json!({ "attempts": attempt + 1, "source": "specialist" })));
            }
            Err(e) => last_error = e.to_string(),
        }

        if attempt < settings.max_retries {
            debug!(agent = %name, attempt = attempt + 1, backoff_ms = backoff.as_millis() as u64, error = %last_error, "Retrying specialist");
            tokio::time::sleep(backoff).await;
            backoff = backoff.saturating_mul(2);
        }
    }

    let total = settings.max_retries + 1;
    Err(
        SpecialistFailure::execution_failed(name, format!("failed after {total} attempts: {last_error}"))
            .with_details(json!({ "attempts": total, "last_error": last_error })),
    )
}
