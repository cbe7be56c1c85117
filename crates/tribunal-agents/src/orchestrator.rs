use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};
use tribunal_engine::debate::neutral_record;
use tribunal_engine::{
    build_theses, calculate_consensus, empty_signal, fallback_consensus, fuse_signals,
    generate_recommendation, no_trade_recommendation, RecommendationInput,
};
use tribunal_memory::SignalMemory;
use tribunal_models::agent_message::SpecialistEstimate;
use tribunal_models::analysis::{ConsensusResult, DebateRecord, FusedSignal, ThesisPair};
use tribunal_models::audit::AuditLog;
use tribunal_models::config::{AgentsConfig, EngineConfig, TribunalConfig};
use tribunal_models::decision::{
    AnalysisReport, Recommendation, RecommendationError, RecommendationErrorKind, TradeAction,
    OUTPUT_SCHEMA_VERSION,
};
use tribunal_models::market::{IngestionError, MarketBrief};
use uuid::Uuid;

use crate::audit::{
    Stage, AGENT_DISPATCH, AGENT_SELECTION, CONSENSUS, CROSS_EXAMINATION, INGESTION,
    MEMORY_RETRIEVAL, RECOMMENDATION, SIGNAL_FUSION, SIGNAL_PERSISTENCE, THESIS_CONSTRUCTION,
};
use crate::cross_exam::CrossExaminationEngine;
use crate::dispatcher::Dispatcher;
use crate::examiner::CrossExaminer;
use crate::registry::SpecialistRegistry;

/// Runs one market through selection, dispatch, fusion, theses,
/// cross-examination, consensus, and recommendation.
pub struct Orchestrator {
    registry: SpecialistRegistry,
    dispatcher: Dispatcher,
    memory: Arc<dyn SignalMemory>,
    cross_exam: CrossExaminationEngine,
    agents_config: AgentsConfig,
    engine_config: EngineConfig,
    persist_signals: bool,
}

impl Orchestrator {
    pub fn new(
        registry: SpecialistRegistry,
        memory: Arc<dyn SignalMemory>,
        examiner: Arc<dyn CrossExaminer>,
        config: &TribunalConfig,
    ) -> Self {
        let dispatcher = Dispatcher::new(Arc::clone(&memory), config.agents.clone(), &config.memory);
        let cross_exam = CrossExaminationEngine::new(
            examiner,
            Duration::from_secs(config.agents.examiner_timeout_seconds),
        );
        Self {
            registry,
            dispatcher,
            memory,
            cross_exam,
            agents_config: config.agents.clone(),
            engine_config: config.engine.clone(),
            persist_signals: config.memory.persist_signals,
        }
    }

    pub fn registry(&self) -> &SpecialistRegistry {
        &self.registry
    }

    /// Parse raw ingestion JSON and analyze it.
    pub async fn analyze_json(&self, raw: &str) -> Result<AnalysisReport, IngestionError> {
        let brief = MarketBrief::from_json(raw).inspect_err(|e| {
            error!(error = %e, "Rejected market brief");
        })?;
        self.analyze(&brief).await
    }

    /// Analyze one market. Only an invalid brief is an error; every later
    /// stage failure is replaced by its fallback and recorded in the audit log.
    pub async fn analyze(&self, brief: &MarketBrief) -> Result<AnalysisReport, IngestionError> {
        let start = Instant::now();
        let run_id = Uuid::new_v4();
        let now = Utc::now();
        let mut audit = AuditLog::new();
        info!(%run_id, market = %brief.market_id, question = %brief.question, "Starting analysis");

        let stage = Stage::begin(&mut audit, INGESTION);
        if let Err(e) = brief.validate() {
            stage.fail(&mut audit, &e.to_string(), "none, run aborted");
            error!(%run_id, market = %brief.market_id, error = %e, "Rejected market brief");
            return Err(e);
        }
        stage.complete(
            &mut audit,
            json!({
                "market_id": brief.market_id,
                "event_type": brief.event_type,
                "current_probability": brief.current_probability,
                "days_to_expiry": brief.days_to_expiry(now),
            }),
        );

        // Selection
        let stage = Stage::begin(&mut audit, AGENT_SELECTION);
        let selected = self.registry.select(brief, &self.agents_config);
        let picks: Vec<_> = selected
            .iter()
            .map(|s| json!({ "agent": s.name, "reason": s.reason.to_string() }))
            .collect();
        stage.complete(
            &mut audit,
            json!({
                "selected": picks,
                "below_minimum": selected.len() < self.agents_config.min_specialists,
            }),
        );

        // Dispatch. Memory lookups run inside each dispatch unit.
        let memory_stage = Stage::begin(&mut audit, MEMORY_RETRIEVAL);
        let dispatch_stage = Stage::begin(&mut audit, AGENT_DISPATCH);
        let outcome = self.dispatcher.dispatch(brief, &selected).await;
        let memory_fallbacks = outcome.memory_fallbacks;
        let timeouts = outcome.timeouts();
        audit.extend(outcome.audit);
        let estimates = outcome.estimates;
        let failures = outcome.failures;

        memory_stage.complete(
            &mut audit,
            json!({ "queried": selected.len(), "fallbacks": memory_fallbacks }),
        );
        if estimates.is_empty() && !selected.is_empty() {
            dispatch_stage.fail(&mut audit, "no specialist produced an estimate", "empty estimate set");
        } else {
            dispatch_stage.complete(
                &mut audit,
                json!({
                    "succeeded": estimates.len(),
                    "failed": failures.len(),
                    "timeouts": timeouts,
                }),
            );
        }

        self.persist(brief, &estimates, &mut audit).await;

        let fused_signal = fuse(&estimates, &mut audit);
        let theses = construct_theses(&estimates, brief.current_probability, &mut audit);
        let debate = self.cross_examine(brief, theses.as_ref(), &mut audit).await;

        // Consensus
        let stage = Stage::begin(&mut audit, CONSENSUS);
        let (consensus, consensus_fell_back) = match calculate_consensus(&estimates, Some(&debate)) {
            Ok(consensus) => {
                stage.complete(
                    &mut audit,
                    json!({
                        "consensus_probability": consensus.consensus_probability,
                        "disagreement_index": consensus.disagreement_index,
                        "regime": consensus.regime,
                    }),
                );
                (consensus, false)
            }
            Err(e) => {
                warn!(market = %brief.market_id, error = %e, "Consensus fell back");
                stage.fail(&mut audit, &e.to_string(), "consensus 0.5, band 0.3-0.7, high-uncertainty");
                (fallback_consensus(), true)
            }
        };

        // Recommendation
        let stage = Stage::begin(&mut audit, RECOMMENDATION);
        let input = RecommendationInput {
            brief,
            consensus: &consensus,
            theses: theses.as_ref(),
            estimates: &estimates,
            min_edge_threshold: self.engine_config.min_edge_threshold,
            now,
        };
        let generated = if consensus_fell_back {
            no_trade_recommendation(&input)
        } else {
            generate_recommendation(&input)
        };
        let recommendation = match generated {
            Ok(rec) => {
                stage.complete(
                    &mut audit,
                    json!({
                        "action": rec.action,
                        "edge": rec.metadata.edge,
                        "expected_value": rec.expected_value,
                        "win_probability": rec.win_probability,
                    }),
                );
                Some(rec)
            }
            Err(e) => {
                warn!(market = %brief.market_id, error = %e, "Recommendation failed");
                stage.fail(&mut audit, &e.to_string(), "no recommendation");
                None
            }
        };

        let error = recommendation_error(
            &estimates,
            failures.len(),
            consensus_fell_back,
            recommendation.as_ref(),
            &consensus,
            brief.current_probability,
            self.engine_config.min_edge_threshold,
        );

        let processing_time_ms = start.elapsed().as_millis() as u64;
        info!(
            %run_id,
            market = %brief.market_id,
            action = ?recommendation.as_ref().map(|r| r.action),
            error = ?error.as_ref().map(|e| e.kind),
            estimates = estimates.len(),
            failures = failures.len(),
            elapsed_ms = processing_time_ms,
            "Analysis complete"
        );

        Ok(AnalysisReport {
            run_id,
            schema_version: OUTPUT_SCHEMA_VERSION,
            market_id: brief.market_id.clone(),
            analyzed_at: now,
            recommendation,
            error,
            estimates,
            failures,
            fused_signal,
            theses,
            debate,
            consensus,
            audit,
            processing_time_ms,
        })
    }

    async fn persist(&self, brief: &MarketBrief, estimates: &[SpecialistEstimate], audit: &mut AuditLog) {
        let stage = Stage::begin(audit, SIGNAL_PERSISTENCE);
        if !self.persist_signals || estimates.is_empty() {
            let reason = if self.persist_signals { "no estimates" } else { "disabled" };
            stage.complete(audit, json!({ "skipped": true, "reason": reason }));
            return;
        }
        match self.memory.record_signals(&brief.market_id, estimates).await {
            Ok(()) => stage.complete(audit, json!({ "rows": estimates.len() })),
            Err(e) => {
                warn!(market = %brief.market_id, error = %e, "Failed to persist estimates");
                stage.fail(audit, &e.to_string(), "estimates not persisted");
            }
        }
    }

    async fn cross_examine(
        &self,
        brief: &MarketBrief,
        theses: Option<&ThesisPair>,
        audit: &mut AuditLog,
    ) -> DebateRecord {
        let stage = Stage::begin(audit, CROSS_EXAMINATION);
        let Some(theses) = theses else {
            let reason = "no theses to examine";
            stage.fail(audit, reason, "10 neutral tests");
            return neutral_record(reason);
        };

        match self.cross_exam.examine(brief, theses, Utc::now()).await {
            Ok(record) => {
                stage.complete(
                    audit,
                    json!({
                        "examiner": self.cross_exam.examiner_name(),
                        "bull_score": record.bull_score,
                        "bear_score": record.bear_score,
                        "disagreements": record.key_disagreements.len(),
                    }),
                );
                record
            }
            Err(e) => {
                warn!(
                    market = %brief.market_id,
                    examiner = %self.cross_exam.examiner_name(),
                    error = %e,
                    "Cross-examination failed, using neutral record"
                );
                let reason = e.to_string();
                stage.fail(audit, &reason, "10 neutral tests");
                neutral_record(&reason)
            }
        }
    }
}

fn fuse(estimates: &[SpecialistEstimate], audit: &mut AuditLog) -> FusedSignal {
    let stage = Stage::begin(audit, SIGNAL_FUSION);
    match fuse_signals(estimates) {
        Ok(signal) => {
            stage.complete(
                audit,
                json!({
                    "weighted_probability": signal.weighted_probability,
                    "alignment": signal.alignment,
                    "conflicts": signal.conflicts.len(),
                }),
            );
            signal
        }
        Err(e) => {
            warn!(error = %e, "Signal fusion failed");
            stage.fail(audit, &e.to_string(), "probability 0.5, alignment 0.0");
            empty_signal()
        }
    }
}

fn construct_theses(
    estimates: &[SpecialistEstimate],
    market_probability: f64,
    audit: &mut AuditLog,
) -> Option<ThesisPair> {
    let stage = Stage::begin(audit, THESIS_CONSTRUCTION);
    match build_theses(estimates, market_probability) {
        Ok(theses) => {
            stage.complete(
                audit,
                json!({
                    "bull_supporters": theses.bull.supporting_agents.len(),
                    "bear_supporters": theses.bear.supporting_agents.len(),
                    "bull_edge": theses.bull.edge,
                    "bear_edge": theses.bear.edge,
                }),
            );
            Some(theses)
        }
        Err(e) => {
            warn!(error = %e, "Thesis construction failed");
            stage.fail(audit, &e.to_string(), "no theses");
            None
        }
    }
}

/// The one error reported with a run, by precedence: no data, then a failed
/// consensus or recommendation, then a below-threshold edge.
fn recommendation_error(
    estimates: &[SpecialistEstimate],
    failures: usize,
    consensus_fell_back: bool,
    recommendation: Option<&Recommendation>,
    consensus: &ConsensusResult,
    market_probability: f64,
    min_edge_threshold: f64,
) -> Option<RecommendationError> {
    if estimates.is_empty() {
        return Some(RecommendationError::new(
            RecommendationErrorKind::InsufficientData,
            format!("No specialist produced an estimate ({failures} failed)"),
        ));
    }

    let Some(recommendation) = recommendation.filter(|_| !consensus_fell_back) else {
        return Some(RecommendationError::new(
            RecommendationErrorKind::ConsensusFailed,
            "Consensus could not be calculated from the available estimates",
        ));
    };

    if recommendation.action == TradeAction::NoTrade {
        let edge = (consensus.consensus_probability - market_probability).abs();
        return Some(RecommendationError::new(
            RecommendationErrorKind::NoEdge,
            format!(
                "Edge {:.1} pts is below the {:.1} pt threshold",
                edge * 100.0,
                min_edge_threshold * 100.0
            ),
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{estimate, registry_with, sample_brief, MockSpecialist, ScriptedExaminer};
    use tribunal_memory::NoopMemory;
    use tribunal_models::agent_message::Stance;
    use tribunal_models::analysis::DebateOutcome;
    use tribunal_models::audit::AuditStatus;

    fn orchestrator(mocks: Vec<Arc<MockSpecialist>>) -> Orchestrator {
        let mut config = TribunalConfig::default();
        config.agents.max_retries = 0;
        config.agents.initial_backoff_ms = 1;
        Orchestrator::new(
            registry_with(mocks),
            Arc::new(NoopMemory),
            Arc::new(ScriptedExaminer::uniform(DebateOutcome::Weakened)),
            &config,
        )
    }

    fn rec_for(consensus: f64, market: f64) -> (Recommendation, ConsensusResult) {
        let mut brief = sample_brief();
        brief.current_probability = market;
        let estimates = vec![estimate("a", Stance::Yes, consensus, 0.7)];
        let consensus = calculate_consensus(&estimates, None).unwrap();
        let input = RecommendationInput {
            brief: &brief,
            consensus: &consensus,
            theses: None,
            estimates: &estimates,
            min_edge_threshold: 0.05,
            now: Utc::now(),
        };
        (generate_recommendation(&input).unwrap(), consensus)
    }

    #[test]
    fn missing_estimates_outrank_other_errors() {
        let consensus = fallback_consensus();
        let err = recommendation_error(&[], 3, true, None, &consensus, 0.5, 0.05).unwrap();
        assert_eq!(err.kind, RecommendationErrorKind::InsufficientData);
        assert!(err.message.contains("3 failed"));
    }

    #[test]
    fn fallback_consensus_is_consensus_failed() {
        let (rec, consensus) = rec_for(0.7, 0.5);
        let estimates = vec![estimate("a", Stance::Yes, 0.7, 0.7)];
        let err =
            recommendation_error(&estimates, 0, true, Some(&rec), &fallback_consensus(), 0.5, 0.05).unwrap();
        assert_eq!(err.kind, RecommendationErrorKind::ConsensusFailed);

        // a failed recommendation stage reports the same kind
        let err = recommendation_error(&estimates, 0, false, None, &consensus, 0.5, 0.05).unwrap();
        assert_eq!(err.kind, RecommendationErrorKind::ConsensusFailed);
    }

    #[test]
    fn small_edge_is_no_edge() {
        let (rec, consensus) = rec_for(0.52, 0.5);
        assert_eq!(rec.action, TradeAction::NoTrade);
        let estimates = vec![estimate("a", Stance::Yes, 0.52, 0.7)];
        let err = recommendation_error(&estimates, 0, false, Some(&rec), &consensus, 0.5, 0.05).unwrap();
        assert_eq!(err.kind, RecommendationErrorKind::NoEdge);
    }

    #[test]
    fn tradeable_edge_has_no_error() {
        let (rec, consensus) = rec_for(0.7, 0.5);
        let estimates = vec![estimate("a", Stance::Yes, 0.7, 0.7)];
        assert!(recommendation_error(&estimates, 0, false, Some(&rec), &consensus, 0.5, 0.05).is_none());
    }

    #[tokio::test]
    async fn every_stage_is_opened_and_closed() {
        let orchestrator = orchestrator(vec![
            Arc::new(MockSpecialist::fixed("a", Stance::Yes, 0.7, 0.8)),
            Arc::new(MockSpecialist::fixed("b", Stance::No, 0.35, 0.5)),
        ]);
        let report = orchestrator.analyze(&sample_brief()).await.unwrap();

        for stage in crate::audit::STAGES {
            let statuses: Vec<_> = report.audit.stage(stage).map(|e| e.status).collect();
            assert_eq!(statuses.first(), Some(&AuditStatus::Started), "{stage} never started");
            assert!(
                statuses.len() >= 2 && statuses.last() != Some(&AuditStatus::Started),
                "{stage} never closed"
            );
        }
        // NoopMemory stores nothing, so persistence completes trivially.
        assert_eq!(report.audit.last_status(SIGNAL_PERSISTENCE), Some(AuditStatus::Completed));
    }

    #[tokio::test]
    async fn invalid_brief_aborts_before_dispatch() {
        let agent = Arc::new(MockSpecialist::fixed("a", Stance::Yes, 0.7, 0.8));
        let orchestrator = orchestrator(vec![Arc::clone(&agent)]);
        let mut brief = sample_brief();
        brief.current_probability = 1.4;

        let err = orchestrator.analyze(&brief).await.unwrap_err();
        assert!(matches!(err, IngestionError::InvalidField { ref field, .. } if field == "current_probability"));
        assert_eq!(agent.calls(), 0);
    }

    #[tokio::test]
    async fn empty_input_is_missing_brief() {
        let orchestrator = orchestrator(vec![]);
        assert_eq!(
            orchestrator.analyze_json("  ").await.unwrap_err(),
            IngestionError::MissingBrief
        );
    }
}
