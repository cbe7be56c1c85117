//! End-to-end pipeline runs with mock specialists and scripted examiners.
//!
//! Each test builds an `Orchestrator` over in-process collaborators and checks
//! the `AnalysisReport` it produces: recommendation, reported error, fallback
//! values, and the audit trail.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tribunal_agents::audit::{CONSENSUS, CROSS_EXAMINATION, MEMORY_RETRIEVAL, SIGNAL_PERSISTENCE};
use tribunal_agents::examiner::CrossExaminer;
use tribunal_agents::registry::DEFAULT_PROFILES;
use tribunal_agents::test_support::{
    registry_with, sample_brief, FailingExaminer, MockSpecialist, ScriptedExaminer,
};
use tribunal_agents::{Orchestrator, RuleBasedExaminer, SpecialistRegistry};
use tribunal_memory::{MemoryError, NoopMemory, SignalMemory, SqliteSignalStore, SqliteStore};
use tribunal_models::agent_message::{SpecialistEstimate, Stance};
use tribunal_models::analysis::DebateOutcome;
use tribunal_models::audit::AuditStatus;
use tribunal_models::config::{SpecialistConfig, TribunalConfig};
use tribunal_models::decision::{RecommendationErrorKind, TradeAction};
use tribunal_models::market::IngestionError;

fn fast_config() -> TribunalConfig {
    let mut config = TribunalConfig::default();
    config.agents.max_retries = 0;
    config.agents.initial_backoff_ms = 1;
    config.agents.specialist_timeout_seconds = 5;
    config.agents.examiner_timeout_seconds = 5;
    config
}

fn orchestrator_with(
    mocks: Vec<Arc<MockSpecialist>>,
    memory: Arc<dyn SignalMemory>,
    examiner: Arc<dyn CrossExaminer>,
) -> Orchestrator {
    Orchestrator::new(registry_with(mocks), memory, examiner, &fast_config())
}

fn neutral_examiner() -> Arc<dyn CrossExaminer> {
    Arc::new(ScriptedExaminer::uniform(DebateOutcome::Weakened))
}

/// Memory whose every query fails.
struct BrokenMemory;

#[async_trait]
impl SignalMemory for BrokenMemory {
    async fn recent_signals(
        &self,
        _market_id: &str,
        _agent_name: &str,
        _limit: usize,
    ) -> Result<Vec<SpecialistEstimate>, MemoryError> {
        Err(MemoryError::Unavailable("disk detached".to_string()))
    }

    async fn record_signals(
        &self,
        _market_id: &str,
        _estimates: &[SpecialistEstimate],
    ) -> Result<(), MemoryError> {
        Err(MemoryError::Unavailable("disk detached".to_string()))
    }
}

#[tokio::test]
async fn three_specialist_scenario_recommends_long_yes() {
    let orchestrator = orchestrator_with(
        vec![
            Arc::new(MockSpecialist::fixed("a", Stance::Yes, 0.9, 0.8)),
            Arc::new(MockSpecialist::fixed("b", Stance::No, 0.3, 0.5)),
            Arc::new(MockSpecialist::fixed("c", Stance::Yes, 0.6, 0.6)),
        ],
        Arc::new(NoopMemory),
        neutral_examiner(),
    );
    let mut brief = sample_brief();
    brief.current_probability = 0.50;

    let report = orchestrator.analyze(&brief).await.unwrap();

    // weights 0.8 / 0.5 / 0.6 over 1.9, and an even debate adds no shift
    let expected = (0.9 * 0.8 + 0.3 * 0.5 + 0.6 * 0.6) / 1.9;
    assert!((report.consensus.consensus_probability - expected).abs() < 1e-9);
    assert!((report.fused_signal.weighted_probability - expected).abs() < 1e-9);
    assert_eq!(report.consensus.contributing_signals, vec!["a", "c", "b"]);

    let rec = report.recommendation.unwrap();
    assert_eq!(rec.action, TradeAction::LongYes);
    assert!(rec.expected_value > Decimal::ZERO);
    assert!(report.error.is_none());
    assert_eq!(report.estimates.len(), 3);
    assert!(report.failures.is_empty());

    let theses = report.theses.unwrap();
    assert_eq!(theses.bull.supporting_agents, vec!["a", "c"]);
    assert_eq!(theses.bear.supporting_agents, vec!["b"]);
}

#[tokio::test]
async fn failing_examiner_falls_back_to_neutral_debate() {
    let orchestrator = orchestrator_with(
        vec![
            Arc::new(MockSpecialist::fixed("a", Stance::Yes, 0.7, 0.8)),
            Arc::new(MockSpecialist::fixed("b", Stance::No, 0.3, 0.6)),
        ],
        Arc::new(NoopMemory),
        Arc::new(FailingExaminer),
    );

    let report = orchestrator.analyze(&sample_brief()).await.unwrap();

    assert_eq!(report.debate.tests.len(), 10);
    assert!(report
        .debate
        .tests
        .iter()
        .all(|t| t.outcome == DebateOutcome::Weakened && t.score == 0));
    assert_eq!(report.debate.bull_score, 0.0);
    assert_eq!(report.debate.bear_score, 0.0);
    assert_eq!(report.debate.key_disagreements.len(), 1);
    assert!(report.debate.key_disagreements[0].contains("examiner unavailable"));

    assert_eq!(report.audit.last_status(CROSS_EXAMINATION), Some(AuditStatus::Failed));
    let failed = report.audit.stage(CROSS_EXAMINATION).last().unwrap();
    assert!(failed.details.contains_key("fallback"));
    assert!(failed.details.contains_key("duration_ms"));

    // the pipeline still reaches a recommendation
    assert!(report.recommendation.is_some());
}

#[tokio::test]
async fn no_successful_specialist_is_insufficient_data() {
    let orchestrator = orchestrator_with(
        vec![
            Arc::new(MockSpecialist::failing("a")),
            Arc::new(MockSpecialist::failing("b")),
        ],
        Arc::new(NoopMemory),
        neutral_examiner(),
    );

    let report = orchestrator.analyze(&sample_brief()).await.unwrap();

    let error = report.error.unwrap();
    assert_eq!(error.kind, RecommendationErrorKind::InsufficientData);
    assert_eq!(report.failures.len(), 2);
    assert!(report.estimates.is_empty());

    assert_eq!(report.fused_signal.weighted_probability, 0.5);
    assert_eq!(report.fused_signal.alignment, 0.0);
    assert!(!report.fused_signal.conflicts.is_empty());

    assert_eq!(report.consensus.consensus_probability, 0.5);
    assert_eq!(report.consensus.disagreement_index, 1.0);
    assert_eq!(report.audit.last_status(CONSENSUS), Some(AuditStatus::Failed));

    // a fallback consensus never opens a position
    let rec = report.recommendation.unwrap();
    assert_eq!(rec.action, TradeAction::NoTrade);
    assert_eq!(rec.expected_value, Decimal::ZERO);
}

#[tokio::test]
async fn small_edge_reports_no_edge_with_populated_recommendation() {
    let orchestrator = orchestrator_with(
        vec![
            Arc::new(MockSpecialist::fixed("a", Stance::Yes, 0.44, 0.7)),
            Arc::new(MockSpecialist::fixed("b", Stance::Neutral, 0.43, 0.6)),
        ],
        Arc::new(NoopMemory),
        neutral_examiner(),
    );

    let report = orchestrator.analyze(&sample_brief()).await.unwrap();

    assert_eq!(report.error.unwrap().kind, RecommendationErrorKind::NoEdge);
    let rec = report.recommendation.unwrap();
    assert_eq!(rec.action, TradeAction::NoTrade);
    assert_eq!(rec.expected_value, Decimal::ZERO);
    assert!(rec.entry_zone.low >= 0.01 && rec.entry_zone.high <= 0.99);
    assert!(rec.target_zone.low >= 0.01 && rec.target_zone.high <= 0.99);
    assert!(rec.explanation.summary.starts_with("No trade"));
}

#[tokio::test]
async fn estimates_are_persisted_between_runs() {
    let store = Arc::new(SqliteSignalStore::new(
        SqliteStore::open_in_memory().unwrap(),
        100,
        Duration::from_secs(60),
        3,
    ));
    let orchestrator = orchestrator_with(
        vec![
            Arc::new(MockSpecialist::fixed("a", Stance::Yes, 0.6, 0.7)),
            Arc::new(MockSpecialist::failing("b")),
        ],
        Arc::clone(&store) as Arc<dyn SignalMemory>,
        neutral_examiner(),
    );

    orchestrator.analyze(&sample_brief()).await.unwrap();
    let report = orchestrator.analyze(&sample_brief()).await.unwrap();
    assert_eq!(report.audit.last_status(SIGNAL_PERSISTENCE), Some(AuditStatus::Completed));

    let history = store.recent_signals("0xabc123", "a", 3).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].timestamp >= history[1].timestamp);
    // failures are never persisted
    assert!(store.recent_signals("0xabc123", "b", 3).await.unwrap().is_empty());
}

#[tokio::test]
async fn broken_memory_degrades_to_empty_history() {
    let orchestrator = orchestrator_with(
        vec![
            Arc::new(MockSpecialist::fixed("a", Stance::Yes, 0.6, 0.7)),
            Arc::new(MockSpecialist::fixed("b", Stance::Yes, 0.65, 0.6)),
        ],
        Arc::new(BrokenMemory),
        neutral_examiner(),
    );

    let report = orchestrator.analyze(&sample_brief()).await.unwrap();

    assert_eq!(report.estimates.len(), 2);
    let lookups: Vec<_> = report
        .audit
        .stage(MEMORY_RETRIEVAL)
        .filter(|e| e.status == AuditStatus::Failed)
        .collect();
    assert_eq!(lookups.len(), 2);
    assert!(lookups.iter().all(|e| e.details["fallback"] == "empty history"));
    assert_eq!(report.audit.last_status(SIGNAL_PERSISTENCE), Some(AuditStatus::Failed));
}

#[tokio::test]
async fn disabled_specialist_is_never_dispatched() {
    let momentum = Arc::new(MockSpecialist::fixed("momentum", Stance::Yes, 0.6, 0.7));
    let mut registry = SpecialistRegistry::new();
    for profile in DEFAULT_PROFILES {
        let agent = if profile.name == "momentum" {
            Arc::clone(&momentum)
        } else {
            Arc::new(MockSpecialist::fixed(profile.name, Stance::Yes, 0.55, 0.6))
        };
        registry.register(*profile, agent);
    }

    let mut config = fast_config();
    config.agents.specialists.push(SpecialistConfig {
        name: "momentum".to_string(),
        enabled: false,
        timeout_seconds: None,
        max_retries: None,
        model: None,
    });
    let orchestrator = Orchestrator::new(registry, Arc::new(NoopMemory), Arc::new(RuleBasedExaminer), &config);

    let report = orchestrator.analyze(&sample_brief()).await.unwrap();

    assert_eq!(momentum.calls(), 0);
    assert!(report.estimates.iter().all(|e| e.agent_name != "momentum"));
    assert_eq!(report.estimates.len(), 7);
}

#[tokio::test]
async fn missing_or_malformed_brief_is_rejected() {
    let orchestrator = orchestrator_with(vec![], Arc::new(NoopMemory), neutral_examiner());

    assert_eq!(orchestrator.analyze_json("").await.unwrap_err(), IngestionError::MissingBrief);
    assert!(matches!(
        orchestrator.analyze_json(r#"{"market_id": "0x1"}"#).await.unwrap_err(),
        IngestionError::Malformed { .. }
    ));
}

#[tokio::test]
async fn report_serializes_for_downstream_consumers() {
    let orchestrator = orchestrator_with(
        vec![Arc::new(MockSpecialist::fixed("a", Stance::No, 0.2, 0.9))],
        Arc::new(NoopMemory),
        neutral_examiner(),
    );

    let report = orchestrator.analyze(&sample_brief()).await.unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["recommendation"]["action"], "LONG_NO");
    assert_eq!(json["market_id"], "0xabc123");
    assert!(json["audit"].is_array());
}
