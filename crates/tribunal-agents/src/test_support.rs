//! Mock collaborators and fixtures shared by unit and integration tests.
//!
//! `MockSpecialist` and the scripted examiners never touch the CLI, so the
//! whole pipeline can run under `cargo test`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tribunal_models::agent_message::{
    SpecialistCategory, SpecialistEstimate, SpecialistRequest, Stance,
};
use tribunal_models::analysis::{DebateOutcome, DebateTest};
use tribunal_models::market::{EventContext, EventType, MarketBrief, VolatilityRegime, INPUT_SCHEMA_VERSION};

use crate::cross_exam::run_battery;
use crate::error::AgentError;
use crate::examiner::{CrossExaminer, ExaminationReport, ExaminationRequest};
use crate::registry::{SpecialistProfile, SpecialistRegistry};
use crate::specialist::SpecialistAgent;

/// Economic market on a March rate cut: 42% implied, three weeks to expiry.
pub fn sample_brief() -> MarketBrief {
    MarketBrief {
        market_id: "0xabc123".to_string(),
        schema_version: INPUT_SCHEMA_VERSION,
        question: "Will the Fed cut rates at the March meeting?".to_string(),
        resolution_criteria: "Resolves YES if the FOMC lowers the target range at its March meeting."
            .to_string(),
        event_type: EventType::Economic,
        current_probability: 0.42,
        liquidity_score: 7.5,
        volume_24h: 125_000.0,
        bid_ask_spread: 0.02,
        volatility_regime: VolatilityRegime::Medium,
        expiry_timestamp: Utc::now() + chrono::Duration::days(21),
        event_context: Some(EventContext {
            event_id: "fomc-march".to_string(),
            title: "FOMC March decision".to_string(),
            description: None,
            keywords: vec!["Fed".to_string(), "Interest Rates".to_string()],
        }),
        keywords: vec!["FOMC".to_string(), "cut".to_string()],
    }
}

pub fn estimate(name: &str, stance: Stance, fair: f64, confidence: f64) -> SpecialistEstimate {
    SpecialistEstimate {
        agent_name: name.to_string(),
        timestamp: Utc::now(),
        stance,
        fair_probability: fair,
        confidence,
        key_drivers: vec![format!("{name} sees the price at {:.0}%", fair * 100.0)],
        risk_factors: vec![format!("{name} could be wrong")],
        metadata: serde_json::Map::new(),
    }
}

#[derive(Debug, Clone)]
enum Behavior {
    Fixed,
    Failing,
    Slow(Duration),
    /// Fail this many calls, then answer.
    Flaky(u32),
    ReportingTimeout(u64),
}

/// A specialist with canned behavior that counts its calls.
pub struct MockSpecialist {
    pub name: &'static str,
    pub category: SpecialistCategory,
    template: SpecialistEstimate,
    behavior: Behavior,
    calls: AtomicU32,
}

impl MockSpecialist {
    fn with_behavior(name: &'static str, behavior: Behavior, stance: Stance, fair: f64, confidence: f64) -> Self {
        Self {
            name,
            category: SpecialistCategory::Baseline,
            template: estimate(name, stance, fair, confidence),
            behavior,
            calls: AtomicU32::new(0),
        }
    }

    pub fn fixed(name: &'static str, stance: Stance, fair: f64, confidence: f64) -> Self {
        Self::with_behavior(name, Behavior::Fixed, stance, fair, confidence)
    }

    pub fn failing(name: &'static str) -> Self {
        Self::with_behavior(name, Behavior::Failing, Stance::Neutral, 0.5, 0.0)
    }

    pub fn slow(name: &'static str, delay: Duration, stance: Stance, fair: f64, confidence: f64) -> Self {
        Self::with_behavior(name, Behavior::Slow(delay), stance, fair, confidence)
    }

    pub fn flaky(name: &'static str, failures: u32, stance: Stance, fair: f64, confidence: f64) -> Self {
        Self::with_behavior(name, Behavior::Flaky(failures), stance, fair, confidence)
    }

    pub fn reporting_timeout(name: &'static str, timeout_ms: u64) -> Self {
        Self::with_behavior(name, Behavior::ReportingTimeout(timeout_ms), Stance::Neutral, 0.5, 0.0)
    }

    pub fn with_drivers(mut self, drivers: &[&str], risks: &[&str]) -> Self {
        self.template.key_drivers = drivers.iter().map(|s| s.to_string()).collect();
        self.template.risk_factors = risks.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_category(mut self, category: SpecialistCategory) -> Self {
        self.category = category;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn answer(&self) -> SpecialistEstimate {
        SpecialistEstimate {
            timestamp: Utc::now(),
            ..self.template.clone()
        }
    }
}

#[async_trait]
impl SpecialistAgent for MockSpecialist {
    fn name(&self) -> &str {
        self.name
    }

    fn category(&self) -> SpecialistCategory {
        self.category
    }

    async fn evaluate(&self, _request: &SpecialistRequest) -> Result<SpecialistEstimate, AgentError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        match &self.behavior {
            Behavior::Fixed => Ok(self.answer()),
            Behavior::Failing => Err(AgentError::Cli(format!("{} is unavailable", self.name))),
            Behavior::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(self.answer())
            }
            Behavior::Flaky(failures) if call <= *failures => {
                Err(AgentError::Cli(format!("{} call {call} failed", self.name)))
            }
            Behavior::Flaky(_) => Ok(self.answer()),
            Behavior::ReportingTimeout(ms) => Err(AgentError::Timeout(*ms)),
        }
    }
}

/// Registry where every mock is a mandatory specialist, so all of them run.
pub fn registry_with(mocks: Vec<Arc<MockSpecialist>>) -> SpecialistRegistry {
    let mut registry = SpecialistRegistry::new();
    for mock in mocks {
        let profile = SpecialistProfile::mandatory(mock.name, mock.category, "test double");
        registry.register(profile, mock);
    }
    registry
}

/// Examiner that always errors.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingExaminer;

#[async_trait]
impl CrossExaminer for FailingExaminer {
    fn name(&self) -> &str {
        "failing_examiner"
    }

    async fn examine(&self, _request: &ExaminationRequest) -> Result<ExaminationReport, AgentError> {
        Err(AgentError::Cli("examiner unavailable".to_string()))
    }
}

/// Examiner that returns a fixed report, optionally after a delay.
#[derive(Debug, Clone)]
pub struct ScriptedExaminer {
    pub report: ExaminationReport,
    pub delay: Option<Duration>,
}

impl ScriptedExaminer {
    /// All ten tests with the same outcome.
    pub fn uniform(outcome: DebateOutcome) -> Self {
        let tests = run_battery(|test_type, target| DebateTest {
            test_type,
            target,
            claim: format!("{test_type} claim"),
            challenge: format!("{test_type} challenge"),
            outcome,
            score: outcome.score(),
        });
        Self::with_tests(tests)
    }

    pub fn with_tests(tests: Vec<DebateTest>) -> Self {
        Self {
            report: ExaminationReport {
                tests,
                bull_score: None,
                bear_score: None,
                key_disagreements: Vec::new(),
            },
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl CrossExaminer for ScriptedExaminer {
    fn name(&self) -> &str {
        "scripted_examiner"
    }

    async fn examine(&self, _request: &ExaminationRequest) -> Result<ExaminationReport, AgentError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.report.clone())
    }
}
