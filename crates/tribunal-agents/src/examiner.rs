use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tribunal_engine::thesis::{NO_CATALYSTS, NO_FAILURE_CONDITIONS};
use tribunal_models::agent_message::Stance;
use tribunal_models::analysis::{DebateOutcome, DebateTest, TestType, Thesis, ThesisPair};
use tribunal_models::market::{MarketBrief, VolatilityRegime};

use crate::claude_cli::{invoke_claude, ClaudeCliConfig};
use crate::cross_exam::run_battery;
use crate::error::AgentError;
use crate::parser::parse_examination_report;
use crate::prompts::examiner_system_prompt;

/// What the cross-examination collaborator sees: both theses plus the market
/// context the tests need.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExaminationRequest {
    pub market_id: String,
    pub question: String,
    pub market_probability: f64,
    pub liquidity_score: f64,
    pub volume_24h: f64,
    pub bid_ask_spread: f64,
    pub volatility_regime: VolatilityRegime,
    pub days_to_expiry: f64,
    pub theses: ThesisPair,
}

impl ExaminationRequest {
    pub fn new(brief: &MarketBrief, theses: &ThesisPair, now: DateTime<Utc>) -> Self {
        Self {
            market_id: brief.market_id.clone(),
            question: brief.question.clone(),
            market_probability: brief.current_probability,
            liquidity_score: brief.liquidity_score,
            volume_24h: brief.volume_24h,
            bid_ask_spread: brief.bid_ask_spread,
            volatility_regime: brief.volatility_regime,
            days_to_expiry: brief.days_to_expiry(now),
            theses: theses.clone(),
        }
    }
}

/// Raw collaborator output. Validated and normalized by the engine before use.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExaminationReport {
    pub tests: Vec<DebateTest>,
    #[serde(default)]
    pub bull_score: Option<f64>,
    #[serde(default)]
    pub bear_score: Option<f64>,
    #[serde(default)]
    pub key_disagreements: Vec<String>,
}

/// Runs the adversarial test battery against both theses. Mockable for testing.
#[async_trait]
pub trait CrossExaminer: Send + Sync {
    fn name(&self) -> &str;

    async fn examine(&self, request: &ExaminationRequest) -> Result<ExaminationReport, AgentError>;
}

/// Cross-examiner backed by the `claude` CLI.
pub struct ClaudeCrossExaminer {
    pub cli_config: ClaudeCliConfig,
}

impl ClaudeCrossExaminer {
    pub fn new(cli_config: ClaudeCliConfig) -> Self {
        Self { cli_config }
    }
}

#[async_trait]
impl CrossExaminer for ClaudeCrossExaminer {
    fn name(&self) -> &str {
        "claude_examiner"
    }

    async fn examine(&self, request: &ExaminationRequest) -> Result<ExaminationReport, AgentError> {
        let user_prompt = serde_json::to_string_pretty(request)?;
        let raw_output = invoke_claude(&examiner_system_prompt(), &user_prompt, &self.cli_config).await?;
        parse_examination_report(&raw_output)
    }
}

/// Deterministic examiner that scores each test from thesis content and
/// market context. Used offline and as a reference for the CLI examiner.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleBasedExaminer;

fn real_entries<'a>(items: &'a [String], placeholder: &str) -> Vec<&'a String> {
    items.iter().filter(|i| i.as_str() != placeholder).collect()
}

fn side(target: Stance) -> &'static str {
    match target {
        Stance::No => "bear",
        _ => "bull",
    }
}

fn test(test_type: TestType, target: Stance, claim: String, challenge: String, outcome: DebateOutcome) -> DebateTest {
    DebateTest {
        test_type,
        target,
        claim,
        challenge,
        outcome,
        score: outcome.score(),
    }
}

impl RuleBasedExaminer {
    pub fn evaluate(&self, test_type: TestType, thesis: &Thesis, request: &ExaminationRequest) -> DebateTest {
        use DebateOutcome::{Refuted, Survived, Weakened};

        let target = thesis.stance;
        if !thesis.has_support() {
            return test(
                test_type,
                target,
                format!("The {} thesis has no supporting specialists", side(target)),
                "No specialist argues this side".to_string(),
                Refuted,
            );
        }

        let supporters = thesis.supporting_agents.len();
        let catalysts = real_entries(&thesis.catalysts, NO_CATALYSTS);
        let failures = real_entries(&thesis.failure_conditions, NO_FAILURE_CONDITIONS);
        let edge_pts = thesis.edge * 100.0;

        match test_type {
            TestType::Evidence => {
                let claim = format!(
                    "{supporters} specialist(s) back a fair probability of {:.0}%",
                    thesis.fair_probability * 100.0
                );
                let (challenge, outcome) = if supporters >= 2 && thesis.edge > 0.0 {
                    ("Independent specialists converge on the same side".to_string(), Survived)
                } else if thesis.edge == 0.0 {
                    ("Supporters see no gap to the market price".to_string(), Refuted)
                } else {
                    ("A single specialist is thin evidence".to_string(), Weakened)
                };
                test(test_type, target, claim, challenge, outcome)
            }
            TestType::Causality => {
                let claim = match catalysts.first() {
                    Some(first) => format!("{first} drives the outcome"),
                    None => "The outcome follows from the supporters' drivers".to_string(),
                };
                let (challenge, outcome) = match catalysts.len() {
                    0 => ("No identifiable catalyst links drivers to resolution".to_string(), Refuted),
                    1 => ("A single catalyst is a single point of failure".to_string(), Weakened),
                    n => (format!("{n} distinct catalysts point the same way"), Survived),
                };
                test(test_type, target, claim, challenge, outcome)
            }
            TestType::Timing => {
                let days = request.days_to_expiry;
                let claim = format!("The thesis plays out within {days:.0} days");
                let (challenge, outcome) = if days < 2.0 {
                    ("Too little time remains for the price to move".to_string(), Refuted)
                } else if days <= 7.0 || catalysts.is_empty() {
                    ("The window is short or no dated catalyst falls inside it".to_string(), Weakened)
                } else {
                    ("Catalysts fall comfortably before expiry".to_string(), Survived)
                };
                test(test_type, target, claim, challenge, outcome)
            }
            TestType::Liquidity => {
                let spread_pts = request.bid_ask_spread * 100.0;
                let claim = format!("A {edge_pts:.1} pt edge survives a {spread_pts:.1} pt spread");
                let (challenge, outcome) =
                    if request.liquidity_score < 4.0 || request.bid_ask_spread >= thesis.edge {
                        ("Transaction costs or a thin book consume the edge".to_string(), Refuted)
                    } else if request.liquidity_score >= 7.0 && request.bid_ask_spread <= thesis.edge / 2.0 {
                        ("Deep book and the edge clears costs twice over".to_string(), Survived)
                    } else {
                        ("The edge clears costs only narrowly".to_string(), Weakened)
                    };
                test(test_type, target, claim, challenge, outcome)
            }
            TestType::TailRisk => {
                let high_vol = request.volatility_regime == VolatilityRegime::High;
                let claim = format!("{} identified failure condition(s) are manageable", failures.len());
                let (challenge, outcome) = if high_vol && failures.len() >= 3 {
                    ("Several failure paths in a high-volatility market".to_string(), Refuted)
                } else if high_vol || failures.len() >= 3 {
                    ("Volatility or the number of failure paths adds real risk".to_string(), Weakened)
                } else {
                    ("Few failure paths in a calm market".to_string(), Survived)
                };
                test(test_type, target, claim, challenge, outcome)
            }
        }
    }
}

#[async_trait]
impl CrossExaminer for RuleBasedExaminer {
    fn name(&self) -> &str {
        "rule_based_examiner"
    }

    async fn examine(&self, request: &ExaminationRequest) -> Result<ExaminationReport, AgentError> {
        let tests = run_battery(|test_type, target| {
            let thesis = match target {
                Stance::No => &request.theses.bear,
                _ => &request.theses.bull,
            };
            self.evaluate(test_type, thesis, request)
        });
        Ok(ExaminationReport {
            tests,
            bull_score: None,
            bear_score: None,
            key_disagreements: Vec::new(),
        })
    }
}
