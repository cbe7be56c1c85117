use std::fmt;

use serde::{Deserialize, Serialize};

use crate::agent_message::Stance;

/// Confidence-weighted aggregate of all successful estimates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FusedSignal {
    pub weighted_probability: f64,
    /// 0.0 (total disagreement) to 1.0 (unanimous).
    pub alignment: f64,
    pub conflicts: Vec<String>,
    pub contributors: Vec<String>,
}

/// One side's structured argument. Bull theses argue YES, bear theses argue NO.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Thesis {
    pub stance: Stance,
    pub fair_probability: f64,
    pub market_probability: f64,
    /// |fair_probability - market_probability|
    pub edge: f64,
    pub core_argument: String,
    pub catalysts: Vec<String>,
    pub failure_conditions: Vec<String>,
    pub supporting_agents: Vec<String>,
}

impl Thesis {
    pub fn has_support(&self) -> bool {
        !self.supporting_agents.is_empty()
    }
}

/// Bull and bear theses for one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThesisPair {
    pub bull: Thesis,
    pub bear: Thesis,
}

/// The five adversarial tests, in the order they are run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TestType {
    Evidence,
    Causality,
    Timing,
    Liquidity,
    TailRisk,
}

impl TestType {
    pub const SEQUENCE: [TestType; 5] = [
        TestType::Evidence,
        TestType::Causality,
        TestType::Timing,
        TestType::Liquidity,
        TestType::TailRisk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TestType::Evidence => "evidence",
            TestType::Causality => "causality",
            TestType::Timing => "timing",
            TestType::Liquidity => "liquidity",
            TestType::TailRisk => "tail-risk",
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DebateOutcome {
    Survived,
    Weakened,
    Refuted,
}

impl DebateOutcome {
    /// Fixed outcome-to-score mapping.
    pub fn score(&self) -> i8 {
        match self {
            DebateOutcome::Survived => 1,
            DebateOutcome::Weakened => 0,
            DebateOutcome::Refuted => -1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebateTest {
    pub test_type: TestType,
    /// Which thesis was under test (YES for bull, NO for bear).
    pub target: Stance,
    pub claim: String,
    pub challenge: String,
    pub outcome: DebateOutcome,
    /// Always re-derived from `outcome` before use.
    #[serde(default)]
    pub score: i8,
}

impl DebateTest {
    pub fn neutral(test_type: TestType, target: Stance, reason: &str) -> Self {
        Self {
            test_type,
            target,
            claim: format!("{} test not evaluated", test_type),
            challenge: reason.to_string(),
            outcome: DebateOutcome::Weakened,
            score: DebateOutcome::Weakened.score(),
        }
    }
}

/// Full cross-examination result: ten tests and the aggregate per side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebateRecord {
    pub tests: Vec<DebateTest>,
    /// Mean of the bull thesis test scores, -1.0 to 1.0.
    pub bull_score: f64,
    /// Mean of the bear thesis test scores, -1.0 to 1.0.
    pub bear_score: f64,
    pub key_disagreements: Vec<String>,
}

impl DebateRecord {
    pub fn tests_for(&self, target: Stance) -> impl Iterator<Item = &DebateTest> {
        self.tests.iter().filter(move |t| t.target == target)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Regime {
    HighConfidence,
    ModerateConfidence,
    HighUncertainty,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ConfidenceBand {
    pub lower: f64,
    pub upper: f64,
}

impl ConfidenceBand {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsensusResult {
    pub consensus_probability: f64,
    pub confidence_band: ConfidenceBand,
    /// 0.0 (full agreement) to 1.0 (maximal spread).
    pub disagreement_index: f64,
    pub regime: Regime,
    /// Specialist ids ordered by descending weight.
    pub contributing_signals: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_serialization() {
        assert_eq!(
            serde_json::to_string(&TestType::TailRisk).unwrap(),
            "\"tail-risk\""
        );
        assert_eq!(TestType::TailRisk.to_string(), "tail-risk");
    }

    #[test]
    fn outcome_scores_are_fixed() {
        assert_eq!(DebateOutcome::Survived.score(), 1);
        assert_eq!(DebateOutcome::Weakened.score(), 0);
        assert_eq!(DebateOutcome::Refuted.score(), -1);
    }

    #[test]
    fn regime_serialization() {
        assert_eq!(
            serde_json::to_string(&Regime::HighUncertainty).unwrap(),
            "\"high-uncertainty\""
        );
    }

    #[test]
    fn neutral_test_is_weakened_with_zero_score() {
        let test = DebateTest::neutral(TestType::Timing, Stance::No, "examiner unreachable");
        assert_eq!(test.outcome, DebateOutcome::Weakened);
        assert_eq!(test.score, 0);
        assert_eq!(test.target, Stance::No);
    }

    #[test]
    fn tests_for_filters_by_target() {
        let record = DebateRecord {
            tests: vec![
                DebateTest::neutral(TestType::Evidence, Stance::Yes, "n/a"),
                DebateTest::neutral(TestType::Evidence, Stance::No, "n/a"),
            ],
            bull_score: 0.0,
            bear_score: 0.0,
            key_disagreements: vec![],
        };
        assert_eq!(record.tests_for(Stance::Yes).count(), 1);
    }
}
