use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::market::MarketBrief;

/// Metadata key a specialist may set to report its track record (0.0 to 1.0).
pub const HISTORICAL_ACCURACY_KEY: &str = "historical_accuracy";

/// Specialist families. Selection is enabled or disabled per category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SpecialistCategory {
    Baseline,
    EventIntelligence,
    PollingStatistical,
    SentimentNarrative,
    PriceAction,
    EventScenario,
}

impl SpecialistCategory {
    pub const ALL: [SpecialistCategory; 6] = [
        SpecialistCategory::Baseline,
        SpecialistCategory::EventIntelligence,
        SpecialistCategory::PollingStatistical,
        SpecialistCategory::SentimentNarrative,
        SpecialistCategory::PriceAction,
        SpecialistCategory::EventScenario,
    ];
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Stance {
    Yes,
    No,
    Neutral,
}

/// Request sent to a specialist (serialized as JSON for CLI-backed specialists).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpecialistRequest {
    pub request_id: Uuid,
    pub agent_name: String,
    pub brief: MarketBrief,
    /// Prior estimates by this specialist for the same market, newest first.
    pub memory: Vec<SpecialistEstimate>,
    /// The specialist must answer before this instant.
    pub deadline: DateTime<Utc>,
}

/// One specialist's structured opinion on a market.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpecialistEstimate {
    pub agent_name: String,
    pub timestamp: DateTime<Utc>,
    pub stance: Stance,
    /// Specialist's fair YES probability, 0.0 to 1.0.
    pub fair_probability: f64,
    /// 0.0 to 1.0 confidence in `fair_probability`.
    pub confidence: f64,
    #[serde(default)]
    pub key_drivers: Vec<String>,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl SpecialistEstimate {
    /// Reject estimates whose numeric fields are non-finite or outside [0, 1].
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("fair_probability", self.fair_probability),
            ("confidence", self.confidence),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(format!("{field} {value} is outside [0, 1]"));
            }
        }
        if let Some(accuracy) = self.historical_accuracy() {
            if !(0.0..=1.0).contains(&accuracy) {
                return Err(format!("{HISTORICAL_ACCURACY_KEY} {accuracy} is outside [0, 1]"));
            }
        }
        Ok(())
    }

    /// The specialist's self-reported track record, if present and numeric.
    pub fn historical_accuracy(&self) -> Option<f64> {
        self.metadata
            .get(HISTORICAL_ACCURACY_KEY)
            .and_then(|v| v.as_f64())
            .filter(|v| v.is_finite())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    Timeout,
    ExecutionFailed,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Timeout => write!(f, "TIMEOUT"),
            FailureKind::ExecutionFailed => write!(f, "EXECUTION_FAILED"),
        }
    }
}

/// A specialist invocation that produced no estimate. Local to one specialist.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[error("{kind} in {agent_name}: {message}")]
pub struct SpecialistFailure {
    pub kind: FailureKind,
    pub agent_name: String,
    pub message: String,
    pub timeout_ms: Option<u64>,
    pub details: Option<serde_json::Value>,
}

impl SpecialistFailure {
    pub fn timeout(agent_name: &str, timeout_ms: u64) -> Self {
        Self {
            kind: FailureKind::Timeout,
            agent_name: agent_name.to_string(),
            message: format!("no estimate within {timeout_ms}ms"),
            timeout_ms: Some(timeout_ms),
            details: None,
        }
    }

    pub fn execution_failed(agent_name: &str, message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::ExecutionFailed,
            agent_name: agent_name.to_string(),
            message: message.into(),
            timeout_ms: None,
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::market::tests::sample_brief;

    pub fn sample_estimate(name: &str, stance: Stance, fair: f64, confidence: f64) -> SpecialistEstimate {
        SpecialistEstimate {
            agent_name: name.to_string(),
            timestamp: Utc::now(),
            stance,
            fair_probability: fair,
            confidence,
            key_drivers: vec!["Fed officials signalled patience".to_string()],
            risk_factors: vec!["Hot CPI print".to_string()],
            metadata: serde_json::Map::new(),
        }
    }

    #[test]
    fn roundtrip_specialist_request() {
        let request = SpecialistRequest {
            request_id: Uuid::new_v4(),
            agent_name: "probability_baseline".to_string(),
            brief: sample_brief(),
            memory: vec![sample_estimate("probability_baseline", Stance::Yes, 0.55, 0.6)],
            deadline: Utc::now(),
        };

        let json = serde_json::to_string(&request).unwrap();
        let deserialized: SpecialistRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(request, deserialized);
    }

    #[test]
    fn estimate_defaults_optional_lists() {
        let json = r#"{
            "agent_name": "momentum",
            "timestamp": "2026-03-01T12:00:00Z",
            "stance": "NO",
            "fair_probability": 0.31,
            "confidence": 0.7
        }"#;
        let estimate: SpecialistEstimate = serde_json::from_str(json).unwrap();
        assert_eq!(estimate.stance, Stance::No);
        assert!(estimate.key_drivers.is_empty());
        assert!(estimate.metadata.is_empty());
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let mut estimate = sample_estimate("a", Stance::Yes, 0.6, 0.5);
        assert!(estimate.validate().is_ok());

        estimate.confidence = 1.2;
        assert!(estimate.validate().is_err());

        estimate.confidence = 0.5;
        estimate.fair_probability = f64::NAN;
        assert!(estimate.validate().is_err());
    }

    #[test]
    fn historical_accuracy_read_from_metadata() {
        let mut estimate = sample_estimate("a", Stance::Yes, 0.6, 0.5);
        assert_eq!(estimate.historical_accuracy(), None);
        estimate
            .metadata
            .insert(HISTORICAL_ACCURACY_KEY.to_string(), serde_json::json!(0.8));
        assert_eq!(estimate.historical_accuracy(), Some(0.8));
    }

    #[test]
    fn failure_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&FailureKind::ExecutionFailed).unwrap(),
            "\"EXECUTION_FAILED\""
        );
        let failure = SpecialistFailure::timeout("tail_risk", 45_000);
        assert_eq!(failure.to_string(), "TIMEOUT in tail_risk: no estimate within 45000ms");
    }
}
