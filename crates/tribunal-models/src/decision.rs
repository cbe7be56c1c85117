use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::agent_message::{SpecialistEstimate, SpecialistFailure};
use crate::analysis::{ConfidenceBand, ConsensusResult, DebateRecord, FusedSignal, Regime, ThesisPair};
use crate::audit::AuditLog;

pub const OUTPUT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    LongYes,
    LongNo,
    NoTrade,
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::LongYes => write!(f, "LONG_YES"),
            TradeAction::LongNo => write!(f, "LONG_NO"),
            TradeAction::NoTrade => write!(f, "NO_TRADE"),
        }
    }
}

/// A price range in share-price units, always within [0.01, 0.99].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PriceZone {
    pub low: f64,
    pub high: f64,
}

impl PriceZone {
    pub fn mid(&self) -> f64 {
        (self.low + self.high) / 2.0
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LiquidityRisk {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Explanation {
    pub summary: String,
    pub core_thesis: String,
    pub key_catalysts: Vec<String>,
    pub failure_scenarios: Vec<String>,
}

/// Snapshot of the consensus inputs a recommendation was derived from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationMetadata {
    pub consensus_probability: f64,
    pub market_probability: f64,
    pub edge: f64,
    pub confidence_band: ConfidenceBand,
    pub disagreement_index: f64,
    pub regime: Regime,
    pub contributing_signals: Vec<String>,
    pub min_edge_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub market_id: String,
    pub action: TradeAction,
    pub entry_zone: PriceZone,
    pub target_zone: PriceZone,
    /// Expected dollar profit per $100 staked. Zero for NO_TRADE.
    pub expected_value: Decimal,
    pub win_probability: f64,
    pub liquidity_risk: LiquidityRisk,
    pub explanation: Explanation,
    pub metadata: RecommendationMetadata,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationErrorKind {
    ConsensusFailed,
    InsufficientData,
    NoEdge,
}

impl fmt::Display for RecommendationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecommendationErrorKind::ConsensusFailed => write!(f, "CONSENSUS_FAILED"),
            RecommendationErrorKind::InsufficientData => write!(f, "INSUFFICIENT_DATA"),
            RecommendationErrorKind::NoEdge => write!(f, "NO_EDGE"),
        }
    }
}

/// Reported alongside best-effort output; never aborts a run.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[error("{kind}: {message}")]
pub struct RecommendationError {
    pub kind: RecommendationErrorKind,
    pub message: String,
}

impl RecommendationError {
    pub fn new(kind: RecommendationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Everything one analysis run produced, in pipeline order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisReport {
    pub run_id: Uuid,
    pub schema_version: u32,
    pub market_id: String,
    pub analyzed_at: DateTime<Utc>,
    pub recommendation: Option<Recommendation>,
    pub error: Option<RecommendationError>,
    pub estimates: Vec<SpecialistEstimate>,
    pub failures: Vec<SpecialistFailure>,
    pub fused_signal: FusedSignal,
    pub theses: Option<ThesisPair>,
    pub debate: DebateRecord,
    pub consensus: ConsensusResult,
    pub audit: AuditLog,
    pub processing_time_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_recommendation() -> Recommendation {
        Recommendation {
            market_id: "0xabc123".to_string(),
            action: TradeAction::LongYes,
            entry_zone: PriceZone { low: 0.48, high: 0.52 },
            target_zone: PriceZone { low: 0.61, high: 0.67 },
            expected_value: dec!(14.25),
            win_probability: 0.58,
            liquidity_risk: LiquidityRisk::Medium,
            explanation: Explanation {
                summary: "Specialists see YES underpriced".to_string(),
                core_thesis: "Two specialists support YES".to_string(),
                key_catalysts: vec!["March FOMC meeting".to_string()],
                failure_scenarios: vec!["Hot CPI print".to_string()],
            },
            metadata: RecommendationMetadata {
                consensus_probability: 0.64,
                market_probability: 0.50,
                edge: 0.14,
                confidence_band: ConfidenceBand { lower: 0.58, upper: 0.70 },
                disagreement_index: 0.3,
                regime: Regime::ModerateConfidence,
                contributing_signals: vec!["probability_baseline".to_string()],
                min_edge_threshold: 0.05,
            },
        }
    }

    #[test]
    fn roundtrip_recommendation() {
        let rec = sample_recommendation();
        let json = serde_json::to_string(&rec).unwrap();
        let deserialized: Recommendation = serde_json::from_str(&json).unwrap();
        assert_eq!(rec, deserialized);
    }

    #[test]
    fn action_serialization() {
        assert_eq!(
            serde_json::to_string(&TradeAction::LongNo).unwrap(),
            "\"LONG_NO\""
        );
        assert_eq!(TradeAction::NoTrade.to_string(), "NO_TRADE");
    }

    #[test]
    fn expected_value_serializes_as_string() {
        let json = serde_json::to_value(sample_recommendation()).unwrap();
        assert_eq!(json["expected_value"], "14.25");
    }

    #[test]
    fn recommendation_error_display() {
        let err = RecommendationError::new(RecommendationErrorKind::NoEdge, "edge 0.01 < 0.05");
        assert_eq!(err.to_string(), "NO_EDGE: edge 0.01 < 0.05");
    }

    #[test]
    fn zone_mid() {
        let zone = PriceZone { low: 0.40, high: 0.50 };
        assert!((zone.mid() - 0.45).abs() < 1e-12);
    }
}
