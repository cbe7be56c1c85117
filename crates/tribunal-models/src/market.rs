use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const INPUT_SCHEMA_VERSION: u32 = 1;

/// Broad class of real-world event a market resolves on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Election,
    Policy,
    Court,
    Geopolitical,
    Economic,
    Other,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Election => "election",
            EventType::Policy => "policy",
            EventType::Court => "court",
            EventType::Geopolitical => "geopolitical",
            EventType::Economic => "economic",
            EventType::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityRegime {
    Low,
    Medium,
    High,
}

/// Event-level context shared by every market of the same event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventContext {
    pub event_id: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Immutable description of one prediction market, produced by ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketBrief {
    pub market_id: String,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub question: String,
    pub resolution_criteria: String,
    pub event_type: EventType,
    /// Market-implied YES probability, 0.0 to 1.0.
    pub current_probability: f64,
    /// 0.0 (illiquid) to 10.0 (deep book).
    pub liquidity_score: f64,
    /// 24h traded volume in USD.
    pub volume_24h: f64,
    /// Bid/ask spread in price units (0.02 = two cents per share).
    pub bid_ask_spread: f64,
    pub volatility_regime: VolatilityRegime,
    pub expiry_timestamp: DateTime<Utc>,
    pub event_context: Option<EventContext>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

fn default_schema_version() -> u32 {
    INPUT_SCHEMA_VERSION
}

/// Fatal input errors. These abort a run before any specialist is dispatched.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IngestionError {
    #[error("Market brief is missing")]
    MissingBrief,

    #[error("Market brief could not be parsed: {message}")]
    Malformed { message: String },

    #[error("Invalid field `{field}`: {reason}")]
    InvalidField { field: String, reason: String },
}

impl IngestionError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        IngestionError::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl MarketBrief {
    /// Parse a brief from raw ingestion JSON. Empty input is a missing brief,
    /// not a parse failure.
    pub fn from_json(raw: &str) -> Result<Self, IngestionError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "null" {
            return Err(IngestionError::MissingBrief);
        }
        let brief: MarketBrief =
            serde_json::from_str(trimmed).map_err(|e| IngestionError::Malformed {
                message: e.to_string(),
            })?;
        brief.validate()?;
        Ok(brief)
    }

    /// Range checks for the fields the pipeline consumes.
    pub fn validate(&self) -> Result<(), IngestionError> {
        if self.market_id.trim().is_empty() {
            return Err(IngestionError::invalid("market_id", "must not be empty"));
        }
        if !self.current_probability.is_finite()
            || !(0.0..=1.0).contains(&self.current_probability)
        {
            return Err(IngestionError::invalid(
                "current_probability",
                format!("{} is outside [0, 1]", self.current_probability),
            ));
        }
        if !self.liquidity_score.is_finite() || self.liquidity_score < 0.0 {
            return Err(IngestionError::invalid(
                "liquidity_score",
                format!("{} must be a non-negative number", self.liquidity_score),
            ));
        }
        if !self.volume_24h.is_finite() || self.volume_24h < 0.0 {
            return Err(IngestionError::invalid(
                "volume_24h",
                format!("{} must be a non-negative number", self.volume_24h),
            ));
        }
        if !self.bid_ask_spread.is_finite() || !(0.0..=1.0).contains(&self.bid_ask_spread) {
            return Err(IngestionError::invalid(
                "bid_ask_spread",
                format!("{} is outside [0, 1]", self.bid_ask_spread),
            ));
        }
        Ok(())
    }

    /// Event-level and market-level keywords joined into one lowercase string.
    pub fn keyword_text(&self) -> String {
        let event_keywords = self
            .event_context
            .iter()
            .flat_map(|ctx| ctx.keywords.iter());
        event_keywords
            .chain(self.keywords.iter())
            .map(|k| k.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Days between `now` and expiry. Negative once the market has expired.
    pub fn days_to_expiry(&self, now: DateTime<Utc>) -> f64 {
        (self.expiry_timestamp - now).num_seconds() as f64 / 86_400.0
    }
}
