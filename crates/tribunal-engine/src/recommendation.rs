use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;
use tribunal_models::agent_message::SpecialistEstimate;
use tribunal_models::analysis::{ConsensusResult, Regime, Thesis, ThesisPair};
use tribunal_models::decision::{
    Explanation, LiquidityRisk, PriceZone, Recommendation, RecommendationMetadata, TradeAction,
};
use tribunal_models::market::MarketBrief;

use crate::error::EngineError;
use crate::stats::{clamp01, ensure_probability};
use crate::thesis::{extract_catalysts, extract_failure_conditions};

pub const MIN_PRICE: f64 = 0.01;
pub const MAX_PRICE: f64 = 0.99;
const STAKE: f64 = 100.0;

/// Everything the generator reads. Borrowed from the orchestrator's run state.
pub struct RecommendationInput<'a> {
    pub brief: &'a MarketBrief,
    pub consensus: &'a ConsensusResult,
    pub theses: Option<&'a ThesisPair>,
    pub estimates: &'a [SpecialistEstimate],
    pub min_edge_threshold: f64,
    pub now: DateTime<Utc>,
}

pub fn determine_action(consensus: f64, market: f64, threshold: f64) -> TradeAction {
    let edge = (consensus - market).abs();
    if edge < threshold {
        TradeAction::NoTrade
    } else if consensus > market + threshold {
        TradeAction::LongYes
    } else if consensus < market - threshold {
        TradeAction::LongNo
    } else {
        TradeAction::NoTrade
    }
}

/// Entry half-width by liquidity tier. Thin books get a wider zone.
pub fn entry_spread(liquidity_score: f64) -> f64 {
    if liquidity_score < 4.0 {
        0.03
    } else if liquidity_score < 7.0 {
        0.024
    } else {
        0.02
    }
}

/// Target half-width by disagreement tier.
pub fn target_spread(disagreement_index: f64) -> f64 {
    if disagreement_index < 0.15 {
        0.03
    } else if disagreement_index <= 0.30 {
        0.036
    } else {
        0.045
    }
}

fn zone_around(center: f64, half_width: f64) -> PriceZone {
    PriceZone {
        low: (center - half_width).clamp(MIN_PRICE, MAX_PRICE),
        high: (center + half_width).clamp(MIN_PRICE, MAX_PRICE),
    }
}

/// Prices are quoted for the side being bought: LONG_NO works in NO-share
/// prices, mirrored around `1 - p`.
fn side_price(action: TradeAction, yes_price: f64) -> f64 {
    match action {
        TradeAction::LongNo => 1.0 - yes_price,
        TradeAction::LongYes | TradeAction::NoTrade => yes_price,
    }
}

pub fn entry_zone(action: TradeAction, market_probability: f64, liquidity_score: f64) -> PriceZone {
    zone_around(
        side_price(action, market_probability),
        entry_spread(liquidity_score),
    )
}

pub fn target_zone(action: TradeAction, consensus_probability: f64, disagreement_index: f64) -> PriceZone {
    zone_around(
        side_price(action, consensus_probability),
        target_spread(disagreement_index),
    )
}

fn time_factor(days_to_expiry: f64) -> f64 {
    if days_to_expiry > 30.0 {
        1.10
    } else if days_to_expiry > 7.0 {
        1.05
    } else {
        0.95
    }
}

pub fn win_probability(
    action: TradeAction,
    consensus: f64,
    market: f64,
    disagreement_index: f64,
    days_to_expiry: f64,
) -> f64 {
    let base = match action {
        TradeAction::LongYes => consensus,
        TradeAction::LongNo => 1.0 - consensus,
        // Report the odds of whichever side the consensus leans toward.
        TradeAction::NoTrade if consensus < market => 1.0 - consensus,
        TradeAction::NoTrade => consensus,
    };
    let penalized = base * (1.0 - 0.5 * disagreement_index);
    clamp01(penalized * time_factor(days_to_expiry))
}

/// Dollar profit per $100 staked at the entry mid, net of the bid/ask cost.
pub fn expected_value(
    action: TradeAction,
    entry: &PriceZone,
    target: &PriceZone,
    bid_ask_spread: f64,
    win_probability: f64,
) -> Decimal {
    if action == TradeAction::NoTrade {
        return Decimal::ZERO;
    }
    let entry_price = entry.mid();
    if entry_price <= 0.0 {
        return Decimal::ZERO;
    }
    let shares = STAKE / entry_price;
    let per_share = target.mid() - entry_price - bid_ask_spread;
    let ev = shares * per_share * win_probability;
    Decimal::from_f64_retain(ev)
        .unwrap_or(Decimal::ZERO)
        .round_dp(2)
}

pub fn liquidity_risk(liquidity_score: f64, volume_24h: f64) -> LiquidityRisk {
    if liquidity_score >= 7.0 && volume_24h >= 50_000.0 {
        LiquidityRisk::Low
    } else if liquidity_score < 4.0 || volume_24h < 10_000.0 {
        LiquidityRisk::High
    } else {
        LiquidityRisk::Medium
    }
}

fn regime_label(regime: Regime) -> &'static str {
    match regime {
        Regime::HighConfidence => "high confidence",
        Regime::ModerateConfidence => "moderate confidence",
        Regime::HighUncertainty => "high uncertainty",
    }
}

fn summary(action: TradeAction, consensus: &ConsensusResult, market: f64, threshold: f64, fallback: bool) -> String {
    let c = consensus.consensus_probability;
    let edge_pts = (c - market).abs() * 100.0;
    let regime = regime_label(consensus.regime);
    match action {
        TradeAction::LongYes => format!(
            "Buy YES: consensus {:.0}% vs market {:.0}%, {edge_pts:.1} pt edge ({regime})",
            c * 100.0,
            market * 100.0
        ),
        TradeAction::LongNo => format!(
            "Buy NO: consensus {:.0}% vs market {:.0}%, {edge_pts:.1} pt edge ({regime})",
            c * 100.0,
            market * 100.0
        ),
        TradeAction::NoTrade if fallback => format!(
            "No trade: consensus {:.0}% is a fallback value and does not support a position ({regime})",
            c * 100.0
        ),
        TradeAction::NoTrade => format!(
            "No trade: consensus {:.0}% vs market {:.0}%, {edge_pts:.1} pt edge does not clear the {:.1} pt threshold ({regime})",
            c * 100.0,
            market * 100.0,
            threshold * 100.0
        ),
    }
}

/// The thesis the recommendation speaks for. NO_TRADE speaks for the side
/// with the larger claimed edge.
fn winning_thesis(action: TradeAction, theses: &ThesisPair) -> &Thesis {
    match action {
        TradeAction::LongYes => &theses.bull,
        TradeAction::LongNo => &theses.bear,
        TradeAction::NoTrade if theses.bear.edge > theses.bull.edge => &theses.bear,
        TradeAction::NoTrade => &theses.bull,
    }
}

/// `fallback` marks a consensus that was substituted rather than calculated.
pub fn build_explanation(
    action: TradeAction,
    consensus: &ConsensusResult,
    market: f64,
    threshold: f64,
    fallback: bool,
    theses: Option<&ThesisPair>,
    estimates: &[SpecialistEstimate],
) -> Explanation {
    let summary = summary(action, consensus, market, threshold, fallback);

    match theses {
        Some(pair) => {
            let thesis = winning_thesis(action, pair);
            Explanation {
                summary,
                core_thesis: thesis.core_argument.clone(),
                key_catalysts: thesis.catalysts.clone(),
                failure_scenarios: thesis.failure_conditions.clone(),
            }
        }
        None => {
            let all: Vec<&SpecialistEstimate> = estimates.iter().collect();
            let core_thesis = if all.is_empty() {
                "No specialist estimates were available; the recommendation rests on the fallback consensus.".to_string()
            } else {
                format!(
                    "{} specialist estimate{} pooled into a consensus of {:.0}%.",
                    all.len(),
                    if all.len() == 1 { "" } else { "s" },
                    consensus.consensus_probability * 100.0
                )
            };
            Explanation {
                summary,
                core_thesis,
                key_catalysts: extract_catalysts(&all),
                failure_scenarios: extract_failure_conditions(&all),
            }
        }
    }
}

/// Turn a consensus into trade parameters. Zones are computed for every
/// action; expected value is zero for NO_TRADE.
pub fn generate_recommendation(input: &RecommendationInput<'_>) -> Result<Recommendation, EngineError> {
    validate_input(input)?;
    let action = determine_action(
        input.consensus.consensus_probability,
        input.brief.current_probability,
        input.min_edge_threshold,
    );
    build_recommendation(input, action, false)
}

/// NO_TRADE on whatever consensus is available. Used when the consensus is a
/// fallback and must not drive a position.
pub fn no_trade_recommendation(input: &RecommendationInput<'_>) -> Result<Recommendation, EngineError> {
    validate_input(input)?;
    build_recommendation(input, TradeAction::NoTrade, true)
}

fn validate_input(input: &RecommendationInput<'_>) -> Result<(), EngineError> {
    ensure_probability("consensus_probability", input.consensus.consensus_probability)?;
    ensure_probability("current_probability", input.brief.current_probability)?;
    ensure_probability("disagreement_index", input.consensus.disagreement_index)?;
    if !input.min_edge_threshold.is_finite() || input.min_edge_threshold < 0.0 {
        return Err(EngineError::InvalidInput(format!(
            "min_edge_threshold {} must be a non-negative number",
            input.min_edge_threshold
        )));
    }
    Ok(())
}

fn build_recommendation(
    input: &RecommendationInput<'_>,
    action: TradeAction,
    fallback: bool,
) -> Result<Recommendation, EngineError> {
    let brief = input.brief;
    let consensus = input.consensus;
    let market = brief.current_probability;
    let c = consensus.consensus_probability;

    let entry = entry_zone(action, market, brief.liquidity_score);
    let target = target_zone(action, c, consensus.disagreement_index);
    let days = brief.days_to_expiry(input.now);
    let win = win_probability(action, c, market, consensus.disagreement_index, days);
    let ev = expected_value(action, &entry, &target, brief.bid_ask_spread, win);

    debug!(
        market = %brief.market_id,
        action = %action,
        consensus = c,
        market_probability = market,
        win_probability = win,
        expected_value = %ev,
        "Recommendation computed"
    );

    Ok(Recommendation {
        market_id: brief.market_id.clone(),
        action,
        entry_zone: entry,
        target_zone: target,
        expected_value: ev,
        win_probability: win,
        liquidity_risk: liquidity_risk(brief.liquidity_score, brief.volume_24h),
        explanation: build_explanation(
            action,
            consensus,
            market,
            input.min_edge_threshold,
            fallback,
            input.theses,
            input.estimates,
        ),
        metadata: RecommendationMetadata {
            consensus_probability: c,
            market_probability: market,
            edge: (c - market).abs(),
            confidence_band: consensus.confidence_band,
            disagreement_index: consensus.disagreement_index,
            regime: consensus.regime,
            contributing_signals: consensus.contributing_signals.clone(),
            min_edge_threshold: input.min_edge_threshold,
        },
    })
}
