use tribunal_models::agent_message::SpecialistEstimate;
use tribunal_models::analysis::{ConfidenceBand, ConsensusResult, DebateRecord, Regime};

use crate::error::EngineError;
use crate::stats::{clamp01, ensure_valid, fair_probabilities, normalize_weights, sample_std_dev};

const MAX_DEBATE_SHIFT: f64 = 0.10;
const DEBATE_SHIFT_PER_POINT: f64 = 0.05;
/// Standard deviation at which the disagreement index saturates.
const DISAGREEMENT_SCALE: f64 = 0.25;
const BAND_PER_DISAGREEMENT: f64 = 0.20;

pub fn accuracy_multiplier(historical_accuracy: Option<f64>) -> f64 {
    match historical_accuracy {
        Some(a) if a > 0.70 => 1.2,
        Some(a) if a < 0.50 => 0.8,
        _ => 1.0,
    }
}

pub fn consensus_weights(estimates: &[SpecialistEstimate]) -> Vec<f64> {
    let raw: Vec<f64> = estimates
        .iter()
        .map(|e| e.confidence * accuracy_multiplier(e.historical_accuracy()))
        .collect();
    normalize_weights(&raw)
}

/// `(bull - bear) * 0.05`, limited to +/-0.10.
pub fn debate_shift(debate: &DebateRecord) -> f64 {
    ((debate.bull_score - debate.bear_score) * DEBATE_SHIFT_PER_POINT)
        .clamp(-MAX_DEBATE_SHIFT, MAX_DEBATE_SHIFT)
}

pub fn disagreement_index(estimates: &[SpecialistEstimate]) -> f64 {
    if estimates.len() <= 1 {
        return 0.0;
    }
    (sample_std_dev(&fair_probabilities(estimates)) / DISAGREEMENT_SCALE).min(1.0)
}

pub fn confidence_band(probability: f64, disagreement: f64) -> ConfidenceBand {
    let half_width = disagreement * BAND_PER_DISAGREEMENT;
    ConfidenceBand {
        lower: clamp01(probability - half_width),
        upper: clamp01(probability + half_width),
    }
}

pub fn classify_regime(disagreement: f64, band: &ConfidenceBand) -> Regime {
    let width = band.width();
    if disagreement < 0.15 && width < 0.10 {
        Regime::HighConfidence
    } else if disagreement > 0.30 || width > 0.15 {
        Regime::HighUncertainty
    } else {
        Regime::ModerateConfidence
    }
}

/// Result used when there is nothing to aggregate.
pub fn fallback_consensus() -> ConsensusResult {
    ConsensusResult {
        consensus_probability: 0.5,
        confidence_band: ConfidenceBand {
            lower: 0.3,
            upper: 0.7,
        },
        disagreement_index: 1.0,
        regime: Regime::HighUncertainty,
        contributing_signals: Vec::new(),
    }
}

/// Combine estimates and the optional debate outcome into one calibrated
/// probability. Empty input is `EmptyInput`; callers use `fallback_consensus`.
pub fn calculate_consensus(
    estimates: &[SpecialistEstimate],
    debate: Option<&DebateRecord>,
) -> Result<ConsensusResult, EngineError> {
    if estimates.is_empty() {
        return Err(EngineError::EmptyInput("estimates"));
    }
    ensure_valid(estimates)?;

    let weights = consensus_weights(estimates);
    let base: f64 = estimates
        .iter()
        .zip(&weights)
        .map(|(e, w)| w * e.fair_probability)
        .sum();

    let consensus_probability = match debate {
        Some(record) => clamp01(base + debate_shift(record)),
        None => clamp01(base),
    };

    let disagreement = disagreement_index(estimates);
    let band = confidence_band(consensus_probability, disagreement);

    let mut ranked: Vec<(&str, f64)> = estimates
        .iter()
        .map(|e| e.agent_name.as_str())
        .zip(weights.iter().copied())
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    Ok(ConsensusResult {
        consensus_probability,
        confidence_band: band,
        disagreement_index: disagreement,
        regime: classify_regime(disagreement, &band),
        contributing_signals: ranked.into_iter().map(|(name, _)| name.to_string()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debate::neutral_record;
    use crate::stats::tests::estimate;
    use tribunal_models::agent_message::{Stance, HISTORICAL_ACCURACY_KEY};

    fn record(bull: f64, bear: f64) -> DebateRecord {
        DebateRecord {
            bull_score: bull,
            bear_score: bear,
            ..neutral_record("test")
        }
    }

    #[test]
    fn debate_shift_example() {
        assert!((debate_shift(&record(0.8, -0.2)) - 0.05).abs() < 1e-12);
    }

    #[test]
    fn debate_shift_is_bounded() {
        assert_eq!(debate_shift(&record(1.0, -1.0)), 0.10);
        assert_eq!(debate_shift(&record(-1.0, 1.0)), -0.10);
    }

    #[test]
    fn accuracy_multiplier_tiers() {
        assert_eq!(accuracy_multiplier(Some(0.71)), 1.2);
        assert_eq!(accuracy_multiplier(Some(0.70)), 1.0);
        assert_eq!(accuracy_multiplier(Some(0.50)), 1.0);
        assert_eq!(accuracy_multiplier(Some(0.49)), 0.8);
        assert_eq!(accuracy_multiplier(None), 1.0);
    }

    #[test]
    fn accuracy_shifts_weight_toward_reliable_specialists() {
        let mut estimates = vec![
            estimate("reliable", Stance::Yes, 0.8, 0.5),
            estimate("shaky", Stance::No, 0.2, 0.5),
        ];
        estimates[0]
            .metadata
            .insert(HISTORICAL_ACCURACY_KEY.to_string(), serde_json::json!(0.9));
        estimates[1]
            .metadata
            .insert(HISTORICAL_ACCURACY_KEY.to_string(), serde_json::json!(0.3));
        let weights = consensus_weights(&estimates);
        assert!((weights[0] - 0.6).abs() < 1e-9);
        assert!((weights[1] - 0.4).abs() < 1e-9);

        let result = calculate_consensus(&estimates, None).unwrap();
        assert_eq!(result.contributing_signals, vec!["reliable", "shaky"]);
    }

    #[test]
    fn three_specialist_scenario() {
        let estimates = vec![
            estimate("a", Stance::Yes, 0.9, 0.8),
            estimate("b", Stance::No, 0.3, 0.5),
            estimate("c", Stance::Yes, 0.6, 0.6),
        ];
        let result = calculate_consensus(&estimates, None).unwrap();
        assert!((result.consensus_probability - 1.23 / 1.9).abs() < 1e-9);
        assert_eq!(result.contributing_signals, vec!["a", "c", "b"]);
        // sd 0.3 saturates the index
        assert_eq!(result.disagreement_index, 1.0);
        assert_eq!(result.regime, Regime::HighUncertainty);
    }

    #[test]
    fn debate_record_moves_consensus() {
        let estimates = vec![
            estimate("a", Stance::Yes, 0.6, 0.5),
            estimate("b", Stance::Yes, 0.6, 0.5),
        ];
        let without = calculate_consensus(&estimates, None).unwrap();
        let with = calculate_consensus(&estimates, Some(&record(0.8, -0.2))).unwrap();
        assert!((with.consensus_probability - without.consensus_probability - 0.05).abs() < 1e-12);
    }

    #[test]
    fn band_half_width_tracks_disagreement() {
        let band = confidence_band(0.5, 0.4);
        assert!((band.lower - 0.42).abs() < 1e-12);
        assert!((band.upper - 0.58).abs() < 1e-12);
        assert!((band.width() - 2.0 * 0.4 * 0.20).abs() < 1e-12);
    }

    #[test]
    fn band_is_clamped_at_edges() {
        let band = confidence_band(0.95, 1.0);
        assert!((band.lower - 0.75).abs() < 1e-12);
        assert_eq!(band.upper, 1.0);
    }

    #[test]
    fn disagreement_is_monotonic_in_spread() {
        let narrow = vec![
            estimate("a", Stance::Yes, 0.50, 0.5),
            estimate("b", Stance::Yes, 0.55, 0.5),
        ];
        let wide = vec![
            estimate("a", Stance::Yes, 0.40, 0.5),
            estimate("b", Stance::Yes, 0.65, 0.5),
        ];
        assert!(disagreement_index(&narrow) <= disagreement_index(&wide));
        assert_eq!(disagreement_index(&narrow[..1]), 0.0);
        assert_eq!(disagreement_index(&[]), 0.0);
    }

    #[test]
    fn unanimous_panel_is_high_confidence() {
        let estimates = vec![
            estimate("a", Stance::Yes, 0.62, 0.7),
            estimate("b", Stance::Yes, 0.62, 0.6),
        ];
        let result = calculate_consensus(&estimates, None).unwrap();
        assert_eq!(result.disagreement_index, 0.0);
        assert_eq!(result.regime, Regime::HighConfidence);
    }

    #[test]
    fn regime_thresholds() {
        let tight = ConfidenceBand { lower: 0.5, upper: 0.55 };
        let mid = ConfidenceBand { lower: 0.5, upper: 0.62 };
        let wide = ConfidenceBand { lower: 0.4, upper: 0.6 };
        assert_eq!(classify_regime(0.10, &tight), Regime::HighConfidence);
        assert_eq!(classify_regime(0.20, &tight), Regime::ModerateConfidence);
        assert_eq!(classify_regime(0.10, &mid), Regime::ModerateConfidence);
        assert_eq!(classify_regime(0.10, &wide), Regime::HighUncertainty);
        assert_eq!(classify_regime(0.35, &tight), Regime::HighUncertainty);
    }

    #[test]
    fn empty_input_is_an_error_with_documented_fallback() {
        assert!(matches!(
            calculate_consensus(&[], None),
            Err(EngineError::EmptyInput(_))
        ));
        let fallback = fallback_consensus();
        assert_eq!(fallback.consensus_probability, 0.5);
        assert_eq!(fallback.confidence_band, ConfidenceBand { lower: 0.3, upper: 0.7 });
        assert_eq!(fallback.disagreement_index, 1.0);
        assert_eq!(fallback.regime, Regime::HighUncertainty);
    }
}
