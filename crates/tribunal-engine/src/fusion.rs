use tribunal_models::agent_message::{SpecialistEstimate, Stance};
use tribunal_models::analysis::FusedSignal;

use crate::error::EngineError;
use crate::stats::{ensure_valid, fair_probabilities, normalize_weights, sample_std_dev};

/// Confidence above which a specialist counts as strongly directional.
const STRONG_CONFIDENCE: f64 = 0.7;
/// Fair probabilities further apart than this are reported as a pairwise conflict.
const PAIRWISE_CONFLICT_GAP: f64 = 0.3;

pub const NO_DATA_CONFLICT: &str = "No specialist estimates available; fused signal defaults to 0.5";

/// Normalized fusion weights: confidence, scaled by `0.5 + 0.5 * historical_accuracy`
/// when the specialist reports one.
pub fn fusion_weights(estimates: &[SpecialistEstimate]) -> Vec<f64> {
    let raw: Vec<f64> = estimates
        .iter()
        .map(|e| match e.historical_accuracy() {
            Some(accuracy) => e.confidence * (0.5 + 0.5 * accuracy),
            None => e.confidence,
        })
        .collect();
    normalize_weights(&raw)
}

/// `0.6 * spread agreement + 0.4 * share of the most common stance`.
pub fn alignment_score(estimates: &[SpecialistEstimate]) -> f64 {
    if estimates.is_empty() {
        return 0.0;
    }
    let spread = sample_std_dev(&fair_probabilities(estimates));
    let spread_agreement = 1.0 - (spread / 0.5).min(1.0);

    let count = |stance: Stance| estimates.iter().filter(|e| e.stance == stance).count();
    let majority = count(Stance::Yes)
        .max(count(Stance::No))
        .max(count(Stance::Neutral));
    let stance_agreement = majority as f64 / estimates.len() as f64;

    0.6 * spread_agreement + 0.4 * stance_agreement
}

pub fn detect_conflicts(estimates: &[SpecialistEstimate]) -> Vec<String> {
    let mut conflicts = Vec::new();

    let strong = |stance: Stance| -> Vec<&str> {
        estimates
            .iter()
            .filter(|e| e.stance == stance && e.confidence > STRONG_CONFIDENCE)
            .map(|e| e.agent_name.as_str())
            .collect()
    };
    let strong_yes = strong(Stance::Yes);
    let strong_no = strong(Stance::No);
    if !strong_yes.is_empty() && !strong_no.is_empty() {
        conflicts.push(format!(
            "Directional conflict: {} confidently favor YES while {} confidently favor NO",
            strong_yes.join(", "),
            strong_no.join(", ")
        ));
    }

    for (i, a) in estimates.iter().enumerate() {
        for b in &estimates[i + 1..] {
            let gap = (a.fair_probability - b.fair_probability).abs();
            if gap > PAIRWISE_CONFLICT_GAP {
                conflicts.push(format!(
                    "Probability conflict: {} ({:.2}) vs {} ({:.2}), gap {:.2}",
                    a.agent_name, a.fair_probability, b.agent_name, b.fair_probability, gap
                ));
            }
        }
    }

    conflicts
}

/// The signal for a run with no usable estimates.
pub fn empty_signal() -> FusedSignal {
    FusedSignal {
        weighted_probability: 0.5,
        alignment: 0.0,
        conflicts: vec![NO_DATA_CONFLICT.to_string()],
        contributors: Vec::new(),
    }
}

/// Aggregate all successful estimates. Empty input is not an error.
pub fn fuse_signals(estimates: &[SpecialistEstimate]) -> Result<FusedSignal, EngineError> {
    if estimates.is_empty() {
        return Ok(empty_signal());
    }
    ensure_valid(estimates)?;

    let weights = fusion_weights(estimates);
    let weighted_probability = estimates
        .iter()
        .zip(&weights)
        .map(|(e, w)| w * e.fair_probability)
        .sum::<f64>()
        .clamp(0.0, 1.0);

    Ok(FusedSignal {
        weighted_probability,
        alignment: alignment_score(estimates),
        conflicts: detect_conflicts(estimates),
        contributors: estimates.iter().map(|e| e.agent_name.clone()).collect(),
    })
}
