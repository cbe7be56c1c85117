use tribunal_models::agent_message::SpecialistEstimate;

use crate::error::EngineError;

pub fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator). Zero for fewer than two values.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Scale raw weights to sum to 1.0. Uniform when the raw weights sum to zero.
pub fn normalize_weights(raw: &[f64]) -> Vec<f64> {
    if raw.is_empty() {
        return Vec::new();
    }
    let total: f64 = raw.iter().sum();
    if total > 0.0 && total.is_finite() {
        raw.iter().map(|w| w / total).collect()
    } else {
        vec![1.0 / raw.len() as f64; raw.len()]
    }
}

pub fn fair_probabilities(estimates: &[SpecialistEstimate]) -> Vec<f64> {
    estimates.iter().map(|e| e.fair_probability).collect()
}

/// Every stage re-checks its inputs; a bad estimate is a stage failure, not a panic.
pub fn ensure_valid(estimates: &[SpecialistEstimate]) -> Result<(), EngineError> {
    for estimate in estimates {
        estimate
            .validate()
            .map_err(|e| EngineError::InvalidInput(format!("{}: {e}", estimate.agent_name)))?;
    }
    Ok(())
}

pub fn ensure_probability(field: &str, value: f64) -> Result<(), EngineError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(EngineError::InvalidInput(format!(
            "{field} {value} is outside [0, 1]"
        )))
    }
}
