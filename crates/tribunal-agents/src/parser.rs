use chrono::Utc;
use serde::Deserialize;
use tribunal_models::agent_message::{SpecialistEstimate, Stance};

use crate::error::AgentError;
use crate::examiner::ExaminationReport;

/// Extract the first JSON object from a string that may contain surrounding text.
///
/// Handles common Claude response formats:
/// - Clean JSON: `{"key": "value"}`
/// - Markdown-wrapped: ```json\n{"key": "value"}\n```
/// - Prefix text: `Here is the estimate:\n{"key": "value"}`
pub fn extract_json(text: &str) -> Result<String, AgentError> {
    let trimmed = text.trim();

    if trimmed.starts_with('{') && serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
        return Ok(trimmed.to_string());
    }

    if let Some(json_str) = extract_from_markdown_block(trimmed) {
        if serde_json::from_str::<serde_json::Value>(&json_str).is_ok() {
            return Ok(json_str);
        }
    }

    if let Some(json_str) = extract_first_object(trimmed) {
        if serde_json::from_str::<serde_json::Value>(&json_str).is_ok() {
            return Ok(json_str);
        }
    }

    Err(AgentError::Parse(format!(
        "No valid JSON object found in response (length={})",
        text.len()
    )))
}

fn extract_from_markdown_block(text: &str) -> Option<String> {
    let start_markers = ["```json\n", "```json\r\n", "```\n", "```\r\n"];

    for marker in &start_markers {
        if let Some(start) = text.find(marker) {
            let json_start = start + marker.len();
            if let Some(end) = text[json_start..].find("```") {
                return Some(text[json_start..json_start + end].trim().to_string());
            }
        }
    }

    None
}

/// First balanced `{ ... }`, ignoring braces inside string literals.
fn extract_first_object(text: &str) -> Option<String> {
    let mut depth = 0;
    let mut start = None;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if !in_string && depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start {
                        return Some(text[s..=i].to_string());
                    }
                }
            }
            _ => {}
        }
    }

    None
}

/// What a CLI specialist is asked to emit. Identity and timestamp are
/// assigned by the caller, not trusted from the model.
#[derive(Debug, Deserialize)]
struct EstimatePayload {
    stance: Stance,
    fair_probability: f64,
    confidence: f64,
    #[serde(default)]
    key_drivers: Vec<String>,
    #[serde(default)]
    risk_factors: Vec<String>,
    #[serde(default)]
    metadata: serde_json::Map<String, serde_json::Value>,
}

/// Parse a specialist's raw CLI output into a validated estimate.
pub fn parse_estimate(raw: &str, agent_name: &str) -> Result<SpecialistEstimate, AgentError> {
    let json_str = extract_json(raw)?;
    let payload: EstimatePayload = serde_json::from_str(&json_str).map_err(|e| {
        AgentError::Parse(format!("Failed to parse estimate: {e}\nJSON: {json_str}"))
    })?;

    let estimate = SpecialistEstimate {
        agent_name: agent_name.to_string(),
        timestamp: Utc::now(),
        stance: payload.stance,
        fair_probability: payload.fair_probability,
        confidence: payload.confidence,
        key_drivers: payload.key_drivers,
        risk_factors: payload.risk_factors,
        metadata: payload.metadata,
    };
    estimate.validate().map_err(AgentError::InvalidEstimate)?;
    Ok(estimate)
}

/// Parse the cross-examiner's raw CLI output. Structural checks (ten tests,
/// one per type and side) happen later in the engine.
pub fn parse_examination_report(raw: &str) -> Result<ExaminationReport, AgentError> {
    let json_str = extract_json(raw)?;
    serde_json::from_str(&json_str).map_err(|e| {
        AgentError::Parse(format!("Failed to parse examination report: {e}\nJSON: {json_str}"))
    })
}
