use tribunal_models::agent_message::{SpecialistEstimate, Stance};
use tribunal_models::analysis::{Thesis, ThesisPair};

use crate::error::EngineError;
use crate::stats::{ensure_probability, ensure_valid, mean};

/// Driver text containing any of these is treated as a catalyst.
pub const CATALYST_KEYWORDS: &[&str] = &[
    "announce",
    "approval",
    "catalyst",
    "decision",
    "deadline",
    "debate",
    "earnings",
    "election",
    "hearing",
    "launch",
    "meeting",
    "poll",
    "release",
    "report",
    "ruling",
    "scheduled",
    "speech",
    "verdict",
    "vote",
];

pub const MAX_LIST_ENTRIES: usize = 5;
pub const NO_CATALYSTS: &str = "No specific catalysts identified";
pub const NO_FAILURE_CONDITIONS: &str = "No specific failure conditions identified";

fn stance_label(stance: Stance) -> &'static str {
    match stance {
        Stance::Yes => "YES",
        Stance::No => "NO",
        Stance::Neutral => "NEUTRAL",
    }
}

/// Deduplicated, order-preserving, capped. Comparison ignores case and
/// surrounding whitespace.
fn collect_unique<'a>(items: impl Iterator<Item = &'a String>, cap: usize) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::new();
    for item in items {
        let trimmed = item.trim();
        if trimmed.is_empty() {
            continue;
        }
        let key = trimmed.to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push(trimmed.to_string());
        if out.len() == cap {
            break;
        }
    }
    out
}

pub fn is_catalyst(text: &str) -> bool {
    let lower = text.to_lowercase();
    CATALYST_KEYWORDS.iter().any(|k| lower.contains(k))
}

pub fn extract_catalysts(supporters: &[&SpecialistEstimate]) -> Vec<String> {
    let matching = supporters
        .iter()
        .flat_map(|e| e.key_drivers.iter())
        .filter(|d| is_catalyst(d));
    let catalysts = collect_unique(matching, MAX_LIST_ENTRIES);
    if catalysts.is_empty() {
        vec![NO_CATALYSTS.to_string()]
    } else {
        catalysts
    }
}

pub fn extract_failure_conditions(supporters: &[&SpecialistEstimate]) -> Vec<String> {
    let risks = supporters.iter().flat_map(|e| e.risk_factors.iter());
    let conditions = collect_unique(risks, MAX_LIST_ENTRIES);
    if conditions.is_empty() {
        vec![NO_FAILURE_CONDITIONS.to_string()]
    } else {
        conditions
    }
}

/// Confidence-weighted mean fair probability; plain mean when every confidence is zero.
fn pooled_probability(supporters: &[&SpecialistEstimate]) -> f64 {
    let total_confidence: f64 = supporters.iter().map(|e| e.confidence).sum();
    if total_confidence > 0.0 {
        supporters
            .iter()
            .map(|e| e.confidence * e.fair_probability)
            .sum::<f64>()
            / total_confidence
    } else {
        let fairs: Vec<f64> = supporters.iter().map(|e| e.fair_probability).collect();
        mean(&fairs)
    }
}

fn core_argument(stance: Stance, supporters: &[&SpecialistEstimate], fair: f64, market: f64) -> String {
    let side = stance_label(stance);
    if supporters.is_empty() {
        return format!(
            "No specialists support the {side} outcome; the market price of {:.0}% stands unchallenged.",
            market * 100.0
        );
    }

    let confidences: Vec<f64> = supporters.iter().map(|e| e.confidence).collect();
    let plural = if supporters.len() == 1 { "" } else { "s" };
    let mut argument = format!(
        "{} specialist{plural} support {side} with average confidence {:.0}%, implying a fair probability of {:.0}% against a market price of {:.0}%.",
        supporters.len(),
        mean(&confidences) * 100.0,
        fair * 100.0,
        market * 100.0,
    );

    let drivers = collect_unique(supporters.iter().flat_map(|e| e.key_drivers.iter()), 3);
    if !drivers.is_empty() {
        argument.push_str(" Key drivers: ");
        argument.push_str(&drivers.join("; "));
        argument.push('.');
    }
    argument
}

/// Build one side's thesis. With no supporters the thesis is neutral: fair
/// probability equals the market price and edge is zero.
pub fn build_thesis(stance: Stance, supporters: &[&SpecialistEstimate], market_probability: f64) -> Thesis {
    let fair_probability = if supporters.is_empty() {
        market_probability
    } else {
        pooled_probability(supporters).clamp(0.0, 1.0)
    };

    Thesis {
        stance,
        fair_probability,
        market_probability,
        edge: (fair_probability - market_probability).abs(),
        core_argument: core_argument(stance, supporters, fair_probability, market_probability),
        catalysts: extract_catalysts(supporters),
        failure_conditions: extract_failure_conditions(supporters),
        supporting_agents: supporters.iter().map(|e| e.agent_name.clone()).collect(),
    }
}

/// Partition estimates by stance and build the bull (YES) and bear (NO) theses.
///
/// NEUTRAL estimates join the side their fair probability leans toward
/// relative to the market price; one priced exactly at market joins neither.
pub fn build_theses(
    estimates: &[SpecialistEstimate],
    market_probability: f64,
) -> Result<ThesisPair, EngineError> {
    ensure_probability("market_probability", market_probability)?;
    ensure_valid(estimates)?;

    let mut bulls = Vec::new();
    let mut bears = Vec::new();
    for estimate in estimates {
        match estimate.stance {
            Stance::Yes => bulls.push(estimate),
            Stance::No => bears.push(estimate),
            Stance::Neutral if estimate.fair_probability > market_probability => {
                bulls.push(estimate)
            }
            Stance::Neutral if estimate.fair_probability < market_probability => {
                bears.push(estimate)
            }
            Stance::Neutral => {}
        }
    }

    Ok(ThesisPair {
        bull: build_thesis(Stance::Yes, &bulls, market_probability),
        bear: build_thesis(Stance::No, &bears, market_probability),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::tests::estimate;

    fn with_text(mut e: SpecialistEstimate, drivers: &[&str], risks: &[&str]) -> SpecialistEstimate {
        e.key_drivers = drivers.iter().map(|s| s.to_string()).collect();
        e.risk_factors = risks.iter().map(|s| s.to_string()).collect();
        e
    }

    #[test]
    fn bull_probability_is_confidence_weighted() {
        let estimates = vec![
            estimate("a", Stance::Yes, 0.9, 0.8),
            estimate("b", Stance::No, 0.3, 0.5),
            estimate("c", Stance::Yes, 0.6, 0.6),
        ];
        let pair = build_theses(&estimates, 0.5).unwrap();
        // (0.9*0.8 + 0.6*0.6) / 1.4
        assert!((pair.bull.fair_probability - 1.08 / 1.4).abs() < 1e-9);
        assert!((pair.bull.edge - (1.08 / 1.4 - 0.5)).abs() < 1e-9);
        assert_eq!(pair.bull.supporting_agents, vec!["a", "c"]);
        assert!((pair.bear.fair_probability - 0.3).abs() < 1e-12);
        assert!((pair.bear.edge - 0.2).abs() < 1e-12);
    }

    #[test]
    fn zero_confidence_uses_plain_mean() {
        let estimates = vec![
            estimate("a", Stance::No, 0.2, 0.0),
            estimate("b", Stance::No, 0.4, 0.0),
        ];
        let pair = build_theses(&estimates, 0.5).unwrap();
        assert!((pair.bear.fair_probability - 0.3).abs() < 1e-12);
    }

    #[test]
    fn empty_side_is_neutral_not_missing() {
        let estimates = vec![estimate("a", Stance::Yes, 0.7, 0.6)];
        let pair = build_theses(&estimates, 0.45).unwrap();
        assert!(!pair.bear.has_support());
        assert_eq!(pair.bear.fair_probability, 0.45);
        assert_eq!(pair.bear.edge, 0.0);
        assert_eq!(pair.bear.catalysts, vec![NO_CATALYSTS]);
        assert_eq!(pair.bear.failure_conditions, vec![NO_FAILURE_CONDITIONS]);
        assert!(pair.bear.core_argument.contains("No specialists support the NO outcome"));
    }

    #[test]
    fn no_estimates_builds_two_neutral_theses() {
        let pair = build_theses(&[], 0.5).unwrap();
        assert!(!pair.bull.has_support());
        assert!(!pair.bear.has_support());
    }

    #[test]
    fn neutral_estimates_follow_their_lean() {
        let estimates = vec![
            estimate("up", Stance::Neutral, 0.55, 0.5),
            estimate("down", Stance::Neutral, 0.35, 0.5),
            estimate("flat", Stance::Neutral, 0.40, 0.5),
        ];
        let pair = build_theses(&estimates, 0.40).unwrap();
        assert_eq!(pair.bull.supporting_agents, vec!["up"]);
        assert_eq!(pair.bear.supporting_agents, vec!["down"]);
    }

    #[test]
    fn catalysts_filter_dedupe_and_cap() {
        let a = with_text(
            estimate("a", Stance::Yes, 0.7, 0.6),
            &[
                "FOMC meeting on March 19",
                "Strong jobs data",
                "CPI release next week",
                "fomc meeting on march 19",
            ],
            &["Sticky inflation", "Hawkish dissent"],
        );
        let b = with_text(
            estimate("b", Stance::Yes, 0.65, 0.6),
            &[
                "Powell speech",
                "Treasury report",
                "Vote count",
                "Court ruling",
            ],
            &["Sticky inflation"],
        );
        let pair = build_theses(&[a, b], 0.5).unwrap();

        assert_eq!(
            pair.bull.catalysts,
            vec![
                "FOMC meeting on March 19",
                "CPI release next week",
                "Powell speech",
                "Treasury report",
                "Vote count",
            ]
        );
        assert_eq!(
            pair.bull.failure_conditions,
            vec!["Sticky inflation", "Hawkish dissent"]
        );
    }

    #[test]
    fn core_argument_names_count_confidence_and_three_drivers() {
        let a = with_text(
            estimate("a", Stance::No, 0.2, 0.8),
            &["One", "Two", "Three", "Four"],
            &[],
        );
        let b = estimate("b", Stance::No, 0.3, 0.6);
        let pair = build_theses(&[a, b], 0.5).unwrap();
        let argument = &pair.bear.core_argument;
        assert!(argument.starts_with("2 specialists support NO with average confidence 70%"));
        assert!(argument.contains("Key drivers: One; Two; Three."));
        assert!(!argument.contains("Four"));
    }

    #[test]
    fn invalid_market_probability_is_an_error() {
        assert!(build_theses(&[], 1.5).is_err());
    }
}
