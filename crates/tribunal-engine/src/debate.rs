use tribunal_models::agent_message::Stance;
use tribunal_models::analysis::{DebateRecord, DebateTest, TestType, ThesisPair};

use crate::error::EngineError;
use crate::thesis::NO_CATALYSTS;

pub const MAX_DISAGREEMENTS: usize = 5;
const PROBABILITY_GAP: f64 = 0.2;
const SCORE_DIFFERENTIAL: f64 = 1.5;
const HIGH_EDGE: f64 = 0.10;
const CATALYST_DIVERGENCE_WEIGHT: f64 = 0.3;

/// Ten neutral tests with zero aggregate scores and one disagreement naming the failure.
pub fn neutral_record(reason: &str) -> DebateRecord {
    let tests = TestType::SEQUENCE
        .iter()
        .flat_map(|t| {
            [
                DebateTest::neutral(*t, Stance::Yes, reason),
                DebateTest::neutral(*t, Stance::No, reason),
            ]
        })
        .collect();
    DebateRecord {
        tests,
        bull_score: 0.0,
        bear_score: 0.0,
        key_disagreements: vec![format!("Cross-examination unavailable: {reason}")],
    }
}

/// Mean test score for one side. Zero when the side has no tests.
pub fn side_score(tests: &[DebateTest], target: Stance) -> f64 {
    let scores: Vec<f64> = tests
        .iter()
        .filter(|t| t.target == target)
        .map(|t| t.score as f64)
        .collect();
    if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

fn find(tests: &[DebateTest], test_type: TestType, target: Stance) -> Option<&DebateTest> {
    tests
        .iter()
        .find(|t| t.test_type == test_type && t.target == target)
}

/// Check that a battery holds exactly one test per (type, side), re-derive
/// every score from its outcome, and return the tests in run order.
pub fn normalize_tests(tests: &[DebateTest]) -> Result<Vec<DebateTest>, EngineError> {
    if tests.len() != TestType::SEQUENCE.len() * 2 {
        return Err(EngineError::InvalidInput(format!(
            "expected 10 debate tests, got {}",
            tests.len()
        )));
    }

    let mut ordered = Vec::with_capacity(tests.len());
    for test_type in TestType::SEQUENCE {
        for target in [Stance::Yes, Stance::No] {
            let count = tests
                .iter()
                .filter(|t| t.test_type == test_type && t.target == target)
                .count();
            if count != 1 {
                return Err(EngineError::InvalidInput(format!(
                    "expected one {test_type} test for {target:?}, got {count}"
                )));
            }
            if let Some(test) = find(tests, test_type, target) {
                let mut test = test.clone();
                test.score = test.outcome.score();
                ordered.push(test);
            }
        }
    }
    Ok(ordered)
}

/// A supplied aggregate wins when it is a finite value in [-1, 1].
pub fn resolve_aggregate(supplied: Option<f64>, local: f64) -> f64 {
    match supplied {
        Some(value) if value.is_finite() && (-1.0..=1.0).contains(&value) => value,
        _ => local,
    }
}

fn real_catalysts(catalysts: &[String]) -> Vec<String> {
    catalysts
        .iter()
        .filter(|c| c.as_str() != NO_CATALYSTS)
        .map(|c| c.to_lowercase())
        .collect()
}

/// Ranked points of contention between the two theses, most significant first.
///
/// `extra` entries (e.g. from an external examiner) rank after every derived
/// entry and are skipped when they repeat one.
pub fn key_disagreements(theses: &ThesisPair, tests: &[DebateTest], extra: &[String]) -> Vec<String> {
    let (bull, bear) = (&theses.bull, &theses.bear);
    let mut ranked: Vec<(f64, String)> = Vec::new();

    let gap = (bull.fair_probability - bear.fair_probability).abs();
    if gap > PROBABILITY_GAP {
        ranked.push((
            gap,
            format!(
                "Probability gap of {:.0} pts between bull ({:.0}%) and bear ({:.0}%) theses",
                gap * 100.0,
                bull.fair_probability * 100.0,
                bear.fair_probability * 100.0
            ),
        ));
    }

    for test_type in TestType::SEQUENCE {
        if let (Some(b), Some(r)) = (
            find(tests, test_type, Stance::Yes),
            find(tests, test_type, Stance::No),
        ) {
            let differential = (b.score as f64 - r.score as f64).abs();
            if differential >= SCORE_DIFFERENTIAL {
                ranked.push((
                    differential / 2.0,
                    format!(
                        "{test_type} test splits the sides: bull {:?}, bear {:?}",
                        b.outcome, r.outcome
                    )
                    .to_lowercase(),
                ));
            }
        }
    }

    let bull_catalysts = real_catalysts(&bull.catalysts);
    let bear_catalysts = real_catalysts(&bear.catalysts);
    let overlap = bull_catalysts.iter().any(|c| bear_catalysts.contains(c));
    if !overlap && (!bull_catalysts.is_empty() || !bear_catalysts.is_empty()) {
        let first = |list: &[String]| list.first().cloned().unwrap_or_else(|| "nothing".to_string());
        ranked.push((
            CATALYST_DIVERGENCE_WEIGHT,
            format!(
                "Divergent catalyst emphasis: bull watches '{}', bear watches '{}'",
                first(&bull.catalysts).replace(NO_CATALYSTS, "nothing"),
                first(&bear.catalysts).replace(NO_CATALYSTS, "nothing")
            ),
        ));
    }

    if bull.edge > HIGH_EDGE && bear.edge > HIGH_EDGE {
        ranked.push((
            bull.edge.min(bear.edge),
            format!(
                "Both theses claim material edge: bull {:.0} pts, bear {:.0} pts",
                bull.edge * 100.0,
                bear.edge * 100.0
            ),
        ));
    }

    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut out: Vec<String> = ranked.into_iter().map(|(_, text)| text).collect();
    for entry in extra {
        if !out.iter().any(|existing| existing.eq_ignore_ascii_case(entry)) {
            out.push(entry.clone());
        }
    }
    out.truncate(MAX_DISAGREEMENTS);
    out
}

/// Build the final record from a (possibly external) battery. Fails when the
/// battery is malformed; callers substitute `neutral_record`.
pub fn assemble_record(
    theses: &ThesisPair,
    tests: &[DebateTest],
    supplied_bull: Option<f64>,
    supplied_bear: Option<f64>,
    supplied_disagreements: &[String],
) -> Result<DebateRecord, EngineError> {
    let tests = normalize_tests(tests)?;
    let bull_score = resolve_aggregate(supplied_bull, side_score(&tests, Stance::Yes));
    let bear_score = resolve_aggregate(supplied_bear, side_score(&tests, Stance::No));
    let key_disagreements = key_disagreements(theses, &tests, supplied_disagreements);

    Ok(DebateRecord {
        tests,
        bull_score,
        bear_score,
        key_disagreements,
    })
}
