use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use tribunal_engine::debate::assemble_record;
use tribunal_models::agent_message::Stance;
use tribunal_models::analysis::{DebateRecord, DebateTest, TestType, ThesisPair};
use tribunal_models::market::MarketBrief;

use crate::error::AgentError;
use crate::examiner::{CrossExaminer, ExaminationRequest};

/// Steps of one examination run:
/// start → evidence → causality → timing → liquidity → tail-risk → score → done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamPhase {
    Start,
    RunTest(TestType),
    Score,
    Done,
}

impl ExamPhase {
    pub fn next(self) -> ExamPhase {
        match self {
            ExamPhase::Start => ExamPhase::RunTest(TestType::SEQUENCE[0]),
            ExamPhase::RunTest(current) => {
                let position = TestType::SEQUENCE.iter().position(|t| *t == current);
                match position.and_then(|i| TestType::SEQUENCE.get(i + 1)) {
                    Some(next) => ExamPhase::RunTest(*next),
                    None => ExamPhase::Score,
                }
            }
            ExamPhase::Score | ExamPhase::Done => ExamPhase::Done,
        }
    }
}

/// Drive the phase machine, evaluating each test against the bull (YES) and
/// then the bear (NO) thesis. Scores are fixed from outcomes in the score phase.
pub fn run_battery<F>(mut evaluate: F) -> Vec<DebateTest>
where
    F: FnMut(TestType, Stance) -> DebateTest,
{
    let mut tests = Vec::with_capacity(TestType::SEQUENCE.len() * 2);
    let mut phase = ExamPhase::Start;
    loop {
        phase = phase.next();
        match phase {
            ExamPhase::RunTest(test_type) => {
                tests.push(evaluate(test_type, Stance::Yes));
                tests.push(evaluate(test_type, Stance::No));
            }
            ExamPhase::Score => {
                for test in &mut tests {
                    test.score = test.outcome.score();
                }
            }
            ExamPhase::Start => {}
            ExamPhase::Done => break,
        }
    }
    tests
}

/// Runs a cross-examiner under a time limit and turns its report into a
/// validated `DebateRecord`.
pub struct CrossExaminationEngine {
    examiner: Arc<dyn CrossExaminer>,
    timeout: Duration,
}

impl CrossExaminationEngine {
    pub fn new(examiner: Arc<dyn CrossExaminer>, timeout: Duration) -> Self {
        Self { examiner, timeout }
    }

    pub fn examiner_name(&self) -> &str {
        self.examiner.name()
    }

    /// Any error here (collaborator failure, timeout, malformed report) is the
    /// total-failure case; the caller substitutes the neutral record.
    pub async fn examine(
        &self,
        brief: &MarketBrief,
        theses: &ThesisPair,
        now: DateTime<Utc>,
    ) -> Result<DebateRecord, AgentError> {
        let request = ExaminationRequest::new(brief, theses, now);
        debug!(examiner = %self.examiner.name(), market = %brief.market_id, "Cross-examining theses");

        let report = tokio::time::timeout(self.timeout, self.examiner.examine(&request))
            .await
            .map_err(|_| AgentError::Timeout(self.timeout.as_millis() as u64))??;

        let record = assemble_record(
            theses,
            &report.tests,
            report.bull_score,
            report.bear_score,
            &report.key_disagreements,
        )
        .map_err(|e| AgentError::Parse(format!("malformed examination report: {e}")))?;

        info!(
            examiner = %self.examiner.name(),
            bull_score = record.bull_score,
            bear_score = record.bear_score,
            disagreements = record.key_disagreements.len(),
            "Cross-examination complete"
        );
        Ok(record)
    }
}
