pub mod audit;
pub mod claude_cli;
pub mod cross_exam;
pub mod dispatcher;
pub mod error;
pub mod examiner;
pub mod orchestrator;
pub mod parser;
pub mod prompts;
pub mod registry;
pub mod specialist;

pub mod test_support;

pub use cross_exam::CrossExaminationEngine;
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::AgentError;
pub use examiner::{ClaudeCrossExaminer, CrossExaminer, RuleBasedExaminer};
pub use orchestrator::Orchestrator;
pub use registry::{SelectedSpecialist, SelectionReason, SpecialistProfile, SpecialistRegistry};
pub use specialist::{ClaudeSpecialist, SpecialistAgent};
