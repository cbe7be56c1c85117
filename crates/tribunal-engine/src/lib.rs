//! Deterministic decision stages: fusion, thesis construction, debate
//! scoring, consensus, and recommendation. No I/O and no async.

pub mod consensus;
pub mod debate;
pub mod error;
pub mod fusion;
pub mod recommendation;
pub mod stats;
pub mod thesis;

pub use consensus::{calculate_consensus, fallback_consensus};
pub use error::EngineError;
pub use fusion::{empty_signal, fuse_signals};
pub use recommendation::{generate_recommendation, no_trade_recommendation, RecommendationInput};
pub use thesis::build_theses;
