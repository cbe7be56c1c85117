pub mod agent_message;
pub mod analysis;
pub mod audit;
pub mod config;
pub mod decision;
pub mod market;

pub use agent_message::{
    FailureKind, SpecialistCategory, SpecialistEstimate, SpecialistFailure, SpecialistRequest,
    Stance,
};
pub use analysis::{
    ConfidenceBand, ConsensusResult, DebateOutcome, DebateRecord, DebateTest, FusedSignal,
    Regime, TestType, Thesis, ThesisPair,
};
pub use audit::{AuditEntry, AuditLog, AuditStatus};
pub use config::{
    AgentsConfig, EngineConfig, InvocationSettings, MemoryConfig, SpecialistConfig,
    TribunalConfig,
};
pub use decision::{
    AnalysisReport, Explanation, LiquidityRisk, PriceZone, Recommendation,
    RecommendationError, RecommendationErrorKind, RecommendationMetadata, TradeAction,
};
pub use market::{EventContext, EventType, IngestionError, MarketBrief, VolatilityRegime};
