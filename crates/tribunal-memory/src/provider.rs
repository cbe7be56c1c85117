use async_trait::async_trait;
use tribunal_models::agent_message::SpecialistEstimate;

use crate::error::MemoryError;

/// Signal history consulted before each specialist runs. Mockable for testing.
#[async_trait]
pub trait SignalMemory: Send + Sync {
    /// Up to `limit` prior estimates by `agent_name` for `market_id`, newest first.
    async fn recent_signals(
        &self,
        market_id: &str,
        agent_name: &str,
        limit: usize,
    ) -> Result<Vec<SpecialistEstimate>, MemoryError>;

    async fn record_signals(
        &self,
        market_id: &str,
        estimates: &[SpecialistEstimate],
    ) -> Result<(), MemoryError>;
}

/// Memory that remembers nothing. Every query returns an empty history.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMemory;

#[async_trait]
impl SignalMemory for NoopMemory {
    async fn recent_signals(
        &self,
        _market_id: &str,
        _agent_name: &str,
        _limit: usize,
    ) -> Result<Vec<SpecialistEstimate>, MemoryError> {
        Ok(Vec::new())
    }

    async fn record_signals(
        &self,
        _market_id: &str,
        _estimates: &[SpecialistEstimate],
    ) -> Result<(), MemoryError> {
        Ok(())
    }
}
