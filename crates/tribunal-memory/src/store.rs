use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use tribunal_models::agent_message::SpecialistEstimate;
use tribunal_models::config::MemoryConfig;

use crate::error::MemoryError;
use crate::memory::MemoryCache;
use crate::provider::SignalMemory;
use crate::sqlite::SqliteStore;

/// Read-through signal history: checks moka (hot) → SQLite → empty.
///
/// Each cached entry holds up to `history_cap` estimates; smaller limits are
/// served by truncation and larger ones go straight to SQLite.
///
/// SQLite access is synchronized via `Mutex` since `rusqlite::Connection` is not `Sync`,
/// and runs on the blocking pool so callers can time out a stalled query.
pub struct SqliteSignalStore {
    memory: MemoryCache,
    sqlite: Arc<Mutex<SqliteStore>>,
    history_cap: usize,
}

impl SqliteSignalStore {
    pub fn new(sqlite: SqliteStore, max_capacity: u64, memory_ttl: Duration, history_cap: usize) -> Self {
        Self {
            memory: MemoryCache::new(max_capacity, memory_ttl),
            sqlite: Arc::new(Mutex::new(sqlite)),
            history_cap,
        }
    }

    pub fn from_config(config: &MemoryConfig) -> Result<Self, MemoryError> {
        let sqlite = SqliteStore::open(&config.sqlite_path)?;
        Ok(Self::new(
            sqlite,
            config.memory_max_capacity,
            Duration::from_secs(config.memory_ttl_seconds),
            config.history_limit,
        ))
    }

    /// Run `op` against the SQLite store on the blocking pool.
    async fn with_sqlite<T, F>(&self, op: F) -> Result<T, MemoryError>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteStore) -> Result<T, MemoryError> + Send + 'static,
    {
        let sqlite = Arc::clone(&self.sqlite);
        tokio::task::spawn_blocking(move || {
            let mut guard = sqlite
                .lock()
                .map_err(|e| MemoryError::Unavailable(format!("SQLite mutex poisoned: {e}")))?;
            op(&mut *guard)
        })
        .await
        .map_err(|e| MemoryError::Unavailable(format!("SQLite task failed: {e}")))?
    }

    async fn query(&self, market_id: &str, agent_name: &str, limit: usize) -> Result<Vec<SpecialistEstimate>, MemoryError> {
        let market_id = market_id.to_string();
        let agent_name = agent_name.to_string();
        self.with_sqlite(move |sqlite| sqlite.recent(&market_id, &agent_name, limit))
            .await
    }

    /// Get the number of entries in the hot moka cache.
    pub fn hot_cache_size(&self) -> u64 {
        self.memory.entry_count()
    }
}

#[async_trait]
impl SignalMemory for SqliteSignalStore {
    async fn recent_signals(
        &self,
        market_id: &str,
        agent_name: &str,
        limit: usize,
    ) -> Result<Vec<SpecialistEstimate>, MemoryError> {
        if limit > self.history_cap {
            return self.query(market_id, agent_name, limit).await;
        }

        let key = MemoryCache::key(market_id, agent_name);
        if let Some(history) = self.memory.get(&key).await {
            return Ok(history.iter().take(limit).cloned().collect());
        }

        let history = self.query(market_id, agent_name, self.history_cap).await?;
        debug!(market = %market_id, agent = %agent_name, rows = history.len(), "Signal history loaded from SQLite");
        let result = history.iter().take(limit).cloned().collect();
        self.memory.insert(key, history).await;
        Ok(result)
    }

    async fn record_signals(
        &self,
        market_id: &str,
        estimates: &[SpecialistEstimate],
    ) -> Result<(), MemoryError> {
        let market = market_id.to_string();
        let batch = estimates.to_vec();
        self.with_sqlite(move |sqlite| sqlite.insert_batch(&market, &batch))
            .await?;

        for estimate in estimates {
            self.memory
                .invalidate(&MemoryCache::key(market_id, &estimate.agent_name))
                .await;
        }
        Ok(())
    }
}
