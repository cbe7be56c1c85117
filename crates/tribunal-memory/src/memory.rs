use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tribunal_models::agent_message::SpecialistEstimate;

/// In-memory hot cache of signal histories, backed by moka.
///
/// Keys are `market_id:agent_name`. Entries are evicted after TTL and
/// invalidated whenever new estimates are written for the same key.
pub struct MemoryCache {
    inner: Cache<String, Arc<Vec<SpecialistEstimate>>>,
}

impl MemoryCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub fn key(market_id: &str, agent_name: &str) -> String {
        format!("{market_id}:{agent_name}")
    }

    pub async fn get(&self, key: &str) -> Option<Arc<Vec<SpecialistEstimate>>> {
        self.inner.get(key).await
    }

    pub async fn insert(&self, key: String, history: Vec<SpecialistEstimate>) {
        self.inner.insert(key, Arc::new(history)).await;
    }

    pub async fn invalidate(&self, key: &str) {
        self.inner.invalidate(key).await;
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}
