//! `SessionBackend`: the storage seam `SessionCore`
//! swaps between on health-check transition. `RedisSessionBackend` wraps
//! an `archivist-cache::CacheBroker`; `InMemorySessionBackend` is the
//! per-process fallback used while the Cache/Broker is unreachable.

use crate::error::Result;
use archivist_cache::{keys, CacheBroker};
use archivist_core::model::SessionRecord;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn get(&self, session_id: &str) -> Result<Option<SessionRecord>>;
    async fn set(&self, record: &SessionRecord, ttl: Duration) -> Result<()>;
    async fn delete(&self, session_id: &str) -> Result<()>;
    async fn is_healthy(&self) -> bool;
}

pub struct RedisSessionBackend {
    cache: Arc<dyn CacheBroker>,
}

impl RedisSessionBackend {
    pub fn new(cache: Arc<dyn CacheBroker>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl SessionBackend for RedisSessionBackend {
    async fn get(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let bytes = self.cache.get(&keys::session(session_id)).await?;
        Ok(bytes.and_then(|b| serde_json::from_slice(&b).ok()))
    }

    async fn set(&self, record: &SessionRecord, ttl: Duration) -> Result<()> {
        let bytes = serde_json::to_vec(record)?;
        self.cache.set(&keys::session(&record.session_id), &bytes, ttl).await?;
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        self.cache.delete(&keys::session(session_id)).await?;
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        self.cache.health().await.ok
    }
}

/// Per-process fallback: sessions created
/// here never survive a process restart, unlike `RedisSessionBackend`'s
/// durable store.
#[derive(Default)]
pub struct InMemorySessionBackend {
    records: DashMap<String, SessionRecord>,
}

impl InMemorySessionBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionBackend for InMemorySessionBackend {
    async fn get(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        Ok(self.records.get(session_id).map(|r| r.clone()))
    }

    async fn set(&self, record: &SessionRecord, _ttl: Duration) -> Result<()> {
        self.records.insert(record.session_id.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        self.records.remove(session_id);
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}
