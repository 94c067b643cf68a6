//! The Cache/Broker port: short-lived keyed storage plus a
//! job queue, both backed by the same Redis instance in production.

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// A reserved job handed to a worker by [`CacheBroker::reserve`]. The
/// worker must `ack` or `nack` it before `visibility_timeout` elapses or
/// another worker may reserve it again.
#[derive(Debug, Clone)]
pub struct ReservedJob {
    pub job_id: String,
    pub payload: Vec<u8>,
    pub attempts: u32,
}

/// Liveness probe result for `GET /health` / `GET /health/session`.
#[derive(Debug, Clone, Copy)]
pub struct CacheHealth {
    pub ok: bool,
    pub latency_ms: u64,
}

#[async_trait]
pub trait CacheBroker: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn delete_prefix(&self, prefix: &str) -> Result<u64>;

    /// Durable once this returns; the job is visible to `reserve`
    /// immediately unless `eta` is in the future.
    async fn enqueue(&self, queue: &str, payload: &[u8], eta: Option<chrono::DateTime<chrono::Utc>>) -> Result<String>;

    /// At-most-one delivery within `visibility_timeout`. Returns `None`
    /// if the queue is empty.
    async fn reserve(&self, queue: &str, visibility_timeout: Duration) -> Result<Option<ReservedJob>>;

    async fn ack(&self, job_id: &str) -> Result<()>;

    /// Reschedules with `min(2^attempts * base, cap)` backoff; `attempts` is the count carried on the job payload after
    /// this nack, already incremented by the caller.
    async fn nack(&self, job_id: &str, reason: &str, retry_after: Duration) -> Result<()>;

    /// Approximate depth of `queue`, used for the backpressure watermark
    ///.
    async fn queue_depth(&self, queue: &str) -> Result<u64>;

    async fn health(&self) -> CacheHealth;
}

pub mod keys {
    pub fn search(hash: &str) -> String {
        format!("search:{hash}")
    }

    pub const FACETS_ENHANCED_ALL: &str = "facets:enhanced:all";

    pub fn session(id: &str) -> String {
        format!("session:{id}")
    }

    pub const JOB_QUEUE_DOCUMENTS_PROCESS: &str = "job:documents:process";
}
