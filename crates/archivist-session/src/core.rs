//! `SessionCore`: `create`/`load`/`update`/`destroy`/
//! `health` over an `ArcSwap`-selected backend, so a health-check
//! transition swaps every in-flight caller onto the fallback atomically
//! and without a lock.

use crate::backend::SessionBackend;
use crate::crypto::{generate_session_id, SessionCipher};
use crate::error::Result;
use arc_swap::ArcSwap;
use archivist_core::model::{SessionPayload, SessionRecord};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Lazy-rewrite threshold `R=60s`: a `load` within
/// this long of the last write only bumps `last_accessed_at` in memory,
/// it does not round-trip a write back to the backend.
const REWRITE_AFTER_S: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackendKind {
    Primary,
    Fallback,
}

/// Result of `SessionCore::health`.
#[derive(Debug, Clone, Copy)]
pub struct SessionHealth {
    pub backend_up: bool,
    pub encryption_ok: bool,
    pub using_fallback: bool,
}

pub struct SessionCore {
    primary: Arc<dyn SessionBackend>,
    fallback: Arc<dyn SessionBackend>,
    active: ArcSwap<BackendKind>,
    cipher: SessionCipher,
    ttl_s: u64,
}

impl SessionCore {
    pub fn new(primary: Arc<dyn SessionBackend>, fallback: Arc<dyn SessionBackend>, session_secret: &str, ttl_s: u64) -> Self {
        Self {
            primary,
            fallback,
            active: ArcSwap::from_pointee(BackendKind::Primary),
            cipher: SessionCipher::new(session_secret),
            ttl_s,
        }
    }

    pub fn is_using_fallback(&self) -> bool {
        **self.active.load() == BackendKind::Fallback
    }

    fn backend(&self) -> Arc<dyn SessionBackend> {
        match **self.active.load() {
            BackendKind::Primary => self.primary.clone(),
            BackendKind::Fallback => self.fallback.clone(),
        }
    }

    /// Health-checks the primary and swaps `active` on a transition
    /// either way. Intended to be driven by a periodic scheduler tick,
    /// the same way `archivist_ingest::Scheduler` drives its sweep.
    pub async fn health_check_tick(&self) {
        let primary_up = self.primary.is_healthy().await;
        let using_primary = **self.active.load() == BackendKind::Primary;
        match (using_primary, primary_up) {
            (true, false) => {
                self.active.store(Arc::new(BackendKind::Fallback));
                tracing::warn!("session backend unreachable, switching to in-memory fallback");
            }
            (false, true) => {
                self.active.store(Arc::new(BackendKind::Primary));
                tracing::info!("session backend recovered, switching off in-memory fallback");
            }
            _ => {}
        }
    }

    /// Generates a random 256-bit id and stores the encrypted payload.
    pub async fn create(&self, payload: &SessionPayload) -> Result<String> {
        let session_id = generate_session_id();
        let now = Utc::now();
        let record = SessionRecord {
            session_id: session_id.clone(),
            encrypted_payload: self.cipher.encrypt(&serde_json::to_vec(payload)?)?,
            last_accessed_at: now,
            expires_at: now + chrono::Duration::seconds(self.ttl_s as i64),
        };
        self.backend().set(&record, Duration::from_secs(self.ttl_s)).await?;
        Ok(session_id)
    }

    /// Validates TTL, decrypts, and lazily rewrites `last_accessed_at`
    /// only if more than `R=60s` has elapsed since the last write. A
    /// decrypt failure or an expired TTL is treated as `session_missing`
    /// — `Ok(None)`, logged at WARN — never propagated as an error.
    pub async fn load(&self, session_id: &str) -> Result<Option<SessionPayload>> {
        let Some(mut record) = self.backend().get(session_id).await? else {
            return Ok(None);
        };

        let now = Utc::now();
        if record.expires_at <= now {
            let _ = self.backend().delete(session_id).await;
            return Ok(None);
        }

        let plaintext = match self.cipher.decrypt(&record.encrypted_payload) {
            Ok(p) => p,
            Err(err) => {
                tracing::warn!(session_id, error = %err, "session decryption failed, treating as missing");
                return Ok(None);
            }
        };
        let payload: SessionPayload = serde_json::from_slice(&plaintext)?;

        if (now - record.last_accessed_at).num_seconds() > REWRITE_AFTER_S {
            record.last_accessed_at = now;
            let remaining = (record.expires_at - now).to_std().unwrap_or_default();
            let _ = self.backend().set(&record, remaining).await;
        }

        Ok(Some(payload))
    }

    /// Preserves the existing TTL unless `extend=true`. A no-op if the session no longer exists.
    pub async fn update(&self, session_id: &str, payload: &SessionPayload, extend: bool) -> Result<()> {
        let Some(mut record) = self.backend().get(session_id).await? else {
            return Ok(());
        };

        let now = Utc::now();
        record.encrypted_payload = self.cipher.encrypt(&serde_json::to_vec(payload)?)?;
        record.last_accessed_at = now;

        let ttl = if extend {
            record.expires_at = now + chrono::Duration::seconds(self.ttl_s as i64);
            Duration::from_secs(self.ttl_s)
        } else {
            (record.expires_at - now).to_std().unwrap_or_default()
        };

        self.backend().set(&record, ttl).await?;
        Ok(())
    }

    pub async fn destroy(&self, session_id: &str) -> Result<()> {
        self.backend().delete(session_id).await?;
        Ok(())
    }

    pub async fn health(&self) -> SessionHealth {
        let backend_up = self.backend().is_healthy().await;
        let encryption_ok = self.cipher.encrypt(b"healthcheck").is_ok();
        SessionHealth { backend_up, encryption_ok, using_fallback: self.is_using_fallback() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemorySessionBackend;

    fn core() -> SessionCore {
        SessionCore::new(Arc::new(InMemorySessionBackend::new()), Arc::new(InMemorySessionBackend::new()), "test-secret", 3600)
    }

    fn payload(auth: bool) -> SessionPayload {
        let mut p = SessionPayload::default();
        p.attributes.insert("auth".into(), serde_json::Value::Bool(auth));
        p
    }

    #[tokio::test]
    async fn create_then_load_round_trips_payload() {
        let core = core();
        let id = core.create(&payload(true)).await.unwrap();
        let loaded = core.load(&id).await.unwrap().unwrap();
        assert!(loaded.is_authenticated());
    }

    #[tokio::test]
    async fn load_of_unknown_id_is_none() {
        let core = core();
        assert!(core.load("does-not-exist").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn destroy_removes_session() {
        let core = core();
        let id = core.create(&payload(false)).await.unwrap();
        core.destroy(&id).await.unwrap();
        assert!(core.load(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_without_extend_preserves_expiry() {
        let core = core();
        let id = core.create(&payload(false)).await.unwrap();
        let before = core.backend().get(&id).await.unwrap().unwrap().expires_at;
        core.update(&id, &payload(true), false).await.unwrap();
        let after = core.backend().get(&id).await.unwrap().unwrap().expires_at;
        assert_eq!(before, after);
        assert!(core.load(&id).await.unwrap().unwrap().is_authenticated());
    }

    #[tokio::test]
    async fn health_check_tick_swaps_to_fallback_when_primary_down() {
        struct AlwaysDown;
        #[async_trait::async_trait]
        impl SessionBackend for AlwaysDown {
            async fn get(&self, _id: &str) -> Result<Option<SessionRecord>> {
                Ok(None)
            }
            async fn set(&self, _record: &SessionRecord, _ttl: Duration) -> Result<()> {
                Ok(())
            }
            async fn delete(&self, _id: &str) -> Result<()> {
                Ok(())
            }
            async fn is_healthy(&self) -> bool {
                false
            }
        }

        let core = SessionCore::new(Arc::new(AlwaysDown), Arc::new(InMemorySessionBackend::new()), "secret", 3600);
        assert!(!core.is_using_fallback());
        core.health_check_tick().await;
        assert!(core.is_using_fallback());
    }
}
