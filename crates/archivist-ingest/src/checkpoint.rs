//! Crash-resilient per-document checkpointing, generalized from the teacher's in-memory/SQLite
//! `CheckpointManager` to a real `archivist_cache::CacheBroker` backend —
//! the `save_checkpoint`/`load_checkpoint`/`completed_stages` surface is
//! unchanged, only the storage underneath it.

use crate::dag::CheckpointKeys;
use crate::error::Result;
use crate::job::StageId;
use archivist_cache::CacheBroker;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// How long a checkpoint survives without being touched — comfortably
/// longer than the sweeper's stuck-document threshold so a resumed worker always finds its predecessor's progress.
const CHECKPOINT_TTL: Duration = Duration::from_secs(3600);

pub struct CheckpointManager {
    broker: Arc<dyn CacheBroker>,
}

impl CheckpointManager {
    pub fn new(broker: Arc<dyn CacheBroker>) -> Self {
        Self { broker }
    }

    pub async fn save_checkpoint(&self, keys: &CheckpointKeys, stage: StageId, data: &[u8]) -> Result<()> {
        self.broker.set(&keys.key_for_stage(stage), data, CHECKPOINT_TTL).await?;
        Ok(())
    }

    pub async fn load_checkpoint(&self, keys: &CheckpointKeys, stage: StageId) -> Result<Option<Vec<u8>>> {
        Ok(self.broker.get(&keys.key_for_stage(stage)).await?)
    }

    pub async fn completed_stages(&self, keys: &CheckpointKeys) -> Result<HashSet<StageId>> {
        let mut completed = HashSet::new();
        for stage in StageId::ORDER {
            if self.broker.get(&keys.key_for_stage(stage)).await?.is_some() {
                completed.insert(stage);
            }
        }
        Ok(completed)
    }

    pub async fn delete_document_checkpoints(&self, keys: &CheckpointKeys) -> Result<()> {
        for stage in StageId::ORDER {
            self.broker.delete(&keys.key_for_stage(stage)).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archivist_cache::InMemoryCacheBroker;

    fn manager() -> CheckpointManager {
        CheckpointManager::new(Arc::new(InMemoryCacheBroker::new()))
    }

    #[tokio::test]
    async fn save_then_load_roundtrips() {
        let mgr = manager();
        let keys = CheckpointKeys::new(1);
        mgr.save_checkpoint(&keys, StageId::ExtractText, b"hello").await.unwrap();
        let loaded = mgr.load_checkpoint(&keys, StageId::ExtractText).await.unwrap();
        assert_eq!(loaded, Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn completed_stages_reflects_saved_checkpoints() {
        let mgr = manager();
        let keys = CheckpointKeys::new(2);
        mgr.save_checkpoint(&keys, StageId::FetchBlob, b"x").await.unwrap();
        mgr.save_checkpoint(&keys, StageId::ExtractText, b"y").await.unwrap();

        let completed = mgr.completed_stages(&keys).await.unwrap();
        assert_eq!(completed.len(), 2);
        assert!(completed.contains(&StageId::FetchBlob));
        assert!(completed.contains(&StageId::ExtractText));
        assert!(!completed.contains(&StageId::Analyze));
    }

    #[tokio::test]
    async fn delete_document_checkpoints_clears_all_stages() {
        let mgr = manager();
        let keys = CheckpointKeys::new(3);
        mgr.save_checkpoint(&keys, StageId::FetchBlob, b"x").await.unwrap();
        mgr.delete_document_checkpoints(&keys).await.unwrap();
        let completed = mgr.completed_stages(&keys).await.unwrap();
        assert!(completed.is_empty());
    }
}
