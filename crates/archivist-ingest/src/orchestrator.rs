//! Enqueuer, worker pool, and scheduler — the teacher's
//! `PipelineOrchestrator` generalized from DAG-phase fan-out over a repo's
//! files to a `tokio::sync::Semaphore`-gated pool of per-document workers,
//! since documents carry no cross-document dependency graph to schedule
//! around.

use crate::checkpoint::CheckpointManager;
use crate::dag::{CheckpointKeys, PipelineDAG};
use crate::error::{IngestError, Result};
use crate::job::{JobPayload, JobState, JobStateMachine, StageId};
use crate::pipeline::{StageContext, StageHandler, WorkingSet};
use archivist_cache::{keys, CacheBroker, ReservedJob};
use archivist_core::config::Settings;
use archivist_core::model::{Document, DocumentStatus};
use archivist_store::Store;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// `search:` is the prefix every cached search-result entry is stored
/// under (`archivist_cache::broker::keys::search`); step E invalidates all
/// of them rather than tracking which ones a given document influenced.
const SEARCH_CACHE_PREFIX: &str = "search:";

/// On upload, creates the `Document` row and enqueues its first job; on a
/// timer, re-enqueues documents stuck in `PENDING`/`QUEUED`.
pub struct Enqueuer {
    store: Arc<dyn Store>,
    cache: Arc<dyn CacheBroker>,
    checkpoint_mgr: Arc<CheckpointManager>,
}

impl Enqueuer {
    pub fn new(store: Arc<dyn Store>, cache: Arc<dyn CacheBroker>, checkpoint_mgr: Arc<CheckpointManager>) -> Self {
        Self { store, cache, checkpoint_mgr }
    }

    pub async fn enqueue_upload(&self, filename: &str, blob_key: &str, size_bytes: Option<i64>) -> Result<Document> {
        self.enqueue_upload_with_eta(filename, blob_key, size_bytes, None).await
    }

    /// Same as [`Self::enqueue_upload`], but lets a caller delay the job's
    /// visibility. The
    /// HTTP Surface uses this to space out jobs from a single multi-file
    /// upload request rather than blocking the request thread on a sleep.
    pub async fn enqueue_upload_with_eta(
        &self,
        filename: &str,
        blob_key: &str,
        size_bytes: Option<i64>,
        eta: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<Document> {
        let document = self.store.create_document(filename, blob_key, size_bytes).await?;
        self.store.update_status(document.id, DocumentStatus::Queued, None, None).await?;
        let payload = JobPayload::new(document.id).to_bytes()?;
        self.cache.enqueue(keys::JOB_QUEUE_DOCUMENTS_PROCESS, &payload, eta).await?;
        Ok(document)
    }

    /// Enqueues a job for a document that already exists. Used both by
    /// the stuck-document sweep and by `/documents/{id}/reprocess`; in the
    /// reprocess case the caller has just reset the document's derived
    /// fields, so any checkpoints left behind by a prior terminal run must
    /// be cleared here too — otherwise a resumed worker would skip stages
    /// whose checkpointed output no longer matches the reset document.
    pub async fn enqueue_existing(&self, doc_id: i64) -> Result<()> {
        self.checkpoint_mgr.delete_document_checkpoints(&CheckpointKeys::new(doc_id)).await?;
        let payload = JobPayload::new(doc_id).to_bytes()?;
        self.cache.enqueue(keys::JOB_QUEUE_DOCUMENTS_PROCESS, &payload, None).await?;
        Ok(())
    }

    /// Idempotent: re-enqueuing a document whose job is merely slow (not
    /// actually lost) just gives it a second queue entry, which the
    /// single-lease invariant on `PROCESSING` makes harmless.
    pub async fn sweep_stuck(&self, older_than_s: i64) -> Result<u64> {
        let stuck = self.store.find_stuck_documents(older_than_s).await?;
        let count = stuck.len() as u64;
        for doc_id in stuck {
            let payload = JobPayload::new(doc_id).to_bytes()?;
            self.cache.enqueue(keys::JOB_QUEUE_DOCUMENTS_PROCESS, &payload, None).await?;
        }
        if count > 0 {
            tracing::info!(count, older_than_s, "swept stuck documents back onto the queue");
        }
        Ok(count)
    }
}

fn infer_content_type(filename: &str) -> String {
    let ext = std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "text/plain",
    }
    .to_string()
}

/// A bounded pool of workers, each reserving one job at a time from
/// `job:documents:process` and running it through steps A-E. Concurrency is `settings.worker_concurrency`.
pub struct WorkerPool {
    dag: PipelineDAG,
    handlers: HashMap<StageId, Arc<dyn StageHandler>>,
    checkpoint_mgr: Arc<CheckpointManager>,
    store: Arc<dyn Store>,
    cache: Arc<dyn CacheBroker>,
    settings: Arc<Settings>,
    semaphore: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(
        dag: PipelineDAG,
        handlers: HashMap<StageId, Arc<dyn StageHandler>>,
        checkpoint_mgr: Arc<CheckpointManager>,
        store: Arc<dyn Store>,
        cache: Arc<dyn CacheBroker>,
        settings: Arc<Settings>,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(settings.worker_concurrency.max(1)));
        Self { dag, handlers, checkpoint_mgr, store, cache, settings, semaphore }
    }

    /// Runs until `cancel` fires; in-flight jobs are given the remainder
    /// of their visibility timeout to finish rather than being aborted.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        loop {
            let permit = match self.semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            let visibility = Duration::from_secs(self.settings.job_visibility_timeout_s);
            let reserved = tokio::select! {
                _ = cancel.cancelled() => {
                    drop(permit);
                    break;
                }
                result = self.cache.reserve(keys::JOB_QUEUE_DOCUMENTS_PROCESS, visibility) => result,
            };

            match reserved {
                Ok(Some(job)) => {
                    let this = self.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        if let Err(err) = this.process_job(job).await {
                            tracing::debug!(error = %err, "worker finished a job with an error");
                        }
                    });
                }
                Ok(None) => {
                    drop(permit);
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_millis(250)) => {}
                    }
                }
                Err(err) => {
                    drop(permit);
                    tracing::error!(error = %err, "failed to reserve a job");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                    }
                }
            }
        }
        tracing::info!("worker pool drained");
    }

    /// Runs one reserved job through `run_document`, then acks, nacks with
    /// backoff, or fails the document terminally. Drives a
    /// `JobStateMachine` alongside the real work so its `Running` state
    /// always names the stage currently executing and its terminal state
    /// carries the same retry decision the cache queue acts on.
    async fn process_job(&self, reserved: ReservedJob) -> Result<()> {
        let payload = JobPayload::from_bytes(&reserved.payload)?;
        let worker_id = format!("worker-{}", uuid::Uuid::new_v4());
        let mut sm = JobStateMachine::start(worker_id.clone(), StageId::FetchBlob);

        match self.run_document(payload.doc_id, &worker_id, &mut sm).await {
            Ok(()) => {
                sm.complete().ok();
                if let JobState::Completed { duration_ms, .. } = sm.state() {
                    tracing::debug!(doc_id = payload.doc_id, duration_ms, "job state machine: completed");
                }
                self.cache.ack(&reserved.job_id).await?;
                Ok(())
            }
            Err(err) => {
                let attempts = reserved.attempts + 1;
                let retriable = err.is_retriable() && attempts < self.settings.retry_max_attempts;
                sm.fail(err.to_string(), retriable, attempts, self.settings.retry_max_attempts, self.settings.retry_base_s, self.settings.retry_cap_s)
                    .ok();
                if retriable {
                    let backoff = Duration::from_secs(self.settings.retry_backoff_s(attempts));
                    tracing::warn!(doc_id = payload.doc_id, attempts, error = %err, "document processing failed, retrying");
                    self.cache.nack(&reserved.job_id, &err.to_string(), backoff).await?;
                } else {
                    tracing::error!(doc_id = payload.doc_id, attempts, error = %err, "document processing failed terminally");
                    let _ = self.store.update_status(payload.doc_id, DocumentStatus::Failed, None, Some(&err.to_string())).await;
                    self.cache.ack(&reserved.job_id).await?;
                }
                Err(err)
            }
        }
    }

    /// Runs steps A-E for one document, skipping stages a prior attempt
    /// already checkpointed, and finalizes on success. `sm` tracks which
    /// stage is currently leased so a caller inspecting `JobState::Running`
    /// mid-flight sees real progress, not just the `Document.progress` field.
    async fn run_document(&self, doc_id: i64, worker_id: &str, sm: &mut JobStateMachine) -> Result<()> {
        let document = self.store.get(doc_id).await?;
        self.store
            .update_status(doc_id, DocumentStatus::Processing, Some(StageId::FetchBlob.progress_after()), None)
            .await?;

        let ctx = StageContext::new(doc_id, worker_id.to_string(), self.checkpoint_mgr.clone());
        let completed = self.checkpoint_mgr.completed_stages(&ctx.keys).await?;

        let mut working = WorkingSet {
            filename: Some(document.filename.clone()),
            blob_key: Some(document.blob_key.clone()),
            extracted_text: document.extracted_text.clone(),
            analysis: document.ai_analysis.clone(),
            keywords: (!document.keywords.is_empty()).then(|| document.keywords.clone()),
            metadata: Some(document.metadata.clone()),
            embedding: document.search_vector.clone(),
            preview_key: document.preview_key.clone(),
            ..Default::default()
        };

        for stage_id in self.dag.execution_order().iter().copied() {
            sm.update_stage(stage_id).ok();

            if completed.contains(&stage_id) {
                if stage_id == StageId::FetchBlob {
                    if let Some(bytes) = self.checkpoint_mgr.load_checkpoint(&ctx.keys, StageId::FetchBlob).await? {
                        working.content_type.get_or_insert_with(|| infer_content_type(&document.filename));
                        working.blob_bytes = Some(bytes);
                    }
                }
                continue;
            }

            let handler = self
                .handlers
                .get(&stage_id)
                .ok_or_else(|| IngestError::MissingDependency(stage_id.to_string()))?;
            let outcome = handler.execute(&ctx, &mut working).await?;
            self.checkpoint_mgr.save_checkpoint(&ctx.keys, stage_id, &outcome.checkpoint_data).await?;
            self.store.update_status(doc_id, DocumentStatus::Processing, Some(stage_id.progress_after()), None).await?;
        }

        self.store.update_status(doc_id, DocumentStatus::Completed, Some(100), None).await?;
        self.checkpoint_mgr.delete_document_checkpoints(&ctx.keys).await?;
        self.cache.delete_prefix(SEARCH_CACHE_PREFIX).await?;
        self.cache.delete(keys::FACETS_ENHANCED_ALL).await?;
        Ok(())
    }
}

/// Runs every `interval_s`: re-enqueues
/// stuck documents and logs queue depth. Expired facet-cache entries need
/// no active eviction — `CacheBroker::get` already treats a past `ttl` as
/// a miss.
pub struct Scheduler {
    enqueuer: Enqueuer,
    cache: Arc<dyn CacheBroker>,
    interval_s: u64,
    stuck_threshold_s: i64,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn Store>,
        cache: Arc<dyn CacheBroker>,
        checkpoint_mgr: Arc<CheckpointManager>,
        interval_s: u64,
        stuck_threshold_s: i64,
    ) -> Self {
        Self { enqueuer: Enqueuer::new(store, cache.clone(), checkpoint_mgr), cache, interval_s, stuck_threshold_s }
    }

    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(Duration::from_secs(self.interval_s.max(1)));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(err) = self.tick().await {
                        tracing::warn!(error = %err, "scheduler tick failed");
                    }
                }
            }
        }
        tracing::info!("scheduler stopped");
    }

    async fn tick(&self) -> Result<()> {
        let requeued = self.enqueuer.sweep_stuck(self.stuck_threshold_s).await?;
        let depth = self.cache.queue_depth(keys::JOB_QUEUE_DOCUMENTS_PROCESS).await?;
        tracing::info!(requeued, queue_depth = depth, "scheduler tick");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::{AnalyzeStage, EmbedStage, ExtractTextStage, FetchBlobStage, PreviewStage};
    use archivist_ai::providers::MockProvider;
    use archivist_ai::{AiGateway, Capabilities};
    use archivist_blob::local::LocalBlobStore;
    use archivist_blob::BlobStore;
    use archivist_cache::InMemoryCacheBroker;
    use archivist_store::MemStore;
    use archivist_taxonomy::TaxonomyEngine;

    fn tmp_dir() -> String {
        std::env::temp_dir().join(format!("archivist-orch-{}", uuid::Uuid::new_v4())).to_string_lossy().into_owned()
    }

    fn handlers(
        blob: Arc<dyn BlobStore>,
        ai: Arc<AiGateway>,
        taxonomy: Arc<TaxonomyEngine>,
        store: Arc<dyn Store>,
    ) -> HashMap<StageId, Arc<dyn StageHandler>> {
        let mut map: HashMap<StageId, Arc<dyn StageHandler>> = HashMap::new();
        map.insert(StageId::FetchBlob, Arc::new(FetchBlobStage::new(blob)));
        map.insert(StageId::ExtractText, Arc::new(ExtractTextStage::new(ai.clone())));
        map.insert(StageId::Analyze, Arc::new(AnalyzeStage::new(ai.clone(), taxonomy, store.clone(), "Summarize: {{taxonomy}}".into())));
        map.insert(StageId::Embed, Arc::new(EmbedStage::new(ai, store.clone(), 4, false)));
        map.insert(StageId::Preview, Arc::new(PreviewStage::new(Arc::new(crate::preview::NoopPreviewGenerator), store)));
        map
    }

    #[tokio::test]
    async fn enqueue_upload_creates_document_and_queues_job() {
        let store = Arc::new(MemStore::new());
        let cache = Arc::new(InMemoryCacheBroker::new());
        let checkpoint_mgr = Arc::new(CheckpointManager::new(cache.clone()));
        let enqueuer = Enqueuer::new(store.clone(), cache.clone(), checkpoint_mgr);

        let doc = enqueuer.enqueue_upload("report.pdf", "blob-key", Some(100)).await.unwrap();
        assert_eq!(doc.status, DocumentStatus::Queued);
        assert_eq!(cache.queue_depth(keys::JOB_QUEUE_DOCUMENTS_PROCESS).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn worker_pool_drains_one_document_to_completion() {
        let dir = tmp_dir();
        let blob: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(&dir).unwrap());
        blob.put("blob-key", b"%PDF-1.4 stub bytes".to_vec(), "application/pdf").await.unwrap();

        let store: Arc<dyn Store> = Arc::new(MemStore::new());
        let cache: Arc<dyn CacheBroker> = Arc::new(InMemoryCacheBroker::new());
        let provider = Arc::new(MockProvider::new("mock", Capabilities { extract: true, analyze: true, embed: true }).with_embedding(vec![0.1; 4]));
        let ai = Arc::new(AiGateway::new(vec![provider]));
        let taxonomy = Arc::new(TaxonomyEngine::new(store.clone()));

        let checkpoint_mgr = Arc::new(CheckpointManager::new(cache.clone()));
        let enqueuer = Enqueuer::new(store.clone(), cache.clone(), checkpoint_mgr.clone());
        let doc = enqueuer.enqueue_upload("report.pdf", "blob-key", None).await.unwrap();

        let settings = Arc::new(Settings { worker_concurrency: 1, ..Settings::default() });
        let pool = Arc::new(WorkerPool::new(
            PipelineDAG::document_pipeline().unwrap(),
            handlers(blob, ai, taxonomy, store.clone()),
            checkpoint_mgr,
            store.clone(),
            cache,
            settings,
        ));

        let reserved = pool.cache.reserve(keys::JOB_QUEUE_DOCUMENTS_PROCESS, Duration::from_secs(60)).await.unwrap().unwrap();
        pool.process_job(reserved).await.unwrap();

        let reloaded = store.get(doc.id).await.unwrap();
        assert_eq!(reloaded.status, DocumentStatus::Completed);
        assert_eq!(reloaded.progress, 100);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn missing_blob_fails_document_terminally_without_retry() {
        let dir = tmp_dir();
        let blob: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(&dir).unwrap());

        let store: Arc<dyn Store> = Arc::new(MemStore::new());
        let cache: Arc<dyn CacheBroker> = Arc::new(InMemoryCacheBroker::new());
        let ai = Arc::new(AiGateway::new(vec![Arc::new(MockProvider::new("mock", Capabilities { extract: true, analyze: true, embed: true }))]));
        let taxonomy = Arc::new(TaxonomyEngine::new(store.clone()));

        let checkpoint_mgr = Arc::new(CheckpointManager::new(cache.clone()));
        let enqueuer = Enqueuer::new(store.clone(), cache.clone(), checkpoint_mgr.clone());
        let doc = enqueuer.enqueue_upload("missing.pdf", "does-not-exist", None).await.unwrap();

        let settings = Arc::new(Settings { worker_concurrency: 1, retry_max_attempts: 3, ..Settings::default() });
        let pool = Arc::new(WorkerPool::new(
            PipelineDAG::document_pipeline().unwrap(),
            handlers(blob, ai, taxonomy, store.clone()),
            checkpoint_mgr,
            store.clone(),
            cache,
            settings,
        ));

        let reserved = pool.cache.reserve(keys::JOB_QUEUE_DOCUMENTS_PROCESS, Duration::from_secs(60)).await.unwrap().unwrap();
        assert!(pool.process_job(reserved).await.is_err());

        let reloaded = store.get(doc.id).await.unwrap();
        assert_eq!(reloaded.status, DocumentStatus::Failed);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn reprocess_clears_stale_checkpoints_left_by_a_terminal_failure() {
        // A prior attempt checkpointed FetchBlob/ExtractText/Analyze, then
        // failed terminally at Embed (e.g. Unauthorized) before those
        // checkpoints expired. Reprocessing must not let a resumed worker
        // skip stages whose checkpointed output belonged to the fields
        // `reset_for_reprocessing` just cleared.
        let store: Arc<dyn Store> = Arc::new(MemStore::new());
        let cache: Arc<dyn CacheBroker> = Arc::new(InMemoryCacheBroker::new());
        let checkpoint_mgr = Arc::new(CheckpointManager::new(cache.clone()));
        let enqueuer = Enqueuer::new(store.clone(), cache.clone(), checkpoint_mgr.clone());

        let doc = enqueuer.enqueue_upload("report.pdf", "blob-key", None).await.unwrap();
        let keys = CheckpointKeys::new(doc.id);
        checkpoint_mgr.save_checkpoint(&keys, StageId::FetchBlob, b"blob-bytes").await.unwrap();
        checkpoint_mgr.save_checkpoint(&keys, StageId::ExtractText, b"extracted text").await.unwrap();
        checkpoint_mgr.save_checkpoint(&keys, StageId::Analyze, b"{}").await.unwrap();
        store.update_status(doc.id, DocumentStatus::Failed, None, Some("embedding: unauthorized")).await.unwrap();

        let completed_before = checkpoint_mgr.completed_stages(&keys).await.unwrap();
        assert_eq!(completed_before.len(), 3);

        store.reset_for_reprocessing(doc.id).await.unwrap();
        enqueuer.enqueue_existing(doc.id).await.unwrap();

        let completed_after = checkpoint_mgr.completed_stages(&keys).await.unwrap();
        assert!(completed_after.is_empty(), "reprocessing must clear every stale checkpoint for the document");
    }
}
