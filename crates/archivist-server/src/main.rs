//! `archivist-server`: the binary entry point. Loads configuration,
//! wires every component in spec.md §2 ("Store" through "HTTP Surface")
//! together behind `Arc`s, spawns the worker pool/scheduler/session
//! health-check loops, and serves the HTTP Surface until shutdown.
//!
//! Environment-variable plumbing, CLI flags, and process supervision are
//! explicitly out of scope for the core; this binary is the
//! thin ambient wiring every crate in the workspace still needs to boot
//! as one process, the same role the teacher's own `main.rs` plays for
//! `codegraph-orchestration`.

use archivist_ai::providers::{AnthropicProvider, GeminiProvider, MockProvider, OpenAiProvider};
use archivist_ai::{AiGateway, AiProvider, Capabilities};
use archivist_blob::local::LocalBlobStore;
use archivist_blob::s3::S3BlobStore;
use archivist_blob::BlobStore;
use archivist_cache::{CacheBroker, RedisCacheBroker};
use archivist_core::config::{AiProviderConfig, BlobBackendKind, Cli};
use archivist_core::Settings;
use archivist_http::rate_limit::RateLimiter;
use archivist_http::state::AppState;
use archivist_ingest::{
    AnalyzeStage, CheckpointManager, EmbedStage, Enqueuer, ExtractTextStage, FetchBlobStage,
    NoopPreviewGenerator, PipelineDAG, PreviewStage, Scheduler, StageHandler, StageId, WorkerPool,
};
use archivist_search::SearchEngine;
use archivist_session::{InMemorySessionBackend, RedisSessionBackend, SessionCore};
use archivist_store::{PgStore, Store};
use archivist_taxonomy::TaxonomyEngine;
use clap::Parser;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Default analysis prompt. Operators needing a different prompt supply one through an
/// out-of-scope collaborator; this is the fallback the gateway always has something to send.
const DEFAULT_ANALYSIS_PROMPT: &str = "Analyze the following document and respond with a single JSON object with keys: summary, document_type, campaign_type, document_tone, categories (array of strings), and keyword_mappings (array of {verbatim_term, mapped_canonical_term}). Map keywords only to terms drawn from this taxonomy where a good match exists: {{taxonomy}}";

/// Graceful-shutdown grace period before in-flight jobs are forced to
/// abort.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// How often the Session Core's primary backend is health-checked and
/// `active` swapped on a transition. Not named by
/// spec.md directly; short enough that a Cache/Broker outage is detected
/// well within one request's timeout.
const SESSION_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let settings = Arc::new(Settings::load(&cli)?);

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(settings.log_filter.clone()))
        .json()
        .init();

    tracing::info!(bind_addr = %settings.bind_addr, worker_concurrency = settings.worker_concurrency, "starting archivist-server");

    let store: Arc<dyn Store> = Arc::new(
        PgStore::connect(&settings.database_url, (settings.worker_concurrency as u32) + 20)
            .await
            .map_err(|e| anyhow::anyhow!("connecting to store: {e}"))?,
    );

    let cache: Arc<dyn CacheBroker> = Arc::new(
        RedisCacheBroker::connect(&settings.redis_url).map_err(|e| anyhow::anyhow!("connecting to cache/broker: {e}"))?,
    );

    let blob: Arc<dyn BlobStore> = match settings.blob_backend {
        BlobBackendKind::Local => Arc::new(
            LocalBlobStore::new(&settings.blob_local_root).map_err(|e| anyhow::anyhow!("opening local blob store: {e}"))?,
        ),
        BlobBackendKind::S3 => {
            let bucket = settings
                .s3_bucket
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("blob_backend=s3 requires s3_bucket to be set"))?;
            Arc::new(S3BlobStore::new(bucket).map_err(|e| anyhow::anyhow!("opening S3 blob store: {e}"))?)
        }
    };

    let taxonomy = Arc::new(TaxonomyEngine::new(store.clone()));
    taxonomy.refresh().await.map_err(|e| anyhow::anyhow!("loading taxonomy snapshot: {e}"))?;

    let providers: Vec<Arc<dyn AiProvider>> = settings.ai_providers.iter().map(build_provider).collect();
    if providers.is_empty() {
        tracing::warn!("no ai_providers configured; every extract/analyze/embed call will fail with ProviderUnavailable");
    }
    let ai = Arc::new(AiGateway::new(providers));

    let session = Arc::new(SessionCore::new(
        Arc::new(RedisSessionBackend::new(cache.clone())),
        Arc::new(InMemorySessionBackend::new()),
        &settings.session_secret,
        settings.session_ttl_s,
    ));

    let search = Arc::new(SearchEngine::new(store.clone(), cache.clone(), taxonomy.clone(), ai.clone(), settings.clone()));
    let checkpoint_mgr = Arc::new(CheckpointManager::new(cache.clone()));
    let enqueuer = Arc::new(Enqueuer::new(store.clone(), cache.clone(), checkpoint_mgr.clone()));

    let state = Arc::new(AppState {
        settings: settings.clone(),
        store: store.clone(),
        cache: cache.clone(),
        blob: blob.clone(),
        taxonomy: taxonomy.clone(),
        ai: ai.clone(),
        search,
        session: session.clone(),
        enqueuer: enqueuer.clone(),
        login_limiter: RateLimiter::new(),
        start_time: Instant::now(),
    });

    let cancel = CancellationToken::new();

    let worker_pool = Arc::new(WorkerPool::new(
        PipelineDAG::document_pipeline().map_err(|e| anyhow::anyhow!("building pipeline DAG: {e}"))?,
        stage_handlers(blob.clone(), ai.clone(), taxonomy.clone(), store.clone(), &settings),
        checkpoint_mgr.clone(),
        store.clone(),
        cache.clone(),
        settings.clone(),
    ));
    let scheduler = Arc::new(Scheduler::new(store.clone(), cache.clone(), checkpoint_mgr.clone(), settings.scheduler_interval_s, settings.stuck_job_sweep_s as i64));

    let mut background = Vec::new();
    background.push(tokio::spawn(worker_pool.clone().run(cancel.clone())));
    background.push(tokio::spawn(scheduler.clone().run(cancel.clone())));
    background.push(tokio::spawn(session_health_loop(session.clone(), cancel.clone())));

    let app = archivist_http::build_router(state);
    let listener = tokio::net::TcpListener::bind(&settings.bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("binding {}: {e}", settings.bind_addr))?;

    tracing::info!(addr = %settings.bind_addr, "HTTP Surface listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await
        .map_err(|e| anyhow::anyhow!("server error: {e}"))?;

    // Let in-flight jobs finish within the grace window before the
    // process exits.
    let _ = tokio::time::timeout(SHUTDOWN_GRACE, futures::future::join_all(background)).await;
    tracing::info!("archivist-server shut down");
    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received, draining worker pool");
    cancel.cancel();
}

async fn session_health_loop(session: Arc<SessionCore>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(SESSION_HEALTH_CHECK_INTERVAL);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => session.health_check_tick().await,
        }
    }
}

fn stage_handlers(
    blob: Arc<dyn BlobStore>,
    ai: Arc<AiGateway>,
    taxonomy: Arc<TaxonomyEngine>,
    store: Arc<dyn Store>,
    settings: &Settings,
) -> HashMap<StageId, Arc<dyn StageHandler>> {
    let mut handlers: HashMap<StageId, Arc<dyn StageHandler>> = HashMap::new();
    handlers.insert(StageId::FetchBlob, Arc::new(FetchBlobStage::new(blob)));
    handlers.insert(StageId::ExtractText, Arc::new(ExtractTextStage::new(ai.clone())));
    handlers.insert(
        StageId::Analyze,
        Arc::new(AnalyzeStage::new(ai.clone(), taxonomy, store.clone(), DEFAULT_ANALYSIS_PROMPT.to_string())),
    );
    handlers.insert(
        StageId::Embed,
        Arc::new(EmbedStage::new(ai, store.clone(), settings.vector_dim, settings.allow_partial_completion_on_embedding_failure)),
    );
    handlers.insert(StageId::Preview, Arc::new(PreviewStage::new(Arc::new(NoopPreviewGenerator), store)));
    handlers
}

/// Builds a concrete [`AiProvider`] from one `ai_providers` config entry
///. Unknown provider names fall back to `MockProvider` so
/// misconfiguration surfaces as predictable canned behavior rather than a
/// boot failure.
fn build_provider(config: &AiProviderConfig) -> Arc<dyn AiProvider> {
    let api_key = config.extra.get("api_key").cloned().unwrap_or_default();
    match config.name.to_lowercase().as_str() {
        "anthropic" => match config.extra.get("model") {
            Some(model) => Arc::new(AnthropicProvider::with_model(api_key, model.clone())),
            None => Arc::new(AnthropicProvider::new(api_key)),
        },
        "openai" => Arc::new(OpenAiProvider::new(api_key)),
        "gemini" => Arc::new(GeminiProvider::new(api_key)),
        other => {
            tracing::warn!(provider = other, "unrecognized ai_providers entry, substituting MockProvider");
            Arc::new(MockProvider::new(
                config.name.clone(),
                Capabilities { extract: config.can_extract, analyze: config.can_analyze, embed: config.can_embed },
            ))
        }
    }
}
