//! Document lifecycle pipeline: enqueuer, checkpointed
//! worker pool, scheduler, and the five processing stages A-E, built on
//! `archivist-store`, `archivist-cache`, `archivist-blob`, `archivist-ai`,
//! and `archivist-taxonomy`.

pub mod checkpoint;
pub mod dag;
pub mod error;
pub mod job;
pub mod orchestrator;
pub mod pipeline;
pub mod preview;
pub mod stages;

pub use checkpoint::CheckpointManager;
pub use dag::{CheckpointKeys, PipelineDAG, StageNode};
pub use error::{IngestError, Result};
pub use job::{JobPayload, JobState, JobStateMachine, StageId};
pub use orchestrator::{Enqueuer, Scheduler, WorkerPool};
pub use pipeline::{StageContext, StageHandler, StageMetrics, StageOutcome, WorkingSet};
pub use preview::{NoopPreviewGenerator, PreviewGenerator};
pub use stages::{AnalyzeStage, EmbedStage, ExtractTextStage, FetchBlobStage, PreviewStage};
