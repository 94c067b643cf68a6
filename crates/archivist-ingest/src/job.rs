//! Document job model: a queue payload `{doc_id, attempts}`
//! plus a state machine tracking worker-side lease metadata that the
//! `Document` row itself doesn't carry (retry schedule, current stage,
//! lease holder). Generalized from the teacher's `Job`/`JobState`/
//! `JobStateMachine` (`repo_id`/`snapshot_id` → `doc_id`, the four
//! code-graph stages → the five document stages A-E).

use crate::error::{IngestError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One step of the per-document pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageId {
    FetchBlob,
    ExtractText,
    Analyze,
    Embed,
    Preview,
}

impl StageId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::FetchBlob => "fetch_blob",
            StageId::ExtractText => "extract_text",
            StageId::Analyze => "analyze",
            StageId::Embed => "embed",
            StageId::Preview => "preview",
        }
    }

    /// Progress percentage reached on completion of this stage.
    pub fn progress_after(&self) -> i16 {
        match self {
            StageId::FetchBlob => 5,
            StageId::ExtractText => 25,
            StageId::Analyze => 55,
            StageId::Embed => 80,
            StageId::Preview => 100,
        }
    }

    pub const ORDER: [StageId; 5] = [
        StageId::FetchBlob,
        StageId::ExtractText,
        StageId::Analyze,
        StageId::Embed,
        StageId::Preview,
    ];
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Job queue payload, serialized onto `archivist_cache::CacheBroker`'s
/// queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPayload {
    pub doc_id: i64,
    pub attempts: u32,
}

impl JobPayload {
    pub fn new(doc_id: i64) -> Self {
        Self { doc_id, attempts: 0 }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(IngestError::serialization)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(IngestError::serialization)
    }
}

/// Worker-side lease state for a job, not persisted on the `Document` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobState {
    Running {
        started_at: DateTime<Utc>,
        worker_id: String,
        current_stage: StageId,
    },
    Completed {
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        duration_ms: u64,
    },
    Failed {
        started_at: DateTime<Utc>,
        failed_at: DateTime<Utc>,
        error: String,
        failed_stage: StageId,
        attempts: u32,
        next_retry_at: Option<DateTime<Utc>>,
    },
}

impl JobState {
    pub fn state_name(&self) -> &'static str {
        match self {
            JobState::Running { .. } => "running",
            JobState::Completed { .. } => "completed",
            JobState::Failed { .. } => "failed",
        }
    }
}

/// Tracks one in-flight job's lease through `Running → {Completed, Failed}`,
/// mirroring the teacher's `JobStateMachine` with the retry-eligibility
/// scheduling spec.md §4.6 assigns to the ingestion layer rather than the
/// `Document` row.
pub struct JobStateMachine {
    state: JobState,
}

impl JobStateMachine {
    pub fn start(worker_id: String, current_stage: StageId) -> Self {
        Self {
            state: JobState::Running {
                started_at: Utc::now(),
                worker_id,
                current_stage,
            },
        }
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn update_stage(&mut self, stage: StageId) -> Result<()> {
        match &mut self.state {
            JobState::Running { current_stage, .. } => {
                *current_stage = stage;
                Ok(())
            }
            _ => Err(IngestError::InvalidStateTransition {
                from: self.state.state_name().to_string(),
                to: "update_stage".to_string(),
            }),
        }
    }

    pub fn complete(&mut self) -> Result<()> {
        match &self.state {
            JobState::Running { started_at, .. } => {
                let now = Utc::now();
                let duration_ms = (now - *started_at).num_milliseconds().max(0) as u64;
                self.state = JobState::Completed {
                    started_at: *started_at,
                    completed_at: now,
                    duration_ms,
                };
                Ok(())
            }
            _ => Err(IngestError::InvalidStateTransition {
                from: self.state.state_name().to_string(),
                to: "completed".to_string(),
            }),
        }
    }

    /// Schedules a retry at `min(2^attempts * base, cap)` seconds out when
    /// `attempts` is still under the cap and the failure was retriable;
    /// otherwise this is the terminal failure.
    pub fn fail(&mut self, error: String, retriable: bool, attempts: u32, max_attempts: u32, base_s: u64, cap_s: u64) -> Result<()> {
        match &self.state {
            JobState::Running { started_at, current_stage, .. } => {
                let now = Utc::now();
                let next_retry_at = if retriable && attempts < max_attempts {
                    let backoff_s = 2u64.saturating_pow(attempts).saturating_mul(base_s).min(cap_s);
                    Some(now + chrono::Duration::seconds(backoff_s as i64))
                } else {
                    None
                };
                self.state = JobState::Failed {
                    started_at: *started_at,
                    failed_at: now,
                    error,
                    failed_stage: *current_stage,
                    attempts,
                    next_retry_at,
                };
                Ok(())
            }
            _ => Err(IngestError::InvalidStateTransition {
                from: self.state.state_name().to_string(),
                to: "failed".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_progress_matches_spec_checkpoints() {
        assert_eq!(StageId::ExtractText.progress_after(), 25);
        assert_eq!(StageId::Analyze.progress_after(), 55);
        assert_eq!(StageId::Embed.progress_after(), 80);
        assert_eq!(StageId::Preview.progress_after(), 100);
    }

    #[test]
    fn job_payload_roundtrips_through_bytes() {
        let payload = JobPayload { doc_id: 42, attempts: 2 };
        let bytes = payload.to_bytes().unwrap();
        let parsed = JobPayload::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.doc_id, 42);
        assert_eq!(parsed.attempts, 2);
    }

    #[test]
    fn running_to_completed_transition() {
        let mut sm = JobStateMachine::start("worker-1".to_string(), StageId::FetchBlob);
        sm.complete().unwrap();
        assert!(matches!(sm.state(), JobState::Completed { .. }));
    }

    #[test]
    fn retriable_failure_under_cap_schedules_retry() {
        let mut sm = JobStateMachine::start("worker-1".to_string(), StageId::ExtractText);
        sm.fail("transient".to_string(), true, 1, 5, 1, 15).unwrap();
        match sm.state() {
            JobState::Failed { next_retry_at, failed_stage, .. } => {
                assert!(next_retry_at.is_some());
                assert_eq!(*failed_stage, StageId::ExtractText);
            }
            _ => panic!("expected failed state"),
        }
    }

    #[test]
    fn failure_at_max_attempts_has_no_retry() {
        let mut sm = JobStateMachine::start("worker-1".to_string(), StageId::Embed);
        sm.fail("quota exhausted".to_string(), false, 5, 5, 1, 15).unwrap();
        match sm.state() {
            JobState::Failed { next_retry_at, .. } => assert!(next_retry_at.is_none()),
            _ => panic!("expected failed state"),
        }
    }

    #[test]
    fn cannot_complete_twice() {
        let mut sm = JobStateMachine::start("worker-1".to_string(), StageId::Preview);
        sm.complete().unwrap();
        assert!(sm.complete().is_err());
    }
}
