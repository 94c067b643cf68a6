//! The pipeline's stage graph: strictly sequential per
//! document, so the teacher's topological-sort/cycle-detection DAG
//! collapses to a single five-node chain — kept rather than discarded, the
//! way spec.md §4.6 describes it, so a future fan-out stage (e.g. parallel
//! OCR + native extraction) only needs new `StageNode` edges.

use crate::error::{IngestError, Result};
use crate::job::StageId;
use std::collections::{HashMap, HashSet};

/// Per-document checkpoint key manager (teacher's `CacheKeyManager`,
/// generalized from `{repo_id, snapshot_id}` to a single `doc_id`).
#[derive(Debug, Clone, Copy)]
pub struct CheckpointKeys {
    doc_id: i64,
}

impl CheckpointKeys {
    pub fn new(doc_id: i64) -> Self {
        Self { doc_id }
    }

    pub fn key_for_stage(&self, stage: StageId) -> String {
        format!("ingest:{}:{}", self.doc_id, stage.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct StageNode {
    pub id: StageId,
    pub name: &'static str,
    pub dependencies: Vec<StageId>,
}

impl StageNode {
    pub fn new(id: StageId, name: &'static str, dependencies: Vec<StageId>) -> Self {
        Self { id, name, dependencies }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineDAG {
    stages: HashMap<StageId, StageNode>,
    execution_order: Vec<StageId>,
}

impl PipelineDAG {
    pub fn new(stages: Vec<StageNode>) -> Result<Self> {
        let mut stage_map = HashMap::new();
        for stage in stages {
            stage_map.insert(stage.id, stage);
        }

        for stage in stage_map.values() {
            for dep in &stage.dependencies {
                if !stage_map.contains_key(dep) {
                    return Err(IngestError::MissingDependency(format!(
                        "stage {:?} depends on non-existent stage {:?}",
                        stage.id, dep
                    )));
                }
            }
        }

        let execution_order = Self::topological_sort(&stage_map)?;

        Ok(Self { stages: stage_map, execution_order })
    }

    /// The fixed document pipeline: fetch → extract → analyze → embed →
    /// preview, each depending on the one before it.
    pub fn document_pipeline() -> Result<Self> {
        Self::new(vec![
            StageNode::new(StageId::FetchBlob, "Fetch Blob", vec![]),
            StageNode::new(StageId::ExtractText, "Extract Text", vec![StageId::FetchBlob]),
            StageNode::new(StageId::Analyze, "Analyze", vec![StageId::ExtractText]),
            StageNode::new(StageId::Embed, "Embed", vec![StageId::Analyze]),
            StageNode::new(StageId::Preview, "Preview", vec![StageId::Embed]),
        ])
    }

    fn topological_sort(stages: &HashMap<StageId, StageNode>) -> Result<Vec<StageId>> {
        let mut in_degree: HashMap<StageId, usize> = stages.keys().map(|&id| (id, 0)).collect();
        for stage in stages.values() {
            *in_degree.get_mut(&stage.id).unwrap() += stage.dependencies.len();
        }

        let mut order = Vec::with_capacity(stages.len());
        let mut processed = HashSet::new();

        while processed.len() < stages.len() {
            let mut ready: Vec<StageId> = in_degree
                .iter()
                .filter(|(id, &degree)| degree == 0 && !processed.contains(*id))
                .map(|(&id, _)| id)
                .collect();
            if ready.is_empty() {
                return Err(IngestError::DagCycleDetected);
            }
            ready.sort_by_key(|id| id.as_str());

            for stage_id in ready {
                processed.insert(stage_id);
                in_degree.remove(&stage_id);
                order.push(stage_id);
                for dependent in stages.values() {
                    if dependent.dependencies.contains(&stage_id) {
                        *in_degree.get_mut(&dependent.id).unwrap() -= 1;
                    }
                }
            }
        }

        Ok(order)
    }

    pub fn execution_order(&self) -> &[StageId] {
        &self.execution_order
    }

    pub fn get_stage(&self, id: StageId) -> Option<&StageNode> {
        self.stages.get(&id)
    }

    pub fn execution_plan(&self) -> String {
        self.execution_order
            .iter()
            .enumerate()
            .map(|(i, id)| format!("Step {}: {}", i + 1, self.stages[id].name))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_keys_are_per_document_and_per_stage() {
        let keys = CheckpointKeys::new(42);
        assert_eq!(keys.key_for_stage(StageId::FetchBlob), "ingest:42:fetch_blob");
        assert_eq!(keys.key_for_stage(StageId::Embed), "ingest:42:embed");
    }

    #[test]
    fn document_pipeline_is_a_strict_chain() {
        let dag = PipelineDAG::document_pipeline().unwrap();
        assert_eq!(dag.execution_order(), &StageId::ORDER);
    }

    #[test]
    fn missing_dependency_is_rejected() {
        let stages = vec![StageNode::new(StageId::ExtractText, "Extract", vec![StageId::FetchBlob])];
        assert!(PipelineDAG::new(stages).is_err());
    }

    #[test]
    fn execution_plan_lists_steps_in_order() {
        let dag = PipelineDAG::document_pipeline().unwrap();
        let plan = dag.execution_plan();
        assert!(plan.contains("Step 1: Fetch Blob"));
        assert!(plan.contains("Step 5: Preview"));
    }
}
