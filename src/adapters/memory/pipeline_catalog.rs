//! In-memory pipeline catalog.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, PipelineId, StageId};
use crate::domain::pipeline::{ChecklistItem, Pipeline};
use crate::ports::PipelineCatalog;

/// Pipelines and checklists held in memory, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPipelineCatalog {
    pipelines: Arc<RwLock<HashMap<PipelineId, Pipeline>>>,
    checklists: Arc<RwLock<HashMap<StageId, Vec<ChecklistItem>>>>,
}

impl InMemoryPipelineCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a pipeline.
    pub async fn add_pipeline(&self, pipeline: Pipeline) {
        self.pipelines.write().await.insert(*pipeline.id(), pipeline);
    }

    pub async fn add_checklist_item(&self, item: ChecklistItem) {
        let mut checklists = self.checklists.write().await;
        let items = checklists.entry(item.stage_id).or_default();
        items.push(item);
        items.sort_by_key(|i| i.order_index);
    }

    pub async fn pipeline_count(&self) -> usize {
        self.pipelines.read().await.len()
    }
}

#[async_trait]
impl PipelineCatalog for InMemoryPipelineCatalog {
    async fn find_pipeline(&self, id: &PipelineId) -> Result<Option<Pipeline>, DomainError> {
        Ok(self.pipelines.read().await.get(id).cloned())
    }

    async fn list_pipelines(&self) -> Result<Vec<Pipeline>, DomainError> {
        let mut pipelines: Vec<Pipeline> = self.pipelines.read().await.values().cloned().collect();
        pipelines.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(pipelines)
    }

    async fn checklist_items(&self, stage_id: &StageId) -> Result<Vec<ChecklistItem>, DomainError> {
        Ok(self
            .checklists
            .read()
            .await
            .get(stage_id)
            .cloned()
            .unwrap_or_default())
    }
}
