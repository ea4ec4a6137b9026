//! Pipeline catalog port (read side).
//!
//! Pipelines, stages and checklist items are managed elsewhere; the
//! engine only reads them.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, PipelineId, StageId};
use crate::domain::pipeline::{ChecklistItem, Pipeline};

/// Read access to pipeline definitions.
#[async_trait]
pub trait PipelineCatalog: Send + Sync {
    /// Find a pipeline with its ordered stages.
    ///
    /// Returns `None` if not found.
    async fn find_pipeline(&self, id: &PipelineId) -> Result<Option<Pipeline>, DomainError>;

    /// All known pipelines, active or not.
    async fn list_pipelines(&self) -> Result<Vec<Pipeline>, DomainError>;

    /// Checklist items of a stage, in checklist order.
    async fn checklist_items(&self, stage_id: &StageId) -> Result<Vec<ChecklistItem>, DomainError>;
}
