//! Lead entry repository port (write side).
//!
//! Persists `LeadPipelineEntry` aggregates with optimistic concurrency:
//! every update names the version it was read at.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, EntryId, LeadId, PipelineId};
use crate::domain::pipeline::{EnrollmentStatus, LeadPipelineEntry};

/// Repository port for entry persistence.
#[async_trait]
pub trait LeadEntryRepository: Send + Sync {
    /// Save a new entry.
    async fn insert(&self, entry: &LeadPipelineEntry) -> Result<(), DomainError>;

    /// Replace a stored entry.
    ///
    /// # Errors
    ///
    /// - `EntryNotFound` if the entry doesn't exist
    /// - `Conflict` if the stored version differs from `expected_version`
    async fn update(
        &self,
        entry: &LeadPipelineEntry,
        expected_version: u64,
    ) -> Result<(), DomainError>;

    /// Returns `None` if not found.
    async fn find_by_id(&self, id: &EntryId) -> Result<Option<LeadPipelineEntry>, DomainError>;

    /// The lead's Active entry in a pipeline, if any.
    async fn find_active(
        &self,
        lead_id: &LeadId,
        pipeline_id: &PipelineId,
    ) -> Result<Option<LeadPipelineEntry>, DomainError>;

    /// Entries of a pipeline, optionally filtered by status.
    async fn list_by_pipeline(
        &self,
        pipeline_id: &PipelineId,
        status: Option<EnrollmentStatus>,
    ) -> Result<Vec<LeadPipelineEntry>, DomainError>;

    /// Every Active entry across pipelines.
    async fn list_active(&self) -> Result<Vec<LeadPipelineEntry>, DomainError>;
}
