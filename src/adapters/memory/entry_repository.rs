//! In-memory lead entry repository with optimistic versioning.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, EntryId, ErrorCode, LeadId, PipelineId};
use crate::domain::pipeline::{EnrollmentStatus, LeadPipelineEntry};
use crate::ports::LeadEntryRepository;

#[derive(Debug, Clone, Default)]
pub struct InMemoryLeadEntryRepository {
    entries: Arc<RwLock<HashMap<EntryId, LeadPipelineEntry>>>,
}

impl InMemoryLeadEntryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }
}

fn not_found(id: &EntryId) -> DomainError {
    DomainError::new(ErrorCode::EntryNotFound, format!("Entry {} not found", id))
        .with_detail("entry_id", id.to_string())
}

fn already_enrolled(entry: &LeadPipelineEntry) -> DomainError {
    DomainError::new(
        ErrorCode::AlreadyEnrolled,
        format!(
            "Lead {} already has an active entry in pipeline {}",
            entry.lead_id(),
            entry.pipeline_id()
        ),
    )
    .with_detail("lead_id", entry.lead_id().to_string())
    .with_detail("pipeline_id", entry.pipeline_id().to_string())
}

/// True if another Active entry holds the same (lead, pipeline) slot.
fn slot_taken(entries: &HashMap<EntryId, LeadPipelineEntry>, entry: &LeadPipelineEntry) -> bool {
    entry.is_active()
        && entries.values().any(|other| {
            other.id() != entry.id()
                && other.is_active()
                && other.lead_id() == entry.lead_id()
                && other.pipeline_id() == entry.pipeline_id()
        })
}

#[async_trait]
impl LeadEntryRepository for InMemoryLeadEntryRepository {
    async fn insert(&self, entry: &LeadPipelineEntry) -> Result<(), DomainError> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(entry.id()) {
            return Err(DomainError::new(
                ErrorCode::InternalError,
                format!("Entry {} already exists", entry.id()),
            ));
        }
        if slot_taken(&entries, entry) {
            return Err(already_enrolled(entry));
        }
        entries.insert(*entry.id(), entry.clone());
        Ok(())
    }

    async fn update(
        &self,
        entry: &LeadPipelineEntry,
        expected_version: u64,
    ) -> Result<(), DomainError> {
        let mut entries = self.entries.write().await;
        let stored = entries.get(entry.id()).ok_or_else(|| not_found(entry.id()))?;
        if stored.version() != expected_version {
            return Err(DomainError::conflict(expected_version, stored.version()));
        }
        if slot_taken(&entries, entry) {
            return Err(already_enrolled(entry));
        }
        entries.insert(*entry.id(), entry.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &EntryId) -> Result<Option<LeadPipelineEntry>, DomainError> {
        Ok(self.entries.read().await.get(id).cloned())
    }

    async fn find_active(
        &self,
        lead_id: &LeadId,
        pipeline_id: &PipelineId,
    ) -> Result<Option<LeadPipelineEntry>, DomainError> {
        Ok(self
            .entries
            .read()
            .await
            .values()
            .find(|e| e.is_active() && e.lead_id() == lead_id && e.pipeline_id() == pipeline_id)
            .cloned())
    }

    async fn list_by_pipeline(
        &self,
        pipeline_id: &PipelineId,
        status: Option<EnrollmentStatus>,
    ) -> Result<Vec<LeadPipelineEntry>, DomainError> {
        let mut found: Vec<LeadPipelineEntry> = self
            .entries
            .read()
            .await
            .values()
            .filter(|e| e.pipeline_id() == pipeline_id)
            .filter(|e| status.map_or(true, |s| e.enrollment_status() == s))
            .cloned()
            .collect();
        found.sort_by_key(|e| *e.created_at());
        Ok(found)
    }

    async fn list_active(&self) -> Result<Vec<LeadPipelineEntry>, DomainError> {
        let mut found: Vec<LeadPipelineEntry> = self
            .entries
            .read()
            .await
            .values()
            .filter(|e| e.is_active())
            .cloned()
            .collect();
        found.sort_by_key(|e| *e.created_at());
        Ok(found)
    }
}
