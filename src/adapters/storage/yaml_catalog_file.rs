//! Loads pipeline definitions from a YAML document into the in-memory
//! catalog.
//!
//! ```yaml
//! pipelines:
//!   - name: Sales
//!     stages:
//!       - name: New
//!         order_index: 1
//!       - name: Qualified
//!         order_index: 2
//!         sla_days: 10
//!         exit_criteria: Budget and timeline confirmed
//!         checklist:
//!           - title: Discovery call held
//! ```
//!
//! Ids are optional; omitted ids are generated on load.

use serde::Deserialize;
use std::path::Path;
use tokio::fs;

use crate::adapters::memory::InMemoryPipelineCatalog;
use crate::domain::foundation::{ChecklistItemId, DomainError, PipelineId, StageId};
use crate::domain::pipeline::{AppointmentTemplate, ChecklistItem, Pipeline, PipelineStage};

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    pipelines: Vec<PipelineDoc>,
}

#[derive(Debug, Deserialize)]
struct PipelineDoc {
    #[serde(default)]
    id: PipelineId,
    name: String,
    #[serde(default = "default_active")]
    active: bool,
    #[serde(default)]
    stages: Vec<StageDoc>,
}

#[derive(Debug, Deserialize)]
struct StageDoc {
    #[serde(default)]
    id: StageId,
    name: String,
    order_index: i32,
    #[serde(default)]
    sla_days: Option<u32>,
    #[serde(default)]
    exit_criteria: Option<String>,
    #[serde(default)]
    appointment_template: Option<AppointmentTemplate>,
    #[serde(default)]
    checklist: Vec<ChecklistDoc>,
}

#[derive(Debug, Deserialize)]
struct ChecklistDoc {
    #[serde(default)]
    id: ChecklistItemId,
    title: String,
    #[serde(default = "default_required")]
    required: bool,
}

fn default_active() -> bool {
    true
}

fn default_required() -> bool {
    true
}

/// Parses a catalog document.
pub async fn parse_catalog(yaml: &str) -> Result<InMemoryPipelineCatalog, DomainError> {
    let document: CatalogDocument = serde_yaml::from_str(yaml)
        .map_err(|e| DomainError::storage(format!("Invalid catalog: {}", e)))?;

    let catalog = InMemoryPipelineCatalog::new();
    for doc in document.pipelines {
        let mut stages = Vec::with_capacity(doc.stages.len());
        let mut items = Vec::new();
        for stage_doc in doc.stages {
            for (position, item) in stage_doc.checklist.into_iter().enumerate() {
                items.push(ChecklistItem {
                    id: item.id,
                    stage_id: stage_doc.id,
                    title: item.title,
                    order_index: position as i32,
                    required: item.required,
                });
            }
            stages.push(PipelineStage {
                id: stage_doc.id,
                pipeline_id: doc.id,
                name: stage_doc.name,
                order_index: stage_doc.order_index,
                sla_days: stage_doc.sla_days,
                exit_criteria: stage_doc.exit_criteria,
                appointment_template: stage_doc.appointment_template,
            });
        }

        let mut pipeline = Pipeline::new(doc.id, doc.name, stages)?;
        if !doc.active {
            pipeline = pipeline.deactivated();
        }
        catalog.add_pipeline(pipeline).await;
        for item in items {
            catalog.add_checklist_item(item).await;
        }
    }
    Ok(catalog)
}

/// Reads and parses a catalog file.
pub async fn load_catalog<P: AsRef<Path>>(path: P) -> Result<InMemoryPipelineCatalog, DomainError> {
    let path = path.as_ref();
    let yaml = fs::read_to_string(path)
        .await
        .map_err(|e| DomainError::storage(format!("{}: {}", path.display(), e)))?;
    let catalog = parse_catalog(&yaml).await?;
    tracing::info!(
        path = %path.display(),
        pipelines = catalog.pipeline_count().await,
        "pipeline catalog loaded"
    );
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ErrorCode;
    use crate::ports::PipelineCatalog;
    use tempfile::TempDir;

    const CATALOG: &str = r#"
pipelines:
  - id: 3f2b8a70-1c1e-4b43-9d7a-5a3c2b1d0e9f
    name: Sales
    stages:
      - name: Qualified
        order_index: 2
        sla_days: 10
        exit_criteria: Budget confirmed
        checklist:
          - title: Discovery call held
          - title: Send brochure
            required: false
      - name: New
        order_index: 1
"#;

    #[tokio::test]
    async fn parses_stages_in_order_with_checklists() {
        let catalog = parse_catalog(CATALOG).await.unwrap();
        let id: PipelineId = "3f2b8a70-1c1e-4b43-9d7a-5a3c2b1d0e9f".parse().unwrap();

        let pipeline = catalog.find_pipeline(&id).await.unwrap().unwrap();
        let names: Vec<&str> = pipeline.stages().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["New", "Qualified"]);

        let qualified = &pipeline.stages()[1];
        assert_eq!(qualified.effective_sla_days(), 10);
        let items = catalog.checklist_items(&qualified.id).await.unwrap();
        assert_eq!(items.len(), 2);
        assert!(items[0].required);
        assert!(!items[1].required);
    }

    #[tokio::test]
    async fn duplicate_order_index_is_rejected() {
        let yaml = r#"
pipelines:
  - name: Broken
    stages:
      - { name: A, order_index: 1 }
      - { name: B, order_index: 1 }
"#;
        assert!(parse_catalog(yaml).await.is_err());
    }

    #[tokio::test]
    async fn out_of_range_appointment_template_is_rejected() {
        let yaml = r#"
pipelines:
  - name: Sales
    stages:
      - name: New
        order_index: 1
        appointment_template:
          title: Intro call
          offset_hours: 9223372036854775807
"#;
        let err = parse_catalog(yaml).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert_eq!(err.details.get("field").map(String::as_str), Some("offset_hours"));
    }

    #[tokio::test]
    async fn load_reads_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.yaml");
        std::fs::write(&path, CATALOG).unwrap();

        let catalog = load_catalog(&path).await.unwrap();

        assert_eq!(catalog.pipeline_count().await, 1);
    }
}
