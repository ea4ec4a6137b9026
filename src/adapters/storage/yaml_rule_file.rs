//! YAML file-backed automation rule repository.
//!
//! The whole collection lives in one document:
//!
//! ```yaml
//! rules:
//!   - id: 7c1f...
//!     name: Book discovery call
//!     trigger:
//!       type: stage_change
//!       conditions:
//!         to_stage: Qualified
//!     actions:
//!       - type: create_appointment
//!         offset_hours: 48
//!     enabled: true
//!     priority: 10
//!     created_at: 2024-01-15T10:30:00Z
//!     updated_at: 2024-01-15T10:30:00Z
//! ```
//!
//! Writes go to a sibling temp file that is renamed over the target, so
//! readers never observe a half-written collection.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;

use crate::domain::automation::AutomationRule;
use crate::domain::foundation::{DomainError, RuleId};
use crate::ports::AutomationRuleRepository;

#[derive(Debug, Default, Serialize, Deserialize)]
struct RuleFileDocument {
    #[serde(default)]
    rules: Vec<AutomationRule>,
}

/// Rule repository persisted as a single YAML document.
#[derive(Debug)]
pub struct YamlRuleFile {
    path: PathBuf,
    rules: RwLock<Vec<AutomationRule>>,
}

impl YamlRuleFile {
    /// Opens the rule file, starting empty when it does not exist yet.
    ///
    /// # Example
    /// ```ignore
    /// let rules = YamlRuleFile::open("./data/rules.yaml").await?;
    /// ```
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, DomainError> {
        let path = path.as_ref().to_path_buf();
        let rules = if fs::try_exists(&path)
            .await
            .map_err(|e| DomainError::storage(format!("{}: {}", path.display(), e)))?
        {
            let yaml = fs::read_to_string(&path)
                .await
                .map_err(|e| DomainError::storage(format!("{}: {}", path.display(), e)))?;
            let document: RuleFileDocument = serde_yaml::from_str(&yaml).map_err(|e| {
                DomainError::storage(format!("Invalid rule file {}: {}", path.display(), e))
            })?;
            document.rules
        } else {
            Vec::new()
        };

        tracing::debug!(path = %path.display(), count = rules.len(), "rule file opened");
        Ok(Self {
            path,
            rules: RwLock::new(rules),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn write_document(&self, rules: &[AutomationRule]) -> Result<(), DomainError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DomainError::storage(e.to_string()))?;
        }

        let yaml = serde_yaml::to_string(&RuleFileDocument {
            rules: rules.to_vec(),
        })
        .map_err(|e| DomainError::storage(format!("Failed to serialize rules: {}", e)))?;

        let temp = self.temp_path();
        fs::write(&temp, yaml)
            .await
            .map_err(|e| DomainError::storage(e.to_string()))?;
        fs::rename(&temp, &self.path)
            .await
            .map_err(|e| DomainError::storage(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl AutomationRuleRepository for YamlRuleFile {
    async fn load_all(&self) -> Result<Vec<AutomationRule>, DomainError> {
        Ok(self.rules.read().await.clone())
    }

    async fn find_by_id(&self, id: &RuleId) -> Result<Option<AutomationRule>, DomainError> {
        Ok(self.rules.read().await.iter().find(|r| &r.id == id).cloned())
    }

    async fn replace_all(&self, rules: Vec<AutomationRule>) -> Result<(), DomainError> {
        let mut current = self.rules.write().await;
        self.write_document(&rules).await?;
        *current = rules;
        Ok(())
    }
}
