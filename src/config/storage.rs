//! Storage configuration

use serde::Deserialize;
use std::path::PathBuf;

/// File locations; unset means in-memory only
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StorageConfig {
    /// YAML rule document, created on first write
    pub rules_file: Option<PathBuf>,

    /// YAML pipeline catalog read at startup
    pub catalog_file: Option<PathBuf>,
}
