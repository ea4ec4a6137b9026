//! File-backed storage adapters.
//!
//! - `YamlRuleFile` - Automation rules persisted as one YAML document
//! - `load_catalog` - Pipeline definitions read from YAML

mod yaml_catalog_file;
mod yaml_rule_file;

pub use yaml_catalog_file::{load_catalog, parse_catalog};
pub use yaml_rule_file::YamlRuleFile;
