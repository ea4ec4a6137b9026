//! Adapters - Implementations of port interfaces.
//!
//! - `events` - In-process event bus
//! - `memory` - In-memory repositories and collaborators
//! - `storage` - YAML file persistence for rules and pipeline definitions

pub mod events;
pub mod memory;
pub mod storage;

pub use events::InMemoryEventBus;
pub use memory::{
    InMemoryAppointmentBook, InMemoryAutomationRuleRepository, InMemoryExecutionLedger,
    InMemoryLeadEntryRepository, InMemoryLeadFields, InMemoryNotificationSink,
    InMemoryPipelineCatalog,
};
pub use storage::{load_catalog, parse_catalog, YamlRuleFile};
