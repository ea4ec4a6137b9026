//! In-memory adapters for every storage and collaborator port.

mod collaborators;
mod entry_repository;
mod execution_ledger;
mod pipeline_catalog;
mod rule_repository;

pub use collaborators::{InMemoryAppointmentBook, InMemoryLeadFields, InMemoryNotificationSink};
pub use entry_repository::InMemoryLeadEntryRepository;
pub use execution_ledger::InMemoryExecutionLedger;
pub use pipeline_catalog::InMemoryPipelineCatalog;
pub use rule_repository::InMemoryAutomationRuleRepository;
