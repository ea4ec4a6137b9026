//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Storage Ports
//!
//! - `PipelineCatalog` - Read access to pipelines, stages and checklists
//! - `LeadEntryRepository` - Entry persistence with optimistic versions
//! - `AutomationRuleRepository` - Whole-collection rule persistence
//! - `ExecutionLedger` - Audit trail of rule executions
//!
//! ## Collaborator Ports
//!
//! - `LeadFieldWriter` - Lead field updates and assignment
//! - `AppointmentScheduler` - Appointment creation
//! - `NotificationSink` - Notification delivery
//!
//! ## Event Ports
//!
//! - `EventPublisher` - Port for publishing domain events
//! - `EventSubscriber` - Port for subscribing to domain events
//! - `EventHandler` - Handler that processes incoming events

mod appointment_scheduler;
mod automation_rule_repository;
mod event_publisher;
mod event_subscriber;
mod execution_ledger;
mod lead_entry_repository;
mod lead_field_writer;
mod notification_sink;
mod pipeline_catalog;

pub use appointment_scheduler::{AppointmentRequest, AppointmentScheduler};
pub use automation_rule_repository::AutomationRuleRepository;
pub use event_publisher::EventPublisher;
pub use event_subscriber::{EventBus, EventHandler, EventSubscriber};
pub use execution_ledger::ExecutionLedger;
pub use lead_entry_repository::LeadEntryRepository;
pub use lead_field_writer::LeadFieldWriter;
pub use notification_sink::{Notification, NotificationSink};
pub use pipeline_catalog::PipelineCatalog;
