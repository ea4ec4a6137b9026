//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors, events)
//! - `pipeline` - Pipelines, stages, checklists and the lead entry aggregate
//! - `automation` - Trigger/action rules, evaluation and execution records

pub mod automation;
pub mod foundation;
pub mod pipeline;
