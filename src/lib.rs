//! Lead Pipeline - Progression & Automation Engine
//!
//! Tracks leads through ordered pipeline stages, classifies how long they
//! have sat in each stage, gates advancement on stage checklists, and runs
//! declarative trigger/action automation rules in response to stage
//! changes and elapsed time.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod logging;
pub mod ports;
