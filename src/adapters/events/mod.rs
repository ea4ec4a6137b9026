//! Event bus adapters.
//!
//! - `InMemoryEventBus` - Synchronous, in-process bus used by the binary
//!   and in tests

mod in_memory;

pub use in_memory::InMemoryEventBus;
