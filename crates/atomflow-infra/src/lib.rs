//! State store implementations for Atomflow.
//!
//! Implements the `StateStore` port defined in atomflow-core:
//! - `memory` -- concurrent in-memory store with guarded transitions
//! - `logbook` -- serializable flow/atom detail records persisted as JSON

pub mod logbook;
pub mod memory;

pub use logbook::{AtomDetail, FlowDetail, LogbookError};
pub use memory::MemoryStateStore;
