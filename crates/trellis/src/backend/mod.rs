//! Backend collaborators.
//!
//! The interfaces live in [`trellis_core::backend`] and are re-exported here
//! next to [`memory`], an in-memory implementation.

pub mod memory;

pub use trellis_core::backend::*;

pub use memory::{MemoryBackend, StagedWrite, TransactionState};
