//! # Faunarium IO
//!
//! The network-handle registry abstraction and the bounded-retry
//! teardown protocol used when a simulation shuts down.

/// Structured error types for registry operations
pub mod error;
/// Handle registry trait, in-memory impl and the teardown protocol
pub mod registry;

pub use error::{RegistryError, Result};
pub use registry::{
    retire_handle, retire_handle_with_delay, HandleId, HandleRegistry, InMemoryRegistry,
    TeardownMode, TeardownOutcome, FORCED_ATTEMPTS, GRACEFUL_ATTEMPTS, RETRY_DELAY,
};
