//! Error types for faunarium_io registry operations.

use thiserror::Error;

/// Errors a handle registry can return from register/deregister calls.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The handle is not (or no longer) registered. Deregistration
    /// treats this as success.
    #[error("handle already deregistered: {0}")]
    AlreadyDeregistered(String),

    /// The registry could not be reached; worth retrying.
    #[error("registry unavailable: {0}")]
    Unavailable(String),

    /// The registry refused the operation; worth retrying, possibly
    /// forced.
    #[error("registry rejected the operation: {0}")]
    Rejected(String),
}

/// Result type alias for faunarium_io operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
