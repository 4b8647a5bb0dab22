//! Error types for the simulation core.
//!
//! Everything here is surfaced synchronously to the caller; the only
//! failures the core swallows by design are listener panics during
//! dispatch, which are logged and must never stall the clock.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Main error type for simulation-core operations.
#[derive(Error, Debug)]
pub enum SimError {
    /// Operation attempted on an agent whose population reference is
    /// gone. Always a caller error, never retried.
    #[error("agent is dead")]
    DeadAgent,

    /// Operation attempted on a population that was killed or whose
    /// environment no longer exists.
    #[error("population is dead")]
    DeadPopulation,

    /// Operation attempted on an environment after `dispose()`.
    #[error("environment has been disposed")]
    Disposed,

    /// Metamorphosis into a species with a different parameter layout.
    #[error("incompatible species layout: {0}")]
    IncompatibleSpecies(String),

    /// A clock was constructed with an end time before its start time,
    /// or a non-positive step duration.
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// A species or parameter definition that cannot produce a valid
    /// record layout.
    #[error("invalid species definition: {0}")]
    InvalidSpecies(String),

    /// A requested date falls outside a clock's valid step window.
    #[error("date {0} is outside the clock's step window")]
    DateOutOfRange(DateTime<Utc>),

    /// Agent migration targeted a population owned by a different
    /// environment; move the population instead.
    #[error("target population belongs to a different environment")]
    CrossEnvironment,
}

/// Result type alias for simulation-core operations.
pub type Result<T> = std::result::Result<T, SimError>;

impl SimError {
    /// Creates a new invalid-range error.
    #[must_use]
    pub fn invalid_range<S: Into<String>>(msg: S) -> Self {
        Self::InvalidRange(msg.into())
    }

    /// Creates a new incompatible-species error.
    #[must_use]
    pub fn incompatible_species<S: Into<String>>(msg: S) -> Self {
        Self::IncompatibleSpecies(msg.into())
    }

    /// Creates a new invalid-species error.
    #[must_use]
    pub fn invalid_species<S: Into<String>>(msg: S) -> Self {
        Self::InvalidSpecies(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SimError::invalid_range("end precedes start");
        assert_eq!(err.to_string(), "invalid range: end precedes start");
        assert_eq!(SimError::DeadAgent.to_string(), "agent is dead");
    }
}
