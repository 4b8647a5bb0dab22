//! # Faunarium Core
//!
//! The discrete-time simulation engine for Faunarium - an agent movement
//! and observation simulator.
//!
//! This crate contains the deterministic simulation logic, including:
//! - Hierarchical step clocks (master and relative, offset-aware)
//! - Environment / population / agent ownership with a single
//!   per-environment lock
//! - Species record layouts and fixed-width observation storage
//! - Order-preserving asynchronous listener dispatch
//!
//! ## Architecture
//!
//! Each environment owns one mutex-guarded state plus one dispatch
//! worker. Public handles (`Environment`, `Population`, `Agent`) are
//! cheap clones that resolve into that state on every call, so a killed
//! member is observably dead from every handle at once. Every mutation
//! runs to completion under the lock before any listener sees it, and
//! listeners always observe changes in the order they happened.
//!
//! ## Example
//!
//! ```
//! use chrono::{Duration, TimeZone, Utc};
//! use faunarium_core::{Environment, MasterClock, SimClock};
//!
//! let clock = MasterClock::new(
//!     Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
//!     Utc.with_ymd_and_hms(2026, 3, 31, 0, 0, 0).unwrap(),
//!     Duration::minutes(30),
//! )
//! .unwrap();
//! let env = Environment::with_seed(clock, 42);
//! let population = env.create_population().unwrap();
//! env.advance_step().unwrap();
//! assert_eq!(env.current_step(), 1);
//! assert!(population.is_alive());
//! ```

/// Agent handles: movement, observation, migration and lifecycle
pub mod agent;
/// Master and relative step clocks plus the solar ephemeris seam
pub mod clock;
/// Coverage samplers supplying per-parameter observation values
pub mod coverage;
/// Shared-lock state and the order-preserving dispatch worker
pub mod dispatch;
/// Simulation error types
pub mod error;
/// Environment handles: clock ownership, population attachment, dispose
pub mod environment;
/// Change events and listener registries
pub mod events;
/// Tracing setup
pub mod logging;
/// Fixed-width observation records and growable storage
pub mod observations;
/// Population handles: spawning, movement steps, spatial bounds
pub mod population;
/// Species definitions and record layout derivation
pub mod species;
/// Track collaborator keeping per-agent pose history
pub mod track;

mod world;

pub use agent::Agent;
pub use clock::{HarmonicEphemeris, MasterClock, RelativeClock, SimClock, SolarEphemeris};
pub use coverage::{CoverageSampler, UniformSampler};
pub use environment::Environment;
pub use error::{Result, SimError};
pub use events::{EventKind, ListenerId, SimEvent};
pub use logging::{init_logging, init_logging_with};
pub use observations::StepObservations;
pub use population::Population;
pub use species::{Parameter, ParameterKind, Species, HEADING_WIDTH};
pub use track::{PolyTrack, Track};
