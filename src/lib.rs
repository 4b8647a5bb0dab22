//! # Faunarium
//!
//! Discrete-time agent simulation: hierarchical clocks, environments
//! owning populations of moving agents, per-step environmental
//! observations and asynchronous change notification.
//!
//! The engine lives in `faunarium_core`, plain data types in
//! `faunarium_data` and the network-handle registry in `faunarium_io`.
//! This crate is the driver: configuration plus the loop that evoluates,
//! observes and advances.

/// Driver configuration (TOML + defaults)
pub mod config;
/// Simulation assembly and the run loop
pub mod driver;

pub use config::AppConfig;
pub use driver::Simulation;
pub use faunarium_core::{
    Agent, Environment, MasterClock, Population, SimClock, SimEvent, Species,
};
