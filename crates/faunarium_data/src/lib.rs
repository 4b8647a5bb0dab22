//! Plain value types shared across the Faunarium simulation crates.
//!
//! This crate carries no simulation logic: geometry primitives, display
//! colors and the identifier newtypes used by the ownership graph.

use serde::{Deserialize, Serialize};

pub mod geometry;
pub mod ids;

pub use geometry::{BoundingBox, Ellipse, OrientedEllipse, Position};
pub use ids::{AgentId, PopulationId};

/// RGB display color attached to a species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}
