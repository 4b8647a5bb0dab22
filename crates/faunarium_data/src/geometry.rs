//! Geometry primitives used by tracks, perception areas and spatial
//! bounds.

use serde::{Deserialize, Serialize};

/// A point in the flat world plane, meters from the world origin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn distance_to(&self, other: Position) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Bearing from this point toward `other`, radians, east = 0,
    /// counter-clockwise positive.
    #[must_use]
    pub fn bearing_to(&self, other: Position) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }
}

/// Axis-aligned rectangle, the unit of spatial-bounds accounting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// A degenerate box covering exactly one point.
    #[must_use]
    pub fn at(point: Position) -> Self {
        Self {
            min_x: point.x,
            min_y: point.y,
            max_x: point.x,
            max_y: point.y,
        }
    }

    #[must_use]
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn expand_to(&mut self, point: Position) {
        self.min_x = self.min_x.min(point.x);
        self.min_y = self.min_y.min(point.y);
        self.max_x = self.max_x.max(point.x);
        self.max_y = self.max_y.max(point.y);
    }

    #[must_use]
    pub fn contains(&self, point: Position) -> bool {
        point.x >= self.min_x
            && point.x <= self.max_x
            && point.y >= self.min_y
            && point.y <= self.max_y
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Axis-aligned ellipse template centered on the origin. Species carry
/// one as their perception-area shape; callers orient it per agent pose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ellipse {
    /// Semi-axis along the heading direction, meters.
    pub semi_major: f64,
    /// Semi-axis across the heading direction, meters.
    pub semi_minor: f64,
}

impl Ellipse {
    #[must_use]
    pub const fn new(semi_major: f64, semi_minor: f64) -> Self {
        Self {
            semi_major,
            semi_minor,
        }
    }

    /// Places the template at `center`, rotated to `heading` radians.
    #[must_use]
    pub fn oriented(&self, center: Position, heading: f64) -> OrientedEllipse {
        OrientedEllipse {
            center,
            heading,
            shape: *self,
        }
    }
}

/// An ellipse translated and rotated to one agent's pose: the region
/// environmental samples are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrientedEllipse {
    pub center: Position,
    pub heading: f64,
    pub shape: Ellipse,
}

impl OrientedEllipse {
    #[must_use]
    pub fn contains(&self, point: Position) -> bool {
        let dx = point.x - self.center.x;
        let dy = point.y - self.center.y;
        let (sin, cos) = self.heading.sin_cos();
        // Rotate into the ellipse frame.
        let u = dx * cos + dy * sin;
        let v = -dx * sin + dy * cos;
        let a = self.shape.semi_major;
        let b = self.shape.semi_minor;
        if a <= 0.0 || b <= 0.0 {
            return false;
        }
        (u / a).powi(2) + (v / b).powi(2) <= 1.0
    }

    /// Conservative axis-aligned bounds of the rotated ellipse.
    #[must_use]
    pub fn bounding_box(&self) -> BoundingBox {
        let (sin, cos) = self.heading.sin_cos();
        let a = self.shape.semi_major;
        let b = self.shape.semi_minor;
        let ex = ((a * cos).powi(2) + (b * sin).powi(2)).sqrt();
        let ey = ((a * sin).powi(2) + (b * cos).powi(2)).sqrt();
        BoundingBox {
            min_x: self.center.x - ex,
            min_y: self.center.y - ey,
            max_x: self.center.x + ex,
            max_y: self.center.y + ey,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_union_covers_both() {
        let a = BoundingBox::at(Position::new(0.0, 0.0));
        let b = BoundingBox::at(Position::new(3.0, -2.0));
        let u = a.union(&b);
        assert!(u.contains(Position::new(0.0, 0.0)));
        assert!(u.contains(Position::new(3.0, -2.0)));
        assert!(u.contains(Position::new(1.5, -1.0)));
        assert_eq!(u.width(), 3.0);
        assert_eq!(u.height(), 2.0);
    }

    #[test]
    fn oriented_ellipse_contains_respects_rotation() {
        let shape = Ellipse::new(10.0, 1.0);
        let east = shape.oriented(Position::default(), 0.0);
        assert!(east.contains(Position::new(9.0, 0.0)));
        assert!(!east.contains(Position::new(0.0, 9.0)));

        let north = shape.oriented(Position::default(), std::f64::consts::FRAC_PI_2);
        assert!(north.contains(Position::new(0.0, 9.0)));
        assert!(!north.contains(Position::new(9.0, 0.0)));
    }

    #[test]
    fn oriented_ellipse_bounds_cover_extremes() {
        let shape = Ellipse::new(4.0, 2.0);
        let area = shape.oriented(Position::new(1.0, 1.0), 0.3);
        let bounds = area.bounding_box();
        assert!(bounds.contains(area.center));
        assert!(bounds.width() >= 2.0 * shape.semi_minor);
        assert!(bounds.width() <= 2.0 * shape.semi_major + 1e-9);
    }

    #[test]
    fn bearing_points_at_target() {
        let origin = Position::default();
        let east = origin.bearing_to(Position::new(5.0, 0.0));
        assert!(east.abs() < 1e-12);
        let north = origin.bearing_to(Position::new(0.0, 5.0));
        assert!((north - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }
}
