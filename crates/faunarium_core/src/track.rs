//! Track collaborator: per-agent position and heading history.
//!
//! The core only depends on the [`Track`] trait; [`PolyTrack`] is the
//! reference implementation backing the default movement behavior and
//! the tests.

use faunarium_data::{BoundingBox, Position};

/// Geometric path of one agent: a live pose plus one recorded sample
/// per completed step.
pub trait Track: Send {
    /// Heading during `step`, radians; the in-progress step reads the
    /// live pose. `None` beyond the current step.
    fn heading_at(&self, step: u64) -> Option<f64>;

    /// Location during `step`; the in-progress step reads the live
    /// pose. `None` beyond the current step.
    fn location_at(&self, step: u64) -> Option<Position>;

    /// Records the live pose as the just-completed step's sample.
    fn append_step(&mut self);

    /// Axis-aligned bounds of every recorded sample plus the live pose.
    fn bounding_box(&self) -> BoundingBox;

    /// Turns the live heading by `angle` radians.
    fn rotate(&mut self, angle: f64);

    /// Moves `distance` meters along the live heading.
    fn move_forward(&mut self, distance: f64);

    /// Turns toward `target` and moves at most `max_distance` toward
    /// it; the target need not be reached within one step.
    fn move_toward(&mut self, target: Position, max_distance: f64);

    fn current_location(&self) -> Position;

    fn current_heading(&self) -> f64;
}

/// Straight-segment track keeping the full per-step pose history.
#[derive(Debug, Clone)]
pub struct PolyTrack {
    location: Position,
    heading: f64,
    history: Vec<(Position, f64)>,
}

impl PolyTrack {
    #[must_use]
    pub fn new(start: Position, heading: f64) -> Self {
        Self {
            location: start,
            heading,
            history: Vec::new(),
        }
    }

    /// Number of completed steps recorded so far.
    #[must_use]
    pub fn recorded_steps(&self) -> usize {
        self.history.len()
    }
}

impl Track for PolyTrack {
    fn heading_at(&self, step: u64) -> Option<f64> {
        let step = step as usize;
        if step < self.history.len() {
            Some(self.history[step].1)
        } else if step == self.history.len() {
            Some(self.heading)
        } else {
            None
        }
    }

    fn location_at(&self, step: u64) -> Option<Position> {
        let step = step as usize;
        if step < self.history.len() {
            Some(self.history[step].0)
        } else if step == self.history.len() {
            Some(self.location)
        } else {
            None
        }
    }

    fn append_step(&mut self) {
        self.history.push((self.location, self.heading));
    }

    fn bounding_box(&self) -> BoundingBox {
        let mut bounds = BoundingBox::at(self.location);
        for (location, _) in &self.history {
            bounds.expand_to(*location);
        }
        bounds
    }

    fn rotate(&mut self, angle: f64) {
        self.heading = (self.heading + angle).rem_euclid(std::f64::consts::TAU);
    }

    fn move_forward(&mut self, distance: f64) {
        let (sin, cos) = self.heading.sin_cos();
        self.location.x += distance * cos;
        self.location.y += distance * sin;
    }

    fn move_toward(&mut self, target: Position, max_distance: f64) {
        let remaining = self.location.distance_to(target);
        if remaining == 0.0 {
            return;
        }
        self.heading = self.location.bearing_to(target);
        self.move_forward(remaining.min(max_distance));
    }

    fn current_location(&self) -> Position {
        self.location
    }

    fn current_heading(&self) -> f64 {
        self.heading
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_indexes_by_step() {
        let mut track = PolyTrack::new(Position::new(0.0, 0.0), 0.0);
        track.move_forward(10.0);
        track.append_step();
        track.rotate(std::f64::consts::FRAC_PI_2);
        track.move_forward(5.0);

        assert_eq!(track.location_at(0), Some(Position::new(10.0, 0.0)));
        let live = track.location_at(1).unwrap();
        assert!((live.x - 10.0).abs() < 1e-9);
        assert!((live.y - 5.0).abs() < 1e-9);
        assert_eq!(track.location_at(2), None);
        assert_eq!(track.heading_at(0), Some(0.0));
    }

    #[test]
    fn move_toward_is_bounded() {
        let mut track = PolyTrack::new(Position::default(), 0.0);
        let target = Position::new(0.0, 100.0);
        track.move_toward(target, 30.0);

        let here = track.current_location();
        assert!((here.y - 30.0).abs() < 1e-9);
        assert!(here.x.abs() < 1e-9);
        assert!((track.current_heading() - std::f64::consts::FRAC_PI_2).abs() < 1e-9);

        // A close target is reached exactly, not overshot.
        track.move_toward(target, 1000.0);
        assert!((track.current_location().y - 100.0).abs() < 1e-9);
    }

    #[test]
    fn bounding_box_covers_whole_path() {
        let mut track = PolyTrack::new(Position::default(), 0.0);
        track.move_forward(20.0);
        track.append_step();
        track.rotate(std::f64::consts::PI);
        track.move_forward(25.0);
        track.append_step();

        let bounds = track.bounding_box();
        assert!(bounds.contains(Position::new(0.0, 0.0)));
        assert!(bounds.contains(Position::new(20.0, 0.0)));
        assert!(bounds.contains(track.current_location()));
        assert!(bounds.width() >= 25.0 - 1e-9);
    }

    #[test]
    fn rotate_wraps_heading() {
        let mut track = PolyTrack::new(Position::default(), 0.0);
        track.rotate(3.0 * std::f64::consts::TAU + 1.0);
        assert!((track.current_heading() - 1.0).abs() < 1e-9);
        track.rotate(-2.0);
        assert!(track.current_heading() >= 0.0);
        assert!(track.current_heading() < std::f64::consts::TAU);
    }
}
