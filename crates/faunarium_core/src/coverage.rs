//! Environmental coverage sampling, one sampler per observed parameter.
//!
//! The core only consumes this interface; real deployments plug in
//! whatever evaluates their environmental fields at a coordinate.

use faunarium_data::{AgentId, OrientedEllipse, Position};

/// Samples one environmental parameter around an agent.
///
/// Implementations return exactly the parameter's sample width worth of
/// floats: either `[value]` or `[value, x, y]` where `x`/`y` locate the
/// point inside the perception area the value was drawn from.
pub trait CoverageSampler: Send + Sync {
    fn sample(
        &self,
        agent: AgentId,
        position: Position,
        perception_area: &OrientedEllipse,
    ) -> Vec<f32>;
}

/// Constant-field sampler for drivers and tests: the value is the same
/// everywhere; width-3 parameters echo the agent position as the sample
/// point.
#[derive(Debug, Clone, Copy)]
pub struct UniformSampler {
    pub value: f32,
    pub width: usize,
}

impl UniformSampler {
    #[must_use]
    pub const fn new(value: f32, width: usize) -> Self {
        Self { value, width }
    }
}

impl CoverageSampler for UniformSampler {
    fn sample(
        &self,
        _agent: AgentId,
        position: Position,
        _perception_area: &OrientedEllipse,
    ) -> Vec<f32> {
        match self.width {
            3 => vec![self.value, position.x as f32, position.y as f32],
            _ => vec![self.value; self.width],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faunarium_data::Ellipse;

    #[test]
    fn uniform_sampler_matches_width() {
        let area = Ellipse::new(5.0, 2.0).oriented(Position::new(3.0, 4.0), 0.0);
        let agent = AgentId::new();

        let narrow = UniformSampler::new(7.5, 1);
        assert_eq!(narrow.sample(agent, area.center, &area), vec![7.5]);

        let wide = UniformSampler::new(7.5, 3);
        assert_eq!(
            wide.sample(agent, area.center, &area),
            vec![7.5, 3.0, 4.0]
        );
    }
}
