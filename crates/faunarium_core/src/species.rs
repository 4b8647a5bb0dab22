//! Immutable species definitions and their fixed-width record layout.
//!
//! A species is an ordered list of parameters plus a derived offset
//! table: `offsets[i+1] = offsets[i] + parameters[i].sample_width()`.
//! The designated heading parameter is special: its data lives in the
//! agent's track, never in the observation buffer, so the layout also
//! exposes a reduced width excluding it.

use crate::coverage::CoverageSampler;
use crate::error::{Result, SimError};
use faunarium_data::{Color, Ellipse, OrientedEllipse, Position};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Width of the heading parameter's record cells: heading plus ground
/// speed, both reconstructed from the track.
pub const HEADING_WIDTH: usize = 2;

/// What a parameter's record cells hold and where they come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    /// Sampled from the environment through a coverage sampler and
    /// stored in the observation buffer.
    Observed,
    /// Reconstructed from the track on read; never stored.
    Heading,
}

/// One column group of a species' record layout.
#[derive(Clone)]
pub struct Parameter {
    name: String,
    width: usize,
    kind: ParameterKind,
    sampler: Option<Arc<dyn CoverageSampler>>,
}

impl Parameter {
    /// An observed parameter of width 1 (`[value]`) or 3
    /// (`[value, x, y]`), sampled by `sampler`.
    pub fn observed<S: Into<String>>(
        name: S,
        width: usize,
        sampler: Arc<dyn CoverageSampler>,
    ) -> Result<Self> {
        if width != 1 && width != 3 {
            return Err(SimError::invalid_species(format!(
                "observed parameter width must be 1 or 3, got {width}"
            )));
        }
        Ok(Self {
            name: name.into(),
            width,
            kind: ParameterKind::Observed,
            sampler: Some(sampler),
        })
    }

    /// The heading parameter, fixed at [`HEADING_WIDTH`] cells.
    pub fn heading<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            width: HEADING_WIDTH,
            kind: ParameterKind::Heading,
            sampler: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn sample_width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn kind(&self) -> ParameterKind {
        self.kind
    }

    #[must_use]
    pub fn is_heading(&self) -> bool {
        self.kind == ParameterKind::Heading
    }

    #[must_use]
    pub fn sampler(&self) -> Option<&Arc<dyn CoverageSampler>> {
        self.sampler.as_ref()
    }
}

impl PartialEq for Parameter {
    /// Structural equality: name, width and kind. Sampler identity does
    /// not participate, so two species sampling the same layout from
    /// different fields stay layout-compatible.
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.width == other.width && self.kind == other.kind
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("width", &self.width)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Immutable species definition shared by every agent of that species.
pub struct Species {
    names: BTreeMap<String, String>,
    color: Color,
    parameters: Vec<Parameter>,
    offsets: Vec<usize>,
    record_width: usize,
    reduced_record_width: usize,
    heading_index: Option<usize>,
    /// Per-parameter offset within the reduced (stored) record; `None`
    /// for the heading parameter.
    stored_offsets: Vec<Option<usize>>,
    perception: Ellipse,
    max_speed: f64,
}

impl Species {
    /// Builds a species and derives its record layout. At most one
    /// heading parameter is allowed.
    pub fn new(
        names: BTreeMap<String, String>,
        color: Color,
        parameters: Vec<Parameter>,
        perception: Ellipse,
        max_speed: f64,
    ) -> Result<Self> {
        let mut offsets = Vec::with_capacity(parameters.len() + 1);
        let mut stored_offsets = Vec::with_capacity(parameters.len());
        let mut heading_index = None;
        let mut total = 0usize;
        let mut stored = 0usize;

        offsets.push(0);
        for (index, parameter) in parameters.iter().enumerate() {
            if parameter.is_heading() {
                if heading_index.is_some() {
                    return Err(SimError::invalid_species(format!(
                        "species declares more than one heading parameter ({})",
                        parameter.name()
                    )));
                }
                heading_index = Some(index);
                stored_offsets.push(None);
            } else {
                stored_offsets.push(Some(stored));
                stored += parameter.sample_width();
            }
            total += parameter.sample_width();
            offsets.push(total);
        }

        Ok(Self {
            names,
            color,
            parameters,
            offsets,
            record_width: total,
            reduced_record_width: stored,
            heading_index,
            stored_offsets,
            perception,
            max_speed,
        })
    }

    /// Display name for `locale`, falling back to any registered name.
    #[must_use]
    pub fn name(&self, locale: &str) -> Option<&str> {
        self.names
            .get(locale)
            .or_else(|| self.names.values().next())
            .map(String::as_str)
    }

    #[must_use]
    pub fn color(&self) -> Color {
        self.color
    }

    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Cumulative offsets; length is `parameters().len() + 1`.
    #[must_use]
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Full record width including the heading parameter's cells.
    #[must_use]
    pub fn record_width(&self) -> usize {
        self.record_width
    }

    /// Stored record width: the heading parameter's cells excluded.
    #[must_use]
    pub fn reduced_record_width(&self) -> usize {
        self.reduced_record_width
    }

    /// Index of the heading parameter, if the species declares one.
    #[must_use]
    pub fn heading_index(&self) -> Option<usize> {
        self.heading_index
    }

    /// Offset of `parameter` within the stored record, `None` for the
    /// heading parameter.
    #[must_use]
    pub fn stored_offset(&self, parameter: usize) -> Option<usize> {
        self.stored_offsets.get(parameter).copied().flatten()
    }

    /// Perception-area template callers orient per agent pose.
    #[must_use]
    pub fn perception_template(&self) -> Ellipse {
        self.perception
    }

    /// The perception area oriented to one agent pose.
    #[must_use]
    pub fn perception_at(&self, position: Position, heading: f64) -> OrientedEllipse {
        self.perception.oriented(position, heading)
    }

    /// Sustainable speed in meters per second, bounding one step's
    /// forward motion.
    #[must_use]
    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    /// Whether agents of this species can metamorphose into `other`:
    /// the ordered parameter lists must be equal by value.
    #[must_use]
    pub fn layout_compatible(&self, other: &Species) -> bool {
        self.parameters == other.parameters
    }
}

impl PartialEq for Species {
    /// Structural equality over locale names, color and parameter list.
    fn eq(&self, other: &Self) -> bool {
        self.names == other.names && self.color == other.color && self.parameters == other.parameters
    }
}

impl fmt::Debug for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Species")
            .field("names", &self.names)
            .field("color", &self.color)
            .field("parameters", &self.parameters)
            .field("record_width", &self.record_width)
            .field("reduced_record_width", &self.reduced_record_width)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::UniformSampler;

    fn names(tag: &str) -> BTreeMap<String, String> {
        BTreeMap::from([("en".to_string(), tag.to_string())])
    }

    fn sampler(width: usize) -> Arc<dyn CoverageSampler> {
        Arc::new(UniformSampler::new(1.0, width))
    }

    fn three_parameter_species() -> Species {
        Species::new(
            names("grey mule"),
            Color::new(90, 90, 120),
            vec![
                Parameter::observed("depth", 3, sampler(3)).unwrap(),
                Parameter::heading("heading"),
                Parameter::observed("temperature", 1, sampler(1)).unwrap(),
            ],
            Ellipse::new(50.0, 20.0),
            4.0,
        )
        .unwrap()
    }

    #[test]
    fn offsets_and_reduced_width() {
        let species = three_parameter_species();
        assert_eq!(species.offsets(), &[0, 3, 5, 6]);
        assert_eq!(species.record_width(), 6);
        assert_eq!(species.reduced_record_width(), 5);
        assert_eq!(species.heading_index(), Some(1));
        assert_eq!(species.stored_offset(0), Some(0));
        assert_eq!(species.stored_offset(1), None);
        assert_eq!(species.stored_offset(2), Some(3));
    }

    #[test]
    fn rejects_bad_definitions() {
        let err = Parameter::observed("depth", 2, sampler(1)).unwrap_err();
        assert!(matches!(err, SimError::InvalidSpecies(_)));

        let err = Species::new(
            names("twins"),
            Color::new(0, 0, 0),
            vec![Parameter::heading("a"), Parameter::heading("b")],
            Ellipse::new(1.0, 1.0),
            1.0,
        )
        .unwrap_err();
        assert!(matches!(err, SimError::InvalidSpecies(_)));
    }

    #[test]
    fn structural_equality_ignores_samplers() {
        let a = three_parameter_species();
        let mut b = three_parameter_species();
        assert_eq!(a, b);
        assert!(a.layout_compatible(&b));

        b = Species::new(
            names("grey mule"),
            Color::new(90, 90, 120),
            vec![
                Parameter::observed("depth", 3, sampler(3)).unwrap(),
                Parameter::heading("heading"),
            ],
            Ellipse::new(50.0, 20.0),
            4.0,
        )
        .unwrap();
        assert_ne!(a, b);
        assert!(!a.layout_compatible(&b));
    }

    #[test]
    fn locale_lookup_with_fallback() {
        let species = three_parameter_species();
        assert_eq!(species.name("en"), Some("grey mule"));
        assert_eq!(species.name("fr"), Some("grey mule"));
    }
}
