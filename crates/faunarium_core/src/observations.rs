//! Per-step observation records and their growable flat storage.
//!
//! One fixed-width record per completed step, appended into a single
//! contiguous buffer owned by the agent. The buffer grows geometrically
//! with a fixed lower bound per grow and is never shrunk while the
//! simulation runs.

use crate::species::Species;
use chrono::{DateTime, Utc};
use faunarium_data::Position;
use std::sync::Arc;

/// Records to add per grow at minimum; keeps reallocation amortized
/// even while the doubling term is still small.
const GROWTH_CHUNK_RECORDS: usize = 1024;

/// Flat append-only storage of reduced (heading-free) records.
#[derive(Debug, Clone)]
pub struct ObservationBuffer {
    data: Vec<f32>,
    record_width: usize,
    /// Records addressable so far: `max written step + 1`.
    high_water: u64,
}

impl ObservationBuffer {
    /// Creates storage for records of `record_width` floats. A zero
    /// width (species whose only parameter is the heading) produces a
    /// buffer that stores nothing.
    #[must_use]
    pub fn new(record_width: usize) -> Self {
        Self {
            data: Vec::new(),
            record_width,
            high_water: 0,
        }
    }

    #[must_use]
    pub fn record_width(&self) -> usize {
        self.record_width
    }

    /// Floats currently allocated, written or not.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Records addressable through [`ObservationBuffer::record`].
    #[must_use]
    pub fn record_count(&self) -> u64 {
        self.high_water
    }

    /// Writes `values` as the record for `step`, growing first when the
    /// buffer is too small. `values` must be exactly one record wide.
    pub fn write_record(&mut self, step: u64, values: &[f32]) {
        debug_assert_eq!(values.len(), self.record_width);
        if self.record_width == 0 {
            self.high_water = self.high_water.max(step + 1);
            return;
        }
        let offset = step as usize * self.record_width;
        self.ensure_capacity(offset, values.len());
        self.data[offset..offset + values.len()].copy_from_slice(values);
        self.high_water = self.high_water.max(step + 1);
    }

    /// Stored record for `step`, `None` beyond what has been written.
    /// Steps skipped between writes read as zeroes.
    #[must_use]
    pub fn record(&self, step: u64) -> Option<&[f32]> {
        if step >= self.high_water || self.record_width == 0 {
            return None;
        }
        let offset = step as usize * self.record_width;
        self.data.get(offset..offset + self.record_width)
    }

    /// Grows to `offset + max(offset, record_width * 1024)`: doubling
    /// growth with a fixed lower bound. Existing data is preserved,
    /// new cells are zeroed.
    fn ensure_capacity(&mut self, offset: usize, len: usize) {
        if offset + len <= self.data.len() {
            return;
        }
        let chunk = self.record_width * GROWTH_CHUNK_RECORDS;
        let target = offset + offset.max(chunk).max(len);
        self.data.resize(target, 0.0);
    }
}

/// One step's observations reconstructed for a caller: the stored
/// record widened back to the full species layout, the heading cells
/// spliced in from the track.
#[derive(Debug, Clone)]
pub struct StepObservations {
    step: u64,
    date: DateTime<Utc>,
    location: Position,
    heading: f64,
    values: Vec<f32>,
    species: Arc<Species>,
}

impl StepObservations {
    pub(crate) fn new(
        step: u64,
        date: DateTime<Utc>,
        location: Position,
        heading: f64,
        values: Vec<f32>,
        species: Arc<Species>,
    ) -> Self {
        Self {
            step,
            date,
            location,
            heading,
            values,
            species,
        }
    }

    #[must_use]
    pub fn step(&self) -> u64 {
        self.step
    }

    /// Start of the step on the agent's timeline.
    #[must_use]
    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    /// Agent location during the step, read from the track.
    #[must_use]
    pub fn location(&self) -> Position {
        self.location
    }

    /// Agent heading during the step, read from the track.
    #[must_use]
    pub fn heading(&self) -> f64 {
        self.heading
    }

    /// Full-width record, heading cells included.
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    #[must_use]
    pub fn species(&self) -> &Arc<Species> {
        &self.species
    }

    /// Cells of one parameter, by its index in the species' ordered
    /// parameter list.
    #[must_use]
    pub fn parameter_values(&self, parameter: usize) -> Option<&[f32]> {
        let offsets = self.species.offsets();
        let start = *offsets.get(parameter)?;
        let end = *offsets.get(parameter + 1)?;
        self.values.get(start..end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_roundtrip() {
        let mut buffer = ObservationBuffer::new(3);
        buffer.write_record(0, &[1.0, 2.0, 3.0]);
        buffer.write_record(1, &[4.0, 5.0, 6.0]);

        assert_eq!(buffer.record(0), Some(&[1.0, 2.0, 3.0][..]));
        assert_eq!(buffer.record(1), Some(&[4.0, 5.0, 6.0][..]));
        assert_eq!(buffer.record(2), None);
        assert_eq!(buffer.record_count(), 2);
    }

    #[test]
    fn growth_preserves_earlier_records() {
        let width = 5;
        let mut buffer = ObservationBuffer::new(width);
        buffer.write_record(0, &[9.0; 5]);
        let first_capacity = buffer.capacity();

        // Jump far past the first allocation.
        let step = (first_capacity / width) as u64 + 7;
        buffer.write_record(step, &[2.0; 5]);

        assert!(buffer.capacity() >= (step as usize + 1) * width);
        assert_eq!(buffer.record(0), Some(&[9.0; 5][..]));
        assert_eq!(buffer.record(step), Some(&[2.0; 5][..]));
        // A skipped step reads as zeroes, not absence.
        assert_eq!(buffer.record(1), Some(&[0.0; 5][..]));
    }

    #[test]
    fn growth_is_chunked_below_the_doubling_point() {
        let width = 2;
        let mut buffer = ObservationBuffer::new(width);
        buffer.write_record(0, &[1.0, 1.0]);
        // First grow lands on the fixed chunk, not on `2 * offset`.
        assert_eq!(buffer.capacity(), width * GROWTH_CHUNK_RECORDS);

        // Within capacity: no grow.
        buffer.write_record(10, &[1.0, 1.0]);
        assert_eq!(buffer.capacity(), width * GROWTH_CHUNK_RECORDS);
    }

    #[test]
    fn growth_doubles_past_the_chunk() {
        let width = 1;
        let mut buffer = ObservationBuffer::new(width);
        let step = (GROWTH_CHUNK_RECORDS * 3) as u64;
        buffer.write_record(step, &[1.0]);
        // offset + max(offset, chunk) with offset > chunk.
        assert_eq!(buffer.capacity(), 2 * step as usize);
    }

    #[test]
    fn zero_width_buffer_stores_nothing() {
        let mut buffer = ObservationBuffer::new(0);
        buffer.write_record(4, &[]);
        assert_eq!(buffer.capacity(), 0);
        assert_eq!(buffer.record(4), None);
        assert_eq!(buffer.record_count(), 5);
    }
}
