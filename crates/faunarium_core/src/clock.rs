//! Hierarchical step clocks.
//!
//! A [`MasterClock`] owns the simulated date and the step counter; a
//! [`RelativeClock`] shares its master's advancement but shifts its
//! step-zero origin, giving each agent a private notion of age while the
//! whole environment stays lock-stepped. All clocks transitively derived
//! from one master advance together; only the master stores the date.

use crate::error::{Result, SimError};
use chrono::{DateTime, Duration, Timelike, Utc};
use faunarium_data::Position;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Common contract of master and relative clocks.
pub trait SimClock {
    /// Advances the whole clock hierarchy by one step. Relative clocks
    /// forward to their ultimate master.
    fn advance(&self);

    /// Completed steps since this clock's own step-zero origin.
    fn current_step(&self) -> u64;

    /// Fixed duration of one step.
    fn step_duration(&self) -> Duration;

    /// Date of this clock's step 0.
    fn origin(&self) -> DateTime<Utc>;

    /// Spawns a clock whose step 0 coincides with this clock's current
    /// step.
    fn spawn_relative(&self) -> RelativeClock;

    /// Date at which `step` begins on this clock's timeline.
    fn date_at(&self, step: u64) -> DateTime<Utc> {
        self.origin() + Duration::milliseconds(self.step_duration().num_milliseconds() * step as i64)
    }

    /// Step containing `date`, or `None` when `date` precedes this
    /// clock's step-zero origin or lies at/after the end of the current
    /// step. A relative clock's origin is later than its parent's, so a
    /// date valid for the parent can be out of range for the child.
    fn step_for_date(&self, date: DateTime<Utc>) -> Option<u64> {
        let origin = self.origin();
        if date < origin {
            return None;
        }
        let step_ms = self.step_duration().num_milliseconds();
        let step = ((date - origin).num_milliseconds() / step_ms) as u64;
        if step > self.current_step() {
            return None;
        }
        Some(step)
    }

    /// Strict variant of [`SimClock::step_for_date`].
    fn require_step_for_date(&self, date: DateTime<Utc>) -> Result<u64> {
        self.step_for_date(date)
            .ok_or(SimError::DateOutOfRange(date))
    }

    /// Elapsed simulated time on this clock: `current_step *
    /// step_duration`.
    fn age(&self) -> Duration {
        Duration::milliseconds(self.step_duration().num_milliseconds() * self.current_step() as i64)
    }
}

#[derive(Debug)]
struct MasterInner {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step_duration: Duration,
    step: AtomicU64,
    /// One identity relative clock per step interval; cleared by
    /// `advance()`.
    relative_cache: Mutex<Option<RelativeClock>>,
}

/// The clock that actually stores the date and drives advancement.
#[derive(Clone, Debug)]
pub struct MasterClock {
    inner: Arc<MasterInner>,
}

impl MasterClock {
    /// Creates a master clock covering `[start, end]` in steps of
    /// `step_duration`. Fails with `InvalidRange` when `end < start` or
    /// the step duration is not positive.
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step_duration: Duration,
    ) -> Result<Self> {
        if end < start {
            return Err(SimError::invalid_range(format!(
                "end time {end} precedes start time {start}"
            )));
        }
        if step_duration <= Duration::zero() {
            return Err(SimError::invalid_range(
                "step duration must be positive".to_string(),
            ));
        }
        Ok(Self {
            inner: Arc::new(MasterInner {
                start,
                end,
                step_duration,
                step: AtomicU64::new(0),
                relative_cache: Mutex::new(None),
            }),
        })
    }

    /// Start of the covered simulation window.
    #[must_use]
    pub fn start_time(&self) -> DateTime<Utc> {
        self.inner.start
    }

    /// End of the covered simulation window.
    #[must_use]
    pub fn end_time(&self) -> DateTime<Utc> {
        self.inner.end
    }

    /// Date of the current, in-progress step.
    #[must_use]
    pub fn current_date(&self) -> DateTime<Utc> {
        self.date_at(self.current_step())
    }

    /// Solar elevation at `position` for the current simulated date.
    #[must_use]
    pub fn solar_elevation(&self, ephemeris: &dyn SolarEphemeris, position: Position) -> f64 {
        ephemeris.solar_elevation(position, self.current_date())
    }

    /// Whether the sun is above the horizon at `position` right now.
    #[must_use]
    pub fn is_daylight_at(&self, ephemeris: &dyn SolarEphemeris, position: Position) -> bool {
        self.solar_elevation(ephemeris, position) > 0.0
    }

    /// Rebinds an age into this clock's time domain: the returned clock
    /// reads `age` completed steps right now and keeps advancing with
    /// this master. Used when a population moves between environments.
    pub(crate) fn rebased_relative(&self, age: u64) -> RelativeClock {
        RelativeClock {
            inner: Arc::new(RelativeInner {
                master: self.clone(),
                offset: self.current_step() as i64 - age as i64,
            }),
        }
    }
}

impl SimClock for MasterClock {
    fn advance(&self) {
        self.inner.step.fetch_add(1, Ordering::SeqCst);
        let mut cache = self
            .inner
            .relative_cache
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *cache = None;
    }

    fn current_step(&self) -> u64 {
        self.inner.step.load(Ordering::SeqCst)
    }

    fn step_duration(&self) -> Duration {
        self.inner.step_duration
    }

    fn origin(&self) -> DateTime<Utc> {
        self.inner.start
    }

    fn spawn_relative(&self) -> RelativeClock {
        let step = self.current_step();
        let mut cache = self
            .inner
            .relative_cache
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(cached) = cache.as_ref() {
            if cached.offset() == step as i64 {
                return cached.clone();
            }
        }
        let spawned = RelativeClock {
            inner: Arc::new(RelativeInner {
                master: self.clone(),
                offset: step as i64,
            }),
        };
        *cache = Some(spawned.clone());
        spawned
    }
}

#[derive(Debug)]
struct RelativeInner {
    master: MasterClock,
    /// Master step that is this clock's step 0. Negative offsets arise
    /// only from age-preserving rebasing across environments.
    offset: i64,
}

/// A clock derived from a master, sharing advancement with a shifted
/// step-zero origin. Cloning shares identity: clones spawned within one
/// master step compare equal.
#[derive(Clone, Debug)]
pub struct RelativeClock {
    inner: Arc<RelativeInner>,
}

impl RelativeClock {
    /// The master this clock ultimately delegates to.
    #[must_use]
    pub fn master(&self) -> &MasterClock {
        &self.inner.master
    }

    fn offset(&self) -> i64 {
        self.inner.offset
    }
}

impl PartialEq for RelativeClock {
    /// Identity comparison: true only for handles of the same spawned
    /// instance.
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl SimClock for RelativeClock {
    fn advance(&self) {
        self.inner.master.advance();
    }

    fn current_step(&self) -> u64 {
        let step = self.inner.master.current_step() as i64 - self.inner.offset;
        step.max(0) as u64
    }

    fn step_duration(&self) -> Duration {
        self.inner.master.step_duration()
    }

    fn origin(&self) -> DateTime<Utc> {
        self.inner.master.origin()
            + Duration::milliseconds(
                self.inner.master.step_duration().num_milliseconds() * self.inner.offset,
            )
    }

    fn spawn_relative(&self) -> RelativeClock {
        self.inner.master.spawn_relative()
    }
}

/// External astronomy collaborator: solar elevation in degrees at a
/// position and date. The core treats this as an opaque function.
pub trait SolarEphemeris: Send + Sync {
    fn solar_elevation(&self, position: Position, date: DateTime<Utc>) -> f64;
}

/// Sinusoidal day/night approximation: zero elevation at 06:00 and
/// 18:00 UTC, peak at noon. Good enough for drivers and tests.
#[derive(Debug, Clone, Copy)]
pub struct HarmonicEphemeris {
    pub peak_elevation: f64,
}

impl Default for HarmonicEphemeris {
    fn default() -> Self {
        Self {
            peak_elevation: 60.0,
        }
    }
}

impl SolarEphemeris for HarmonicEphemeris {
    fn solar_elevation(&self, _position: Position, date: DateTime<Utc>) -> f64 {
        let seconds = f64::from(date.num_seconds_from_midnight());
        let day_fraction = seconds / 86_400.0;
        self.peak_elevation
            * (2.0 * std::f64::consts::PI * day_fraction - std::f64::consts::FRAC_PI_2).sin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn master() -> MasterClock {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 3, 31, 0, 0, 0).unwrap();
        MasterClock::new(start, end, Duration::minutes(30)).unwrap()
    }

    #[test]
    fn rejects_inverted_range() {
        let start = Utc.with_ymd_and_hms(2026, 3, 31, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let err = MasterClock::new(start, end, Duration::minutes(30)).unwrap_err();
        assert!(matches!(err, SimError::InvalidRange(_)));

        let err = MasterClock::new(end, start, Duration::zero()).unwrap_err();
        assert!(matches!(err, SimError::InvalidRange(_)));
    }

    #[test]
    fn advance_moves_date() {
        let clock = master();
        assert_eq!(clock.current_step(), 0);
        clock.advance();
        clock.advance();
        assert_eq!(clock.current_step(), 2);
        assert_eq!(
            clock.current_date(),
            clock.start_time() + Duration::minutes(60)
        );
        assert_eq!(clock.age(), Duration::minutes(60));
    }

    #[test]
    fn step_for_date_window() {
        let clock = master();
        clock.advance();
        clock.advance();
        let start = clock.start_time();

        assert_eq!(clock.step_for_date(start), Some(0));
        assert_eq!(clock.step_for_date(start + Duration::minutes(29)), Some(0));
        assert_eq!(clock.step_for_date(start + Duration::minutes(30)), Some(1));
        // In-progress step is addressable, its end is not.
        assert_eq!(clock.step_for_date(start + Duration::minutes(60)), Some(2));
        assert_eq!(clock.step_for_date(start + Duration::minutes(90)), None);
        assert_eq!(clock.step_for_date(start - Duration::seconds(1)), None);

        let err = clock
            .require_step_for_date(start - Duration::seconds(1))
            .unwrap_err();
        assert!(matches!(err, SimError::DateOutOfRange(_)));
    }

    #[test]
    fn relative_clock_offsets_track_master() {
        let clock = master();
        clock.advance();
        clock.advance();
        clock.advance();

        let relative = clock.spawn_relative();
        assert_eq!(relative.current_step(), 0);
        assert_eq!(relative.origin(), clock.date_at(3));

        clock.advance();
        clock.advance();
        assert_eq!(relative.current_step(), 2);
        assert_eq!(clock.current_step(), 5);

        // Advancement forwards to the master.
        relative.advance();
        assert_eq!(clock.current_step(), 6);
        assert_eq!(relative.current_step(), 3);
    }

    #[test]
    fn relative_clock_rejects_parent_only_dates() {
        let clock = master();
        clock.advance();
        clock.advance();
        let relative = clock.spawn_relative();

        // Valid for the master, before the child's origin.
        let early = clock.start_time() + Duration::minutes(30);
        assert_eq!(clock.step_for_date(early), Some(1));
        assert_eq!(relative.step_for_date(early), None);

        clock.advance();
        assert_eq!(relative.step_for_date(clock.date_at(2)), Some(0));
        assert_eq!(relative.step_for_date(clock.date_at(3)), Some(1));
    }

    #[test]
    fn relative_cache_identity() {
        let clock = master();
        let a = clock.spawn_relative();
        let b = clock.spawn_relative();
        assert_eq!(a, b);

        clock.advance();
        let c = clock.spawn_relative();
        assert_ne!(a, c);
        assert_eq!(c.current_step(), 0);
        assert_eq!(c.origin(), clock.date_at(1));

        // Spawning through a relative clock forwards to the master and
        // therefore shares the same cached instance.
        let d = a.spawn_relative();
        assert_eq!(c, d);
    }

    #[test]
    fn rebased_clock_preserves_age() {
        let clock = master();
        for _ in 0..4 {
            clock.advance();
        }
        let rebased = clock.rebased_relative(7);
        assert_eq!(rebased.current_step(), 7);
        clock.advance();
        assert_eq!(rebased.current_step(), 8);
        // Origin lies before the master's start when age exceeds the
        // master step.
        assert!(rebased.origin() < clock.start_time());
    }

    #[test]
    fn harmonic_ephemeris_day_night() {
        let eph = HarmonicEphemeris::default();
        let here = Position::default();
        let noon = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let midnight = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        assert!(eph.solar_elevation(here, noon) > 59.0);
        assert!(eph.solar_elevation(here, midnight) < -59.0);

        let start = Utc.with_ymd_and_hms(2026, 3, 1, 11, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
        let clock = MasterClock::new(start, end, Duration::hours(1)).unwrap();
        clock.advance();
        assert!(clock.is_daylight_at(&eph, here));
    }
}
