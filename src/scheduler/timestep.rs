/*!
 * Fixed Timestep
 * Accumulator that turns variable frame time into fixed-size steps
 */

use crate::core::limits::DEFAULT_MAX_FIXED_STEPS_PER_FRAME;
use std::time::Duration;
use tracing::warn;

/// Absorbs float error so exact multiples of the interval do not round up
const STEP_EPSILON: f64 = 1e-9;

/// Fixed-update accumulator
///
/// Elapsed time is added every frame. Once a full interval has built up, the
/// step count is rounded up and the accumulator may go negative; the deficit
/// is paid back by later frames.
///
/// A frame never runs more than `max_steps` steps. When more are due the
/// backlog is dropped, and non-finite deltas are ignored.
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    interval: f64,
    accumulator: f64,
    max_steps: u32,
}

impl FixedTimestep {
    /// # Panics
    /// If `interval_secs` is not a positive finite number.
    pub fn new(interval_secs: f64) -> Self {
        assert!(
            interval_secs.is_finite() && interval_secs > 0.0,
            "fixed update interval must be positive, got {}",
            interval_secs
        );
        Self {
            interval: interval_secs,
            accumulator: 0.0,
            max_steps: DEFAULT_MAX_FIXED_STEPS_PER_FRAME,
        }
    }

    /// Cap on the steps one `advance` may return, at least 1
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn from_duration(interval: Duration) -> Self {
        Self::new(interval.as_secs_f64())
    }

    #[inline]
    pub fn interval(&self) -> f64 {
        self.interval
    }

    #[inline]
    pub fn accumulator(&self) -> f64 {
        self.accumulator
    }

    #[inline]
    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    /// Add `delta_seconds` and return how many fixed steps are now due
    pub fn advance(&mut self, delta_seconds: f64) -> u32 {
        if !delta_seconds.is_finite() {
            warn!(delta_seconds, "ignoring non-finite frame delta");
            return 0;
        }
        self.accumulator += delta_seconds.max(0.0);
        if self.accumulator < self.interval {
            return 0;
        }
        let steps = (self.accumulator / self.interval - STEP_EPSILON).ceil().max(1.0);
        if steps > f64::from(self.max_steps) {
            warn!(due = steps, max_steps = self.max_steps, "dropping fixed update backlog");
            self.accumulator = 0.0;
            return self.max_steps;
        }
        self.accumulator -= steps * self.interval;
        steps as u32
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}
