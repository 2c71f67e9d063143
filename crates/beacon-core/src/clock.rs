//! Rotation boundary arithmetic.
//!
//! Boundaries are multiples of the rotation period counted from the Unix
//! epoch, so every device rotates at the same instants regardless of when it
//! started.

use std::time::Duration;

use crate::error::ConfigError;

/// Time source parameterized by the rotation period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationClock {
    period_ms: u64,
}

impl RotationClock {
    /// Create a clock for `period`.
    ///
    /// # Errors
    ///
    /// - `ZeroPeriod`: period rounds to zero milliseconds
    /// - `SubMillisecond`: period is not a whole number of milliseconds
    pub fn new(period: Duration) -> Result<Self, ConfigError> {
        let period_ms = crate::config::whole_millis("rotation_period", period)?;
        if period_ms == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        Ok(Self { period_ms })
    }

    /// Rotation period.
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    /// Rotation period in milliseconds.
    pub fn period_millis(&self) -> u64 {
        self.period_ms
    }

    /// Most recent boundary at or before `now_ms`.
    pub fn align_previous_boundary(&self, now_ms: u64) -> u64 {
        now_ms - now_ms % self.period_ms
    }

    /// Time until the next boundary strictly after `now_ms`.
    ///
    /// Computed as `period - (now mod period)`, so a call made exactly on a
    /// boundary waits a full period.
    pub fn delay_to_next_boundary(&self, now_ms: u64) -> Duration {
        Duration::from_millis(self.period_ms - now_ms % self.period_ms)
    }

    /// Whether `timestamp_ms` falls on a boundary.
    pub fn is_aligned(&self, timestamp_ms: u64) -> bool {
        timestamp_ms % self.period_ms == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIFTEEN_MINUTES: u64 = 15 * 60 * 1000;

    fn clock() -> RotationClock {
        RotationClock::new(Duration::from_millis(FIFTEEN_MINUTES)).unwrap()
    }

    #[test]
    fn rejects_zero_period() {
        assert_eq!(RotationClock::new(Duration::ZERO), Err(ConfigError::ZeroPeriod));
    }

    #[test]
    fn rejects_sub_millisecond_period() {
        let result = RotationClock::new(Duration::from_micros(1500));
        assert!(matches!(result, Err(ConfigError::SubMillisecond { .. })));
    }

    #[test]
    fn align_rounds_down() {
        let clock = clock();
        assert_eq!(clock.align_previous_boundary(FIFTEEN_MINUTES * 4 + 1), FIFTEEN_MINUTES * 4);
        assert_eq!(clock.align_previous_boundary(FIFTEEN_MINUTES * 5 - 1), FIFTEEN_MINUTES * 4);
    }

    #[test]
    fn align_is_identity_on_boundary() {
        let clock = clock();
        assert_eq!(clock.align_previous_boundary(FIFTEEN_MINUTES * 7), FIFTEEN_MINUTES * 7);
        assert!(clock.is_aligned(FIFTEEN_MINUTES * 7));
        assert!(!clock.is_aligned(FIFTEEN_MINUTES * 7 + 3));
    }

    #[test]
    fn delay_lands_on_next_boundary() {
        let clock = clock();
        let now = FIFTEEN_MINUTES * 10 + 123_456;
        let fire_at = now + clock.delay_to_next_boundary(now).as_millis() as u64;

        assert_eq!(fire_at, FIFTEEN_MINUTES * 11);
    }

    #[test]
    fn delay_on_boundary_is_full_period() {
        let clock = clock();
        assert_eq!(
            clock.delay_to_next_boundary(FIFTEEN_MINUTES * 3),
            Duration::from_millis(FIFTEEN_MINUTES)
        );
    }
}
