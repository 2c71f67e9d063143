//! Chain timing configuration.

use std::time::Duration;

use crate::{clock::RotationClock, error::ConfigError};

/// Default rotation period (15 minutes).
pub const DEFAULT_ROTATION_PERIOD: Duration = Duration::from_secs(15 * 60);

/// Default disclosure window (14 days).
pub const DEFAULT_DISCLOSURE_WINDOW: Duration = Duration::from_secs(14 * 24 * 60 * 60);

/// Timing parameters for the seed chain.
///
/// Built once at startup and validated before any store is touched. The
/// scheduler and report handler read it but never mutate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainConfig {
    /// Time between identifier rotations.
    pub rotation_period: Duration,
    /// Look-back span whose identifiers are published after a report.
    pub disclosure_window: Duration,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rotation_period: DEFAULT_ROTATION_PERIOD,
            disclosure_window: DEFAULT_DISCLOSURE_WINDOW,
        }
    }
}

impl ChainConfig {
    /// Check every field against the others.
    ///
    /// # Errors
    ///
    /// - `ZeroPeriod` / `EmptyWindow`: a duration is zero
    /// - `SubMillisecond` / `Overflow`: a duration is not representable in
    ///   millisecond timestamps
    /// - `WindowNotMultiple`: the window would not split into whole rotations
    pub fn validate(&self) -> Result<(), ConfigError> {
        let clock = RotationClock::new(self.rotation_period)?;
        let period_ms = clock.period_millis();

        let window_ms = whole_millis("disclosure_window", self.disclosure_window)?;
        if window_ms == 0 {
            return Err(ConfigError::EmptyWindow);
        }
        if window_ms % period_ms != 0 {
            return Err(ConfigError::WindowNotMultiple { window_ms, period_ms });
        }

        Ok(())
    }

    /// Rotation clock for the configured period.
    ///
    /// # Errors
    ///
    /// Same as [`RotationClock::new`].
    pub fn clock(&self) -> Result<RotationClock, ConfigError> {
        RotationClock::new(self.rotation_period)
    }

    /// Number of rotations in one disclosure window, rounded up.
    ///
    /// A validated config divides exactly, so rounding only matters for
    /// configs that skipped [`validate`](Self::validate).
    pub fn records_per_window(&self) -> u64 {
        let period_ms = self.rotation_period.as_millis().max(1);
        self.disclosure_window.as_millis().div_ceil(period_ms) as u64
    }

    /// Disclosure window in milliseconds.
    pub fn window_millis(&self) -> u64 {
        self.disclosure_window.as_millis() as u64
    }
}

/// Convert `duration` to whole milliseconds, rejecting lossy conversions.
pub(crate) fn whole_millis(field: &'static str, duration: Duration) -> Result<u64, ConfigError> {
    if duration.subsec_nanos() % 1_000_000 != 0 {
        return Err(ConfigError::SubMillisecond { field });
    }
    u64::try_from(duration.as_millis()).map_err(|_| ConfigError::Overflow { field })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = ChainConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.records_per_window(), 1344);
    }

    #[test]
    fn rejects_zero_period() {
        let config = ChainConfig { rotation_period: Duration::ZERO, ..ChainConfig::default() };
        assert_eq!(config.validate(), Err(ConfigError::ZeroPeriod));
    }

    #[test]
    fn rejects_empty_window() {
        let config = ChainConfig { disclosure_window: Duration::ZERO, ..ChainConfig::default() };
        assert_eq!(config.validate(), Err(ConfigError::EmptyWindow));
    }

    #[test]
    fn rejects_window_not_multiple_of_period() {
        let config = ChainConfig {
            rotation_period: Duration::from_secs(7 * 60),
            disclosure_window: Duration::from_secs(60 * 60),
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::WindowNotMultiple { window_ms: 3_600_000, period_ms: 420_000 })
        );
    }

    #[test]
    fn rejects_sub_millisecond_window() {
        let config = ChainConfig {
            disclosure_window: DEFAULT_DISCLOSURE_WINDOW + Duration::from_nanos(1),
            ..ChainConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::SubMillisecond { field: "disclosure_window" })
        );
    }

    #[test]
    fn records_per_window_rounds_up() {
        let config = ChainConfig {
            rotation_period: Duration::from_secs(7 * 60),
            disclosure_window: Duration::from_secs(60 * 60),
        };
        assert_eq!(config.records_per_window(), 9);
    }
}
