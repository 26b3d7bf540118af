//! Tick conversion
//!
//! Clip envelopes count time in integral ticks. A [`TickRate`] converts
//! wall-clock durations into ticks and back; the default resolution is
//! 6000 ticks per second.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ClipError;

/// Sentinel tick count for a cycle of indefinite duration
pub const INDEFINITE: i64 = i64::MAX;

/// Default number of ticks per second
pub const TICKS_PER_SECOND: u32 = 6000;

/// Resolution used to convert durations into ticks
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct TickRate {
    ticks_per_second: u32,
}

impl TickRate {
    /// Create a tick rate with the given resolution
    pub fn new(ticks_per_second: u32) -> Result<Self, ClipError> {
        if ticks_per_second == 0 {
            return Err(ClipError::InvalidTickRate(ticks_per_second));
        }
        Ok(Self { ticks_per_second })
    }

    pub fn ticks_per_second(&self) -> u32 {
        self.ticks_per_second
    }

    /// Convert a duration into ticks, rounding to the nearest tick
    pub fn from_duration(&self, duration: Duration) -> i64 {
        (duration.as_secs_f64() * self.ticks_per_second as f64).round() as i64
    }

    /// Convert ticks back into a duration (negative ticks map to zero)
    pub fn to_duration(&self, ticks: i64) -> Duration {
        if ticks <= 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(ticks as f64 / self.ticks_per_second as f64)
    }

    /// Ticks in one cycle of the given duration
    pub fn cycle_ticks(&self, duration: CycleDuration) -> i64 {
        match duration {
            CycleDuration::Finite(d) => self.from_duration(d),
            CycleDuration::Indefinite => INDEFINITE,
        }
    }
}

impl Default for TickRate {
    fn default() -> Self {
        Self {
            ticks_per_second: TICKS_PER_SECOND,
        }
    }
}

impl TryFrom<u32> for TickRate {
    type Error = ClipError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TickRate> for u32 {
    fn from(rate: TickRate) -> Self {
        rate.ticks_per_second
    }
}

/// Length of one animation cycle
///
/// Serialized as milliseconds; an infinite value (`inf` in TOML) stands for
/// an indefinite cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub enum CycleDuration {
    Finite(Duration),
    Indefinite,
}

impl CycleDuration {
    pub fn from_millis(ms: u64) -> Self {
        CycleDuration::Finite(Duration::from_millis(ms))
    }

    pub fn is_indefinite(&self) -> bool {
        matches!(self, CycleDuration::Indefinite)
    }
}

impl Default for CycleDuration {
    fn default() -> Self {
        CycleDuration::Finite(Duration::ZERO)
    }
}

impl From<Duration> for CycleDuration {
    fn from(duration: Duration) -> Self {
        CycleDuration::Finite(duration)
    }
}

impl TryFrom<f64> for CycleDuration {
    type Error = ClipError;

    fn try_from(ms: f64) -> Result<Self, Self::Error> {
        if ms == f64::INFINITY {
            return Ok(CycleDuration::Indefinite);
        }
        if !ms.is_finite() || ms < 0.0 {
            return Err(ClipError::InvalidCycleDuration(ms));
        }
        Ok(CycleDuration::Finite(Duration::from_secs_f64(ms / 1000.0)))
    }
}

impl From<CycleDuration> for f64 {
    fn from(duration: CycleDuration) -> Self {
        match duration {
            CycleDuration::Finite(d) => d.as_secs_f64() * 1000.0,
            CycleDuration::Indefinite => f64::INFINITY,
        }
    }
}

impl fmt::Display for CycleDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleDuration::Finite(d) => write!(f, "{}ms", d.as_millis()),
            CycleDuration::Indefinite => write!(f, "indefinite"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_resolution() {
        let rate = TickRate::default();
        assert_eq!(rate.from_duration(Duration::from_secs(1)), 6000);
        assert_eq!(rate.from_duration(Duration::from_millis(250)), 1500);
        assert_eq!(rate.to_duration(3000), Duration::from_millis(500));
    }

    #[test]
    fn test_from_duration_rounds() {
        let rate = TickRate::new(1000).unwrap();
        // 1.4ms and 1.6ms both land on a whole tick
        assert_eq!(rate.from_duration(Duration::from_micros(1400)), 1);
        assert_eq!(rate.from_duration(Duration::from_micros(1600)), 2);
    }

    #[test]
    fn test_zero_tick_rate_rejected() {
        assert!(matches!(
            TickRate::new(0),
            Err(ClipError::InvalidTickRate(0))
        ));
    }

    #[test]
    fn test_indefinite_cycle_ticks() {
        let rate = TickRate::default();
        assert_eq!(rate.cycle_ticks(CycleDuration::Indefinite), INDEFINITE);
        assert_eq!(rate.cycle_ticks(CycleDuration::from_millis(100)), 600);
    }

    #[test]
    fn test_cycle_duration_from_millis_value() {
        assert_eq!(
            CycleDuration::try_from(f64::INFINITY).unwrap(),
            CycleDuration::Indefinite
        );
        assert_eq!(
            CycleDuration::try_from(500.0).unwrap(),
            CycleDuration::from_millis(500)
        );
        assert!(CycleDuration::try_from(-1.0).is_err());
        assert!(CycleDuration::try_from(f64::NAN).is_err());
    }
}
