//! Clip configuration
//!
//! The values an envelope reads from its owning animation: cycle count,
//! cycle duration, rate and auto-reverse, plus the tick resolution used to
//! convert durations.
//!
//! ```ignore
//! let config = ClipConfig::looping(CycleDuration::from_millis(500))
//!     .with_auto_reverse(true)
//!     .with_rate(2.0);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ClipError, Result};
use crate::ticks::{CycleDuration, TickRate};

/// How many times a clip repeats
///
/// Serialized as an integer where `-1` means indefinite.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum CycleCount {
    Finite(u32),
    Indefinite,
}

impl CycleCount {
    pub fn is_indefinite(&self) -> bool {
        matches!(self, CycleCount::Indefinite)
    }

    /// True for counts that need no more than one cycle (0 or 1)
    pub fn is_single(&self) -> bool {
        matches!(self, CycleCount::Finite(n) if *n <= 1)
    }
}

impl Default for CycleCount {
    fn default() -> Self {
        CycleCount::Finite(1)
    }
}

impl TryFrom<i64> for CycleCount {
    type Error = ClipError;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            -1 => Ok(CycleCount::Indefinite),
            n if n >= 0 && n <= u32::MAX as i64 => Ok(CycleCount::Finite(n as u32)),
            n => Err(ClipError::InvalidCycleCount(n)),
        }
    }
}

impl From<CycleCount> for i64 {
    fn from(count: CycleCount) -> Self {
        match count {
            CycleCount::Finite(n) => n as i64,
            CycleCount::Indefinite => -1,
        }
    }
}

impl fmt::Display for CycleCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleCount::Finite(n) => write!(f, "{}", n),
            CycleCount::Indefinite => write!(f, "indefinite"),
        }
    }
}

/// Configuration of a single clip
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipConfig {
    /// Number of cycles to play
    pub cycle_count: CycleCount,
    /// Length of one cycle
    pub cycle_duration: CycleDuration,
    /// Playback speed; negative plays backwards. Never zero.
    pub rate: f64,
    /// Whether odd cycles play in the opposite direction
    pub auto_reverse: bool,
    /// Resolution used to convert the cycle duration into ticks
    pub tick_rate: TickRate,
}

impl Default for ClipConfig {
    fn default() -> Self {
        Self {
            cycle_count: CycleCount::default(),
            cycle_duration: CycleDuration::default(),
            rate: 1.0,
            auto_reverse: false,
            tick_rate: TickRate::default(),
        }
    }
}

impl ClipConfig {
    /// A clip that plays a single cycle
    pub fn once(cycle_duration: CycleDuration) -> Self {
        Self {
            cycle_duration,
            ..Self::default()
        }
    }

    /// A clip that loops forever
    pub fn looping(cycle_duration: CycleDuration) -> Self {
        Self {
            cycle_count: CycleCount::Indefinite,
            cycle_duration,
            ..Self::default()
        }
    }

    /// A clip that loops forever, alternating direction every cycle
    pub fn ping_pong(cycle_duration: CycleDuration) -> Self {
        Self {
            cycle_count: CycleCount::Indefinite,
            cycle_duration,
            auto_reverse: true,
            ..Self::default()
        }
    }

    /// Load a configuration from TOML
    ///
    /// ```toml
    /// cycle_count = 3
    /// cycle_duration = 250.0
    /// rate = -1.5
    /// auto_reverse = true
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: ClipConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde alone cannot express
    pub fn validate(&self) -> Result<()> {
        validate_rate(self.rate)
    }

    pub fn with_cycle_count(mut self, cycle_count: CycleCount) -> Self {
        self.cycle_count = cycle_count;
        self
    }

    pub fn with_cycle_duration(mut self, cycle_duration: CycleDuration) -> Self {
        self.cycle_duration = cycle_duration;
        self
    }

    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_auto_reverse(mut self, auto_reverse: bool) -> Self {
        self.auto_reverse = auto_reverse;
        self
    }

    pub fn with_tick_rate(mut self, tick_rate: TickRate) -> Self {
        self.tick_rate = tick_rate;
        self
    }

    /// Ticks in one cycle at the configured resolution
    pub fn cycle_ticks(&self) -> i64 {
        self.tick_rate.cycle_ticks(self.cycle_duration)
    }
}

pub(crate) fn validate_rate(rate: f64) -> Result<()> {
    if rate == 0.0 || !rate.is_finite() {
        return Err(ClipError::InvalidRate(rate));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_presets() {
        let once = ClipConfig::once(CycleDuration::from_millis(100));
        assert_eq!(once.cycle_count, CycleCount::Finite(1));
        assert!(!once.auto_reverse);

        let ping_pong = ClipConfig::ping_pong(CycleDuration::from_millis(100));
        assert!(ping_pong.cycle_count.is_indefinite());
        assert!(ping_pong.auto_reverse);
        assert_eq!(ping_pong.cycle_ticks(), 600);
    }

    #[test]
    fn test_cycle_count_conversion() {
        assert_eq!(CycleCount::try_from(-1).unwrap(), CycleCount::Indefinite);
        assert_eq!(CycleCount::try_from(4).unwrap(), CycleCount::Finite(4));
        assert!(matches!(
            CycleCount::try_from(-2),
            Err(ClipError::InvalidCycleCount(-2))
        ));
        assert!(CycleCount::Finite(0).is_single());
        assert!(!CycleCount::Indefinite.is_single());
    }

    #[test]
    fn test_from_toml() {
        let config = ClipConfig::from_toml_str(
            r#"
            cycle_count = 3
            cycle_duration = 250.0
            rate = -1.5
            auto_reverse = true
            tick_rate = 1000
            "#,
        )
        .unwrap();

        assert_eq!(config.cycle_count, CycleCount::Finite(3));
        assert_eq!(
            config.cycle_duration,
            CycleDuration::Finite(Duration::from_millis(250))
        );
        assert_eq!(config.rate, -1.5);
        assert!(config.auto_reverse);
        assert_eq!(config.cycle_ticks(), 250);
    }

    #[test]
    fn test_from_toml_defaults_and_indefinite() {
        let config = ClipConfig::from_toml_str(
            r#"
            cycle_count = -1
            cycle_duration = inf
            "#,
        )
        .unwrap();

        assert!(config.cycle_count.is_indefinite());
        assert!(config.cycle_duration.is_indefinite());
        assert_eq!(config.rate, 1.0);
        assert_eq!(config.tick_rate, TickRate::default());
    }

    #[test]
    fn test_from_toml_rejects_zero_rate() {
        let result = ClipConfig::from_toml_str("rate = 0.0");
        assert!(matches!(result, Err(ClipError::InvalidRate(_))));
    }

    #[test]
    fn test_from_toml_rejects_bad_count() {
        let result = ClipConfig::from_toml_str("cycle_count = -7");
        assert!(matches!(result, Err(ClipError::Parse(_))));
    }
}
