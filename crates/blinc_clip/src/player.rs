//! Clip player
//!
//! Owns an envelope and drives it from a pulse clock. The player decides
//! when the envelope runs (play, pause, stop) and rebases pulse ticks so the
//! envelope always sees ticks elapsed since its last start.
//!
//! ```ignore
//! let mut player = ClipPlayer::new(ClipConfig::ping_pong(CycleDuration::from_millis(400)), target)?;
//! player.play(clock.now_ticks());
//!
//! // every frame
//! player.pulse(clock.now_ticks());
//! ```

use std::time::Duration;

use crate::config::{ClipConfig, CycleCount};
use crate::envelope::{ClipEnvelope, Reconfigured};
use crate::error::Result;
use crate::target::ClipTarget;
use crate::ticks::CycleDuration;

/// Playback status of a clip
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Status {
    #[default]
    Stopped,
    Paused,
    Running,
}

/// Drives one [`ClipEnvelope`] from an external pulse clock
pub struct ClipPlayer<T: ClipTarget> {
    envelope: ClipEnvelope<T>,
    status: Status,
    /// Pulse tick of the last play or resume
    start_tick: i64,
    /// Rewind to the start of the direction of play on the next play
    rewind: bool,
}

impl<T: ClipTarget> ClipPlayer<T> {
    pub fn new(config: ClipConfig, target: T) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            envelope: ClipEnvelope::create(config, target),
            status: Status::Stopped,
            start_tick: 0,
            rewind: true,
        })
    }

    /// Create a player from a TOML clip configuration
    pub fn from_toml_str(source: &str, target: T) -> Result<Self> {
        Self::new(ClipConfig::from_toml_str(source)?, target)
    }

    pub fn envelope(&self) -> &ClipEnvelope<T> {
        &self.envelope
    }

    pub fn target(&self) -> &T {
        self.envelope.target()
    }

    pub fn target_mut(&mut self) -> &mut T {
        self.envelope.target_mut()
    }

    pub fn into_target(self) -> T {
        self.envelope.into_target()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == Status::Running
    }

    /// Start or resume playback at pulse tick `now`
    pub fn play(&mut self, now: i64) {
        match self.status {
            Status::Running => return,
            Status::Stopped => {
                if !self.envelope.was_synched() {
                    tracing::debug!("ClipPlayer: play ignored, clip has no cycle length");
                    return;
                }
                if self.rewind {
                    self.rewind_for_direction();
                }
            }
            Status::Paused => {}
        }

        self.envelope.start();
        self.start_tick = now;
        self.rewind = false;
        self.set_status(Status::Running);
    }

    pub fn pause(&mut self) {
        if self.status == Status::Running {
            self.set_status(Status::Paused);
        }
    }

    /// Stop playback and reset the play head
    pub fn stop(&mut self) {
        if self.status == Status::Stopped {
            return;
        }
        self.envelope.stop();
        self.rewind = true;
        self.set_status(Status::Stopped);
    }

    /// Feed the pulse clock; no-op unless running
    pub fn pulse(&mut self, now: i64) {
        if self.status != Status::Running {
            return;
        }

        self.envelope.time_pulse(now - self.start_tick);

        if self.envelope.has_reached_end() {
            // Keep the play head at the end so current_time() reports it
            self.rewind = true;
            self.set_status(Status::Stopped);
        }
    }

    /// Seek to an absolute timeline position in ticks
    pub fn jump_to(&mut self, ticks: i64) {
        self.envelope.jump_to(ticks);
        self.rewind = false;
    }

    pub fn jump_to_duration(&mut self, time: Duration) {
        let ticks = self.envelope.config().tick_rate.from_duration(time);
        self.jump_to(ticks);
    }

    /// Position of the play head on the clip's timeline
    pub fn current_time(&self) -> Duration {
        self.envelope
            .config()
            .tick_rate
            .to_duration(self.envelope.position())
    }

    /// The rate the clip is actually moving at; zero unless running
    pub fn current_rate(&self) -> f64 {
        if self.status == Status::Running {
            self.envelope.calculate_current_running_rate()
        } else {
            0.0
        }
    }

    pub fn set_rate(&mut self, rate: f64) -> Result<()> {
        self.envelope.set_rate(rate)
    }

    pub fn set_auto_reverse(&mut self, auto_reverse: bool) {
        self.envelope.set_auto_reverse(auto_reverse);
    }

    pub fn set_cycle_count(&mut self, cycle_count: CycleCount) -> Reconfigured {
        self.envelope.set_cycle_count(cycle_count)
    }

    pub fn set_cycle_duration(&mut self, cycle_duration: CycleDuration) -> Reconfigured {
        self.envelope.set_cycle_duration(cycle_duration)
    }

    fn rewind_for_direction(&mut self) {
        if self.envelope.rate() > 0.0 {
            self.envelope.jump_to(0);
        } else if let Some(total) = self.envelope.total_ticks() {
            self.envelope.jump_to(total);
        }
    }

    fn set_status(&mut self, status: Status) {
        if self.status != status {
            tracing::debug!("ClipPlayer: {:?} -> {:?}", self.status, status);
            self.status = status;
        }
    }
}
