//! Clip envelopes
//!
//! An envelope handles the loop part of a clip: it turns the pulse ticks
//! elapsed since the clip was started into a play-head position, keeps
//! track of cycles and direction, and tells its [`ClipTarget`] where to
//! move. Interpolating values is the target's business.
//!
//! Three loop policies exist, chosen from the clip configuration:
//!
//! - [`SingleLoopEnvelope`]: one cycle, or a cycle of indefinite duration
//! - [`FiniteLoopEnvelope`]: a known number of cycles greater than one
//! - [`InfiniteLoopEnvelope`]: cycles repeat forever
//!
//! The policy sits behind the stable [`ClipEnvelope`] handle. When a
//! reconfiguration invalidates it (a single clip gets a cycle count of 5,
//! say) the handle swaps in the right policy and carries the elapsed state
//! across; the setter reports this through [`Reconfigured`].

mod finite;
mod infinite;
mod single;

pub use finite::FiniteLoopEnvelope;
pub use infinite::InfiniteLoopEnvelope;
pub use single::SingleLoopEnvelope;

use crate::config::{validate_rate, ClipConfig, CycleCount};
use crate::error::Result;
use crate::target::{ClipTarget, PulseContext, PulseRequest};
use crate::ticks::CycleDuration;

/// Which loop policy backs an envelope
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    SingleLoop,
    FiniteLoop,
    InfiniteLoop,
}

impl EnvelopeKind {
    /// The policy a clip with this configuration needs
    pub fn for_config(config: &ClipConfig) -> Self {
        match config.cycle_count {
            count if count.is_single() || config.cycle_duration.is_indefinite() => {
                EnvelopeKind::SingleLoop
            }
            CycleCount::Indefinite => EnvelopeKind::InfiniteLoop,
            CycleCount::Finite(_) => EnvelopeKind::FiniteLoop,
        }
    }
}

/// Whether a pulse is running, and whether it was told to stop early
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PulseState {
    #[default]
    Idle,
    InPulse,
    AbortRequested,
}

/// Outcome of a reconfiguration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reconfigured {
    /// The active policy absorbed the change
    InPlace,
    /// The policy no longer applied and was replaced
    Replaced {
        from: EnvelopeKind,
        to: EnvelopeKind,
    },
}

impl Reconfigured {
    pub fn is_replaced(&self) -> bool {
        matches!(self, Reconfigured::Replaced { .. })
    }
}

/// State shared by every loop policy
#[derive(Clone, Debug)]
pub(crate) struct EnvelopeCore {
    /// Nominal rate, never zero
    pub(crate) rate: f64,
    /// Ticks per cycle; 0 until synched, `INDEFINITE` for endless cycles
    pub(crate) cycle_ticks: i64,
    /// Play head, in the policy's own coordinates
    pub(crate) ticks: i64,
    /// Play head offset at the last start, seek or rate change
    pub(crate) delta_ticks: i64,
    /// Completed cycles (infinite loops only)
    pub(crate) current_cycle: u64,
    pub(crate) pulse: PulseState,
}

impl EnvelopeCore {
    fn new(config: &ClipConfig) -> Self {
        Self {
            rate: config.rate,
            cycle_ticks: config.cycle_ticks(),
            ticks: 0,
            delta_ticks: 0,
            current_cycle: 0,
            pulse: PulseState::Idle,
        }
    }

    pub(crate) fn forward(&self) -> bool {
        self.rate > 0.0
    }

    /// Pulse ticks covered since the last rebase, scaled by `ratio`
    pub(crate) fn rescaled_elapsed(&self, ratio: f64) -> i64 {
        ((self.ticks - self.delta_ticks) as f64 * ratio).round() as i64
    }

    /// Elapsed ticks re-expressed at `new_rate`
    pub(crate) fn ticks_rate_change(&self, new_rate: f64) -> i64 {
        self.rescaled_elapsed(new_rate / self.rate)
    }

    /// Move the play head without breaking the tick stream
    pub(crate) fn shift_ticks(&mut self, ticks: i64) {
        self.delta_ticks = self.delta_ticks.saturating_add(ticks - self.ticks);
        self.ticks = ticks;
    }

    fn begin_pulse(&mut self) {
        self.pulse = PulseState::InPulse;
    }

    fn end_pulse(&mut self) {
        self.pulse = PulseState::Idle;
    }

    pub(crate) fn is_aborted(&self) -> bool {
        self.pulse == PulseState::AbortRequested
    }

    pub(crate) fn abort_current_pulse(&mut self) {
        if self.pulse == PulseState::InPulse {
            tracing::trace!("ClipEnvelope: aborting pulse at tick {}", self.ticks);
            self.pulse = PulseState::AbortRequested;
        }
    }
}

/// Pulse ticks scaled by a rate
pub(crate) fn pulse_ticks(tick: i64, rate: f64) -> i64 {
    (tick as f64 * rate).round() as i64
}

/// Ticks into the cycle for a travelled distance; a completed cycle reports
/// its end rather than the start of the next one
pub(crate) fn wrap_ticks(travel: i64, cycle_ticks: i64) -> i64 {
    if cycle_ticks <= 0 || travel <= 0 {
        return 0;
    }
    match travel % cycle_ticks {
        0 => cycle_ticks,
        within => within,
    }
}

/// The queries and in-place updates a loop policy answers
pub(crate) trait LoopPolicy {
    fn kind(&self) -> EnvelopeKind;

    /// Whether `ticks - delta_ticks` tracks the signed rate (single loop)
    /// rather than its magnitude (travelled distance)
    fn signed_rate(&self) -> bool {
        false
    }

    fn set_auto_reverse(&mut self, auto_reverse: bool);

    /// Apply a new cycle length; false if this policy no longer applies
    fn update_cycle_ticks(&mut self, core: &mut EnvelopeCore, cycle_ticks: i64) -> bool;

    /// Apply a new cycle count; false if this policy no longer applies
    fn update_cycle_count(&mut self, core: &mut EnvelopeCore, cycle_count: CycleCount) -> bool;

    fn cycle_num(&self, core: &EnvelopeCore) -> u64;

    fn current_cycle(&self, core: &EnvelopeCore) -> u64;

    fn calculate_current_running_rate(&self, core: &EnvelopeCore) -> f64;

    fn was_synched(&self, core: &EnvelopeCore) -> bool {
        core.cycle_ticks != 0
    }

    fn has_reached_end(&self, core: &EnvelopeCore) -> bool;

    fn calculate_new_ticks(&self, core: &EnvelopeCore, new_dest: i64) -> i64;

    /// Length of the whole clip in ticks, if it ends
    fn total_ticks(&self, core: &EnvelopeCore) -> Option<i64>;

    /// Absolute timeline position of the play head
    fn position(&self, core: &EnvelopeCore) -> i64;

    /// Put the play head at an absolute timeline position, silently
    fn place_at(&self, core: &mut EnvelopeCore, position: i64);
}

/// The pulse-driven half of a loop policy
pub(crate) trait LoopDriver<T: ClipTarget>: LoopPolicy {
    fn set_rate(&mut self, core: &mut EnvelopeCore, target: &mut T, rate: f64);

    fn time_pulse(&mut self, core: &mut EnvelopeCore, target: &mut T, current_tick: i64);

    fn jump_to(&mut self, core: &mut EnvelopeCore, target: &mut T, ticks: i64);

    /// Call `play_to` and apply whatever the target asked for meanwhile
    fn play_to(&mut self, core: &mut EnvelopeCore, target: &mut T, ticks: i64) {
        let mut pulse = PulseContext::new();
        target.play_to(ticks, core.cycle_ticks, &mut pulse);

        for request in pulse.into_requests() {
            match request {
                PulseRequest::JumpTo(position) => self.jump_to(core, target, position),
                PulseRequest::SetRate(rate) => match validate_rate(rate) {
                    Ok(()) => self.set_rate(core, target, rate),
                    Err(e) => tracing::warn!("ClipEnvelope: ignoring rate request: {}", e),
                },
                PulseRequest::Abort => core.abort_current_pulse(),
            }
        }
    }
}

#[derive(Clone, Debug)]
enum Variant {
    Single(SingleLoopEnvelope),
    Finite(FiniteLoopEnvelope),
    Infinite(InfiniteLoopEnvelope),
}

impl Variant {
    fn create(config: &ClipConfig) -> Self {
        match (EnvelopeKind::for_config(config), config.cycle_count) {
            (EnvelopeKind::SingleLoop, count) => Variant::Single(SingleLoopEnvelope::new(count)),
            (EnvelopeKind::FiniteLoop, CycleCount::Finite(n)) => Variant::Finite(
                FiniteLoopEnvelope::new(n, config.auto_reverse, config.cycle_ticks()),
            ),
            _ => Variant::Infinite(InfiniteLoopEnvelope::new(config.auto_reverse)),
        }
    }

    fn policy(&self) -> &dyn LoopPolicy {
        match self {
            Variant::Single(v) => v,
            Variant::Finite(v) => v,
            Variant::Infinite(v) => v,
        }
    }

    fn policy_mut(&mut self) -> &mut dyn LoopPolicy {
        match self {
            Variant::Single(v) => v,
            Variant::Finite(v) => v,
            Variant::Infinite(v) => v,
        }
    }

    fn driver<T: ClipTarget>(&mut self) -> &mut dyn LoopDriver<T> {
        match self {
            Variant::Single(v) => v,
            Variant::Finite(v) => v,
            Variant::Infinite(v) => v,
        }
    }
}

/// Stable handle over the loop policy of one clip
///
/// The envelope owns its [`ClipTarget`]; everything it computes is pushed
/// there.
///
/// # Example
///
/// ```ignore
/// use blinc_clip::{ClipConfig, ClipEnvelope, CycleCount, CycleDuration};
///
/// let config = ClipConfig::once(CycleDuration::from_millis(1000));
/// let mut envelope = ClipEnvelope::create(config, my_target);
/// envelope.start();
/// envelope.time_pulse(3000); // half a second at 6000 ticks/s
///
/// // Becomes a finite loop; elapsed progress is kept
/// let outcome = envelope.set_cycle_count(CycleCount::Finite(5));
/// assert!(outcome.is_replaced());
/// ```
pub struct ClipEnvelope<T: ClipTarget> {
    config: ClipConfig,
    core: EnvelopeCore,
    variant: Variant,
    target: T,
}

impl<T: ClipTarget> ClipEnvelope<T> {
    /// Create an envelope with the policy the configuration calls for
    pub fn create(config: ClipConfig, target: T) -> Self {
        Self {
            core: EnvelopeCore::new(&config),
            variant: Variant::create(&config),
            config,
            target,
        }
    }

    pub fn kind(&self) -> EnvelopeKind {
        self.variant.policy().kind()
    }

    /// Current configuration (the rate reflects any rate change)
    pub fn config(&self) -> ClipConfig {
        ClipConfig {
            rate: self.core.rate,
            ..self.config
        }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    pub fn into_target(self) -> T {
        self.target
    }

    pub fn rate(&self) -> f64 {
        self.core.rate
    }

    pub fn cycle_ticks(&self) -> i64 {
        self.core.cycle_ticks
    }

    /// Play head in the active policy's coordinates
    pub fn ticks(&self) -> i64 {
        self.core.ticks
    }

    pub fn delta_ticks(&self) -> i64 {
        self.core.delta_ticks
    }

    pub fn pulse_state(&self) -> PulseState {
        self.core.pulse
    }

    pub fn is_in_pulse(&self) -> bool {
        self.core.pulse != PulseState::Idle
    }

    /// Cycles completed in the direction of travel
    pub fn current_cycle(&self) -> u64 {
        self.variant.policy().current_cycle(&self.core)
    }

    /// 0-based index of the cycle under the play head
    pub fn cycle_num(&self) -> u64 {
        self.variant.policy().cycle_num(&self.core)
    }

    /// Absolute timeline position of the play head, in ticks
    pub fn position(&self) -> i64 {
        self.variant.policy().position(&self.core)
    }

    /// Length of all cycles together; `None` when the clip never ends
    pub fn total_ticks(&self) -> Option<i64> {
        self.variant.policy().total_ticks(&self.core)
    }

    /// The rate in effect at the play head: `+rate` or `-rate`
    ///
    /// Without auto-reverse this is always `+rate`. With auto-reverse, even
    /// cycles run at `+rate` and odd cycles at `-rate`.
    pub fn calculate_current_running_rate(&self) -> f64 {
        self.variant
            .policy()
            .calculate_current_running_rate(&self.core)
    }

    /// True once a non-zero cycle length has been configured
    pub fn was_synched(&self) -> bool {
        self.variant.policy().was_synched(&self.core)
    }

    /// True when the play head sits on the terminal boundary for its direction
    pub fn has_reached_end(&self) -> bool {
        self.variant.policy().has_reached_end(&self.core)
    }

    /// Map `delta_ticks + candidate` into the active cycle
    ///
    /// The single loop clamps to `[0, cycle_ticks]`. Multi-cycle loops take
    /// the travelled distance modulo the cycle length, reporting a completed
    /// cycle as `cycle_ticks`; counting the wraps is left to `time_pulse`.
    pub fn calculate_new_ticks(&self, candidate: i64) -> i64 {
        self.variant
            .policy()
            .calculate_new_ticks(&self.core, candidate)
    }

    /// Change the nominal rate, keeping the play head where it is
    pub fn set_rate(&mut self, rate: f64) -> Result<()> {
        validate_rate(rate)?;
        let Self {
            core,
            variant,
            target,
            ..
        } = self;
        variant.driver::<T>().set_rate(core, target, rate);
        self.config.rate = rate;
        Ok(())
    }

    pub fn set_auto_reverse(&mut self, auto_reverse: bool) {
        self.config.auto_reverse = auto_reverse;
        self.variant.policy_mut().set_auto_reverse(auto_reverse);
    }

    /// Change the cycle length; may swap the loop policy
    pub fn set_cycle_duration(&mut self, cycle_duration: CycleDuration) -> Reconfigured {
        self.config.cycle_duration = cycle_duration;
        let cycle_ticks = self.config.cycle_ticks();
        if self
            .variant
            .policy_mut()
            .update_cycle_ticks(&mut self.core, cycle_ticks)
        {
            Reconfigured::InPlace
        } else {
            self.reclassify()
        }
    }

    /// Change the cycle count; may swap the loop policy
    pub fn set_cycle_count(&mut self, cycle_count: CycleCount) -> Reconfigured {
        self.config.cycle_count = cycle_count;
        if self
            .variant
            .policy_mut()
            .update_cycle_count(&mut self.core, cycle_count)
        {
            Reconfigured::InPlace
        } else {
            self.reclassify()
        }
    }

    /// Playback begins or resumes; pulse ticks restart from zero
    pub fn start(&mut self) {
        self.core.delta_ticks = self.core.ticks;
    }

    /// Reset the play head
    pub fn stop(&mut self) {
        self.core.ticks = 0;
        self.core.delta_ticks = 0;
        self.core.current_cycle = 0;
    }

    /// Advance to `current_tick` pulse ticks since the last start
    pub fn time_pulse(&mut self, current_tick: i64) {
        if self.core.cycle_ticks == 0 {
            return;
        }
        let Self {
            core,
            variant,
            target,
            ..
        } = self;
        core.begin_pulse();
        variant.driver::<T>().time_pulse(core, target, current_tick);
        core.end_pulse();
    }

    /// Seek to an absolute timeline position
    pub fn jump_to(&mut self, ticks: i64) {
        let Self {
            core,
            variant,
            target,
            ..
        } = self;
        variant.driver::<T>().jump_to(core, target, ticks);
    }

    /// Stop the pulse in flight from applying any further progress
    pub fn abort_current_pulse(&mut self) {
        self.core.abort_current_pulse();
    }

    fn reclassify(&mut self) -> Reconfigured {
        let from = self.kind();
        let old = self.variant.policy();
        let position = old.position(&self.core);

        let sign = if self.core.forward() { 1 } else { -1 };
        let elapsed = self.core.ticks - self.core.delta_ticks;
        let travelled = if old.signed_rate() { elapsed * sign } else { elapsed };

        self.config.rate = self.core.rate;
        let mut core = EnvelopeCore::new(&self.config);
        let variant = Variant::create(&self.config);
        let new = variant.policy();
        new.place_at(&mut core, position);
        let elapsed = if new.signed_rate() { travelled * sign } else { travelled };
        core.delta_ticks = core.ticks - elapsed;

        let to = new.kind();
        tracing::debug!(
            "ClipEnvelope: reclassified {:?} -> {:?} at position {} (count={}, duration={})",
            from,
            to,
            position,
            self.config.cycle_count,
            self.config.cycle_duration
        );

        self.core = core;
        self.variant = variant;
        Reconfigured::Replaced { from, to }
    }
}

impl<T: ClipTarget + std::fmt::Debug> std::fmt::Debug for ClipEnvelope<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipEnvelope")
            .field("kind", &self.kind())
            .field("config", &self.config)
            .field("core", &self.core)
            .field("target", &self.target)
            .finish()
    }
}
