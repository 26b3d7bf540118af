//! Single-cycle envelope: `cycle_count <= 1` or an indefinite cycle duration

use super::{pulse_ticks, EnvelopeCore, EnvelopeKind, LoopDriver, LoopPolicy};
use crate::config::CycleCount;
use crate::target::ClipTarget;
use crate::ticks::INDEFINITE;

/// Loop policy for clips that play exactly one cycle
///
/// The play head is an absolute position in `[0, cycle_ticks]` and moves
/// with the signed rate, so reverse playback simply walks it towards zero.
#[derive(Clone, Debug)]
pub struct SingleLoopEnvelope {
    cycle_count: CycleCount,
}

impl SingleLoopEnvelope {
    pub(crate) fn new(cycle_count: CycleCount) -> Self {
        Self { cycle_count }
    }
}

impl LoopPolicy for SingleLoopEnvelope {
    fn kind(&self) -> EnvelopeKind {
        EnvelopeKind::SingleLoop
    }

    fn signed_rate(&self) -> bool {
        true
    }

    fn set_auto_reverse(&mut self, _auto_reverse: bool) {
        // one cycle has nothing to reverse into
    }

    fn update_cycle_ticks(&mut self, core: &mut EnvelopeCore, cycle_ticks: i64) -> bool {
        if !self.cycle_count.is_single() && cycle_ticks != INDEFINITE {
            return false;
        }
        core.cycle_ticks = cycle_ticks;
        core.shift_ticks(core.ticks.clamp(0, cycle_ticks.max(0)));
        true
    }

    fn update_cycle_count(&mut self, core: &mut EnvelopeCore, cycle_count: CycleCount) -> bool {
        if !cycle_count.is_single() && core.cycle_ticks != INDEFINITE {
            return false;
        }
        self.cycle_count = cycle_count;
        true
    }

    fn cycle_num(&self, _core: &EnvelopeCore) -> u64 {
        0
    }

    fn current_cycle(&self, _core: &EnvelopeCore) -> u64 {
        0
    }

    fn calculate_current_running_rate(&self, core: &EnvelopeCore) -> f64 {
        core.rate
    }

    fn was_synched(&self, core: &EnvelopeCore) -> bool {
        core.cycle_ticks != 0 && self.cycle_count != CycleCount::Finite(0)
    }

    fn has_reached_end(&self, core: &EnvelopeCore) -> bool {
        if core.forward() {
            core.ticks == core.cycle_ticks
        } else {
            core.ticks == 0
        }
    }

    fn calculate_new_ticks(&self, core: &EnvelopeCore, new_dest: i64) -> i64 {
        core.delta_ticks
            .saturating_add(new_dest)
            .clamp(0, core.cycle_ticks.max(0))
    }

    fn total_ticks(&self, core: &EnvelopeCore) -> Option<i64> {
        (core.cycle_ticks != INDEFINITE).then_some(core.cycle_ticks)
    }

    fn position(&self, core: &EnvelopeCore) -> i64 {
        core.ticks
    }

    fn place_at(&self, core: &mut EnvelopeCore, position: i64) {
        core.shift_ticks(position.clamp(0, core.cycle_ticks.max(0)));
    }
}

impl<T: ClipTarget> LoopDriver<T> for SingleLoopEnvelope {
    fn set_rate(&mut self, core: &mut EnvelopeCore, target: &mut T, rate: f64) {
        let changed = rate != core.rate;
        core.delta_ticks = core.ticks - core.ticks_rate_change(rate);
        core.rate = rate;
        if changed {
            target.set_current_rate(rate);
        }
        core.abort_current_pulse();
    }

    fn time_pulse(&mut self, core: &mut EnvelopeCore, target: &mut T, current_tick: i64) {
        let old_ticks = core.ticks;
        core.ticks = self.calculate_new_ticks(core, pulse_ticks(current_tick, core.rate));
        if core.ticks == old_ticks {
            return;
        }

        let reached_end = self.has_reached_end(core);
        self.play_to(core, target, core.ticks);
        if reached_end && !core.is_aborted() {
            target.finished();
        }
    }

    fn jump_to(&mut self, core: &mut EnvelopeCore, target: &mut T, ticks: i64) {
        if core.cycle_ticks == 0 {
            return;
        }

        let old_ticks = core.ticks;
        core.ticks = ticks.clamp(0, core.cycle_ticks);
        let delta = core.ticks - old_ticks;
        if delta == 0 {
            return;
        }
        core.delta_ticks += delta;

        target.jump_to(core.ticks, core.cycle_ticks, false);
        core.abort_current_pulse();
    }
}
