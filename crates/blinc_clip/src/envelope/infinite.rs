//! Infinite-loop envelope: cycles repeat until the clip is stopped

use super::{pulse_ticks, wrap_ticks, EnvelopeCore, EnvelopeKind, LoopDriver, LoopPolicy};
use crate::config::CycleCount;
use crate::target::ClipTarget;
use crate::ticks::INDEFINITE;

/// Loop policy for clips with an indefinite cycle count
///
/// The play head stays inside the current cycle: `ticks` is the distance
/// travelled in it and `current_cycle` counts the cycles left behind. Each
/// wrap moves `delta_ticks` back by one cycle so the pulse stream stays
/// continuous without the tick count growing forever.
#[derive(Clone, Debug)]
pub struct InfiniteLoopEnvelope {
    auto_reverse: bool,
}

impl InfiniteLoopEnvelope {
    pub(crate) fn new(auto_reverse: bool) -> Self {
        Self { auto_reverse }
    }

    fn is_reversed(&self, cycle: u64) -> bool {
        self.auto_reverse && cycle % 2 == 1
    }

    fn rate_for_cycle(&self, core: &EnvelopeCore, cycle: u64) -> f64 {
        if self.is_reversed(cycle) {
            -core.rate
        } else {
            core.rate
        }
    }

    fn clip_ticks(&self, core: &EnvelopeCore, cycle: u64, within: i64) -> i64 {
        let cycle_ticks = core.cycle_ticks;
        let position = if core.forward() {
            within
        } else {
            cycle_ticks - within
        };
        if self.is_reversed(cycle) {
            cycle_ticks - position
        } else {
            position
        }
    }

    fn travel_ticks(&self, core: &EnvelopeCore, new_dest: i64) -> i64 {
        core.delta_ticks.saturating_add(new_dest).max(0)
    }

    /// Cycle and in-cycle ticks once the wraps an aborted pulse skipped
    /// are counted
    fn folded(&self, core: &EnvelopeCore) -> (u64, i64) {
        let cycle_ticks = core.cycle_ticks;
        if cycle_ticks <= 0 || core.ticks < cycle_ticks {
            return (core.current_cycle, core.ticks);
        }
        let wraps = core.ticks / cycle_ticks;
        (core.current_cycle + wraps as u64, core.ticks - wraps * cycle_ticks)
    }

    fn fold_pending_wraps(&self, core: &mut EnvelopeCore) {
        let (cycle, ticks) = self.folded(core);
        core.delta_ticks = core.delta_ticks.saturating_sub(core.ticks - ticks);
        core.current_cycle = cycle;
        core.ticks = ticks;
    }

    fn clip_position(&self, core: &EnvelopeCore) -> i64 {
        self.clip_ticks(core, core.current_cycle, core.ticks)
    }

    /// Play forward to `to` ticks past the start of the current cycle,
    /// wrapping as many times as it takes
    fn advance<T: ClipTarget>(&mut self, core: &mut EnvelopeCore, target: &mut T, to: i64) {
        let cycle_ticks = core.cycle_ticks;
        core.ticks = to;

        while core.ticks >= cycle_ticks {
            let end = self.clip_ticks(core, core.current_cycle, cycle_ticks);
            self.play_to(core, target, end);
            if core.is_aborted() {
                return;
            }

            core.current_cycle += 1;
            core.ticks -= cycle_ticks;
            core.delta_ticks -= cycle_ticks;
            tracing::trace!(
                "InfiniteLoopEnvelope: entering cycle {}",
                core.current_cycle
            );

            if self.auto_reverse {
                target.set_current_rate(self.rate_for_cycle(core, core.current_cycle));
            } else {
                target.jump_to(
                    self.clip_ticks(core, core.current_cycle, 0),
                    cycle_ticks,
                    false,
                );
            }
        }

        if core.ticks != 0 {
            let position = self.clip_position(core);
            self.play_to(core, target, position);
        }
    }
}

impl LoopPolicy for InfiniteLoopEnvelope {
    fn kind(&self) -> EnvelopeKind {
        EnvelopeKind::InfiniteLoop
    }

    fn set_auto_reverse(&mut self, auto_reverse: bool) {
        self.auto_reverse = auto_reverse;
    }

    fn update_cycle_ticks(&mut self, core: &mut EnvelopeCore, cycle_ticks: i64) -> bool {
        if cycle_ticks == INDEFINITE {
            return false;
        }
        self.fold_pending_wraps(core);
        core.cycle_ticks = cycle_ticks;
        core.shift_ticks(core.ticks.clamp(0, cycle_ticks.max(0)));
        true
    }

    fn update_cycle_count(&mut self, _core: &mut EnvelopeCore, cycle_count: CycleCount) -> bool {
        cycle_count.is_indefinite()
    }

    fn cycle_num(&self, core: &EnvelopeCore) -> u64 {
        core.current_cycle
    }

    fn current_cycle(&self, core: &EnvelopeCore) -> u64 {
        core.current_cycle
    }

    fn calculate_current_running_rate(&self, core: &EnvelopeCore) -> f64 {
        self.rate_for_cycle(core, core.current_cycle)
    }

    fn has_reached_end(&self, _core: &EnvelopeCore) -> bool {
        false
    }

    fn calculate_new_ticks(&self, core: &EnvelopeCore, new_dest: i64) -> i64 {
        wrap_ticks(self.travel_ticks(core, new_dest), core.cycle_ticks)
    }

    fn total_ticks(&self, _core: &EnvelopeCore) -> Option<i64> {
        None
    }

    fn position(&self, core: &EnvelopeCore) -> i64 {
        let (cycle, ticks) = self.folded(core);
        let within = if core.forward() {
            ticks
        } else {
            core.cycle_ticks - ticks
        };
        (cycle as i64)
            .saturating_mul(core.cycle_ticks)
            .saturating_add(within)
    }

    fn place_at(&self, core: &mut EnvelopeCore, position: i64) {
        let cycle_ticks = core.cycle_ticks;
        if cycle_ticks <= 0 {
            return;
        }
        let position = position.max(0);
        let offset = position % cycle_ticks;
        core.current_cycle = (position / cycle_ticks) as u64;
        let ticks = if core.forward() {
            offset
        } else {
            cycle_ticks - offset
        };
        core.shift_ticks(ticks);
    }
}

impl<T: ClipTarget> LoopDriver<T> for InfiniteLoopEnvelope {
    fn set_rate(&mut self, core: &mut EnvelopeCore, target: &mut T, rate: f64) {
        let old_rate = self.calculate_current_running_rate(core);
        self.fold_pending_wraps(core);
        let elapsed = core.rescaled_elapsed((rate / core.rate).abs());
        if rate * core.rate < 0.0 {
            // Same spot in the cycle, travelled from the other side
            core.ticks = core.cycle_ticks - core.ticks;
        }
        core.delta_ticks = core.ticks - elapsed;
        core.rate = rate;

        let new_rate = self.calculate_current_running_rate(core);
        if new_rate != old_rate {
            target.set_current_rate(new_rate);
        }
        core.abort_current_pulse();
    }

    fn time_pulse(&mut self, core: &mut EnvelopeCore, target: &mut T, current_tick: i64) {
        let old_ticks = core.ticks;
        let new_ticks = self.travel_ticks(core, pulse_ticks(current_tick, core.rate.abs()));
        if new_ticks == old_ticks {
            return;
        }

        if new_ticks > old_ticks {
            self.advance(core, target, new_ticks);
        } else {
            core.ticks = new_ticks;
            let position = self.clip_position(core);
            self.play_to(core, target, position);
        }
    }

    fn jump_to(&mut self, core: &mut EnvelopeCore, target: &mut T, ticks: i64) {
        if core.cycle_ticks == 0 {
            return;
        }

        let old_ticks = core.ticks;
        let old_cycle = core.current_cycle;
        let old_rate = self.calculate_current_running_rate(core);
        self.place_at(core, ticks);
        if core.ticks == old_ticks && core.current_cycle == old_cycle {
            return;
        }

        let new_rate = self.calculate_current_running_rate(core);
        if new_rate != old_rate {
            target.set_current_rate(new_rate);
        }
        target.jump_to(self.clip_position(core), core.cycle_ticks, false);
        core.abort_current_pulse();
    }
}
