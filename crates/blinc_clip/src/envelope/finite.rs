//! Finite-loop envelope: a known number of cycles greater than one

use super::{pulse_ticks, wrap_ticks, EnvelopeCore, EnvelopeKind, LoopDriver, LoopPolicy};
use crate::config::CycleCount;
use crate::target::ClipTarget;
use crate::ticks::INDEFINITE;

/// Loop policy for clips that repeat a fixed number of times
///
/// `ticks` is the distance travelled in the current direction of play, in
/// `[0, total_ticks]`. Playing forward it equals the absolute position;
/// playing backwards it is measured from the end of the last cycle.
#[derive(Clone, Debug)]
pub struct FiniteLoopEnvelope {
    cycle_count: u32,
    auto_reverse: bool,
    total_ticks: i64,
}

impl FiniteLoopEnvelope {
    pub(crate) fn new(cycle_count: u32, auto_reverse: bool, cycle_ticks: i64) -> Self {
        Self {
            cycle_count,
            auto_reverse,
            total_ticks: total_ticks(cycle_count, cycle_ticks),
        }
    }

    /// Travelled distance after `delta_ticks + new_dest`, clamped to the clip
    fn travel_ticks(&self, core: &EnvelopeCore, new_dest: i64) -> i64 {
        core.delta_ticks
            .saturating_add(new_dest)
            .clamp(0, self.total_ticks)
    }

    fn last_cycle(&self) -> i64 {
        self.cycle_count as i64 - 1
    }

    /// Cycle being travelled, counted from where play started
    fn travel_cycle(&self, core: &EnvelopeCore) -> i64 {
        if core.cycle_ticks <= 0 {
            return 0;
        }
        (core.ticks / core.cycle_ticks).min(self.last_cycle())
    }

    /// Absolute index of a travel cycle
    fn cycle_index(&self, core: &EnvelopeCore, travel: i64) -> i64 {
        if core.forward() {
            travel
        } else {
            self.last_cycle() - travel
        }
    }

    fn is_reversed(&self, index: i64) -> bool {
        self.auto_reverse && index % 2 == 1
    }

    fn rate_for_cycle(&self, core: &EnvelopeCore, index: i64) -> f64 {
        if self.is_reversed(index) {
            -core.rate
        } else {
            core.rate
        }
    }

    /// Clip position `within` ticks into travel cycle `travel`
    fn clip_ticks(&self, core: &EnvelopeCore, travel: i64, within: i64) -> i64 {
        let cycle_ticks = core.cycle_ticks;
        let position = if core.forward() {
            within
        } else {
            cycle_ticks - within
        };
        if self.is_reversed(self.cycle_index(core, travel)) {
            cycle_ticks - position
        } else {
            position
        }
    }

    fn clip_position(&self, core: &EnvelopeCore) -> i64 {
        let travel = self.travel_cycle(core);
        self.clip_ticks(core, travel, core.ticks - travel * core.cycle_ticks)
    }

    /// Play from `from` to `to` (travel ticks), stopping at each boundary
    fn advance<T: ClipTarget>(
        &mut self,
        core: &mut EnvelopeCore,
        target: &mut T,
        from: i64,
        to: i64,
    ) {
        let cycle_ticks = core.cycle_ticks;
        let mut boundary = (from / cycle_ticks + 1).saturating_mul(cycle_ticks);
        core.ticks = to;

        while boundary <= to {
            let travel = boundary / cycle_ticks - 1;
            let end = self.clip_ticks(core, travel, cycle_ticks);
            tracing::trace!(
                "FiniteLoopEnvelope: cycle {} of {} complete",
                travel + 1,
                self.cycle_count
            );
            self.play_to(core, target, end);
            if core.is_aborted() || boundary == self.total_ticks {
                return;
            }

            let next = travel + 1;
            if self.auto_reverse {
                target.set_current_rate(self.rate_for_cycle(core, self.cycle_index(core, next)));
            } else {
                target.jump_to(self.clip_ticks(core, next, 0), cycle_ticks, false);
            }
            boundary = boundary.saturating_add(cycle_ticks);
        }

        if to % cycle_ticks != 0 {
            let position = self.clip_position(core);
            self.play_to(core, target, position);
        }
    }
}

fn total_ticks(cycle_count: u32, cycle_ticks: i64) -> i64 {
    cycle_ticks.saturating_mul(cycle_count as i64)
}

impl LoopPolicy for FiniteLoopEnvelope {
    fn kind(&self) -> EnvelopeKind {
        EnvelopeKind::FiniteLoop
    }

    fn set_auto_reverse(&mut self, auto_reverse: bool) {
        self.auto_reverse = auto_reverse;
    }

    fn update_cycle_ticks(&mut self, core: &mut EnvelopeCore, cycle_ticks: i64) -> bool {
        if cycle_ticks == INDEFINITE {
            return false;
        }
        core.cycle_ticks = cycle_ticks;
        self.total_ticks = total_ticks(self.cycle_count, cycle_ticks);
        core.shift_ticks(core.ticks.clamp(0, self.total_ticks));
        true
    }

    fn update_cycle_count(&mut self, core: &mut EnvelopeCore, cycle_count: CycleCount) -> bool {
        match cycle_count {
            CycleCount::Finite(n) if n > 1 => {
                let position = self.position(core);
                self.cycle_count = n;
                self.total_ticks = total_ticks(n, core.cycle_ticks);
                self.place_at(core, position);
                true
            }
            _ => false,
        }
    }

    fn cycle_num(&self, core: &EnvelopeCore) -> u64 {
        self.cycle_index(core, self.travel_cycle(core)) as u64
    }

    fn current_cycle(&self, core: &EnvelopeCore) -> u64 {
        if core.cycle_ticks <= 0 {
            return 0;
        }
        (core.ticks / core.cycle_ticks).min(self.cycle_count as i64) as u64
    }

    fn calculate_current_running_rate(&self, core: &EnvelopeCore) -> f64 {
        self.rate_for_cycle(core, self.cycle_num(core) as i64)
    }

    fn has_reached_end(&self, core: &EnvelopeCore) -> bool {
        core.cycle_ticks != 0 && core.ticks == self.total_ticks
    }

    fn calculate_new_ticks(&self, core: &EnvelopeCore, new_dest: i64) -> i64 {
        wrap_ticks(self.travel_ticks(core, new_dest), core.cycle_ticks)
    }

    fn total_ticks(&self, _core: &EnvelopeCore) -> Option<i64> {
        Some(self.total_ticks)
    }

    fn position(&self, core: &EnvelopeCore) -> i64 {
        if core.forward() {
            core.ticks
        } else {
            self.total_ticks - core.ticks
        }
    }

    fn place_at(&self, core: &mut EnvelopeCore, position: i64) {
        let position = position.clamp(0, self.total_ticks);
        let ticks = if core.forward() {
            position
        } else {
            self.total_ticks - position
        };
        core.shift_ticks(ticks);
    }
}

impl<T: ClipTarget> LoopDriver<T> for FiniteLoopEnvelope {
    fn set_rate(&mut self, core: &mut EnvelopeCore, target: &mut T, rate: f64) {
        let old_rate = self.calculate_current_running_rate(core);
        let elapsed = core.rescaled_elapsed((rate / core.rate).abs());
        if rate * core.rate < 0.0 {
            // Travel is measured from the other end now
            core.ticks = self.total_ticks - core.ticks;
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
            self.advance(core, target, old_ticks, new_ticks);
        } else {
            core.ticks = new_ticks;
            let position = self.clip_position(core);
            self.play_to(core, target, position);
        }

        if !core.is_aborted() && self.has_reached_end(core) {
            target.finished();
        }
    }

    fn jump_to(&mut self, core: &mut EnvelopeCore, target: &mut T, ticks: i64) {
        if core.cycle_ticks == 0 {
            return;
        }

        let old_ticks = core.ticks;
        let old_rate = self.calculate_current_running_rate(core);
        self.place_at(core, ticks);
        if core.ticks == old_ticks {
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

#[cfg(test)]
mod tests {
    use crate::config::{ClipConfig, CycleCount};
    use crate::envelope::{ClipEnvelope, EnvelopeKind};
    use crate::target::testing::{Event, Recorder};
    use crate::target::PulseRequest;
    use crate::ticks::{CycleDuration, TickRate};

    fn envelope(count: u32, ms: u64, auto_reverse: bool, rate: f64) -> ClipEnvelope<Recorder> {
        envelope_with(count, ms, auto_reverse, rate, Recorder::new())
    }

    fn envelope_with(
        count: u32,
        ms: u64,
        auto_reverse: bool,
        rate: f64,
        target: Recorder,
    ) -> ClipEnvelope<Recorder> {
        let config = ClipConfig::once(CycleDuration::from_millis(ms))
            .with_cycle_count(CycleCount::Finite(count))
            .with_tick_rate(TickRate::new(1000).unwrap())
            .with_auto_reverse(auto_reverse)
            .with_rate(rate);
        let envelope = ClipEnvelope::create(config, target);
        assert_eq!(envelope.kind(), EnvelopeKind::FiniteLoop);
        envelope
    }

    #[test]
    fn test_three_cycles_count_boundaries() {
        let mut env = envelope(3, 100, false, 1.0);
        env.start();

        for tick in (0..=250).step_by(10) {
            env.time_pulse(tick);
        }
        assert_eq!(env.current_cycle(), 2);
        assert_eq!(env.cycle_num(), 2);
        assert!(!env.has_reached_end());
        assert_eq!(env.target().finished_count(), 0);

        env.time_pulse(300);
        assert_eq!(env.current_cycle(), 3);
        assert_eq!(env.cycle_num(), 2);
        assert!(env.has_reached_end());
        assert_eq!(env.target().finished_count(), 1);

        env.time_pulse(350);
        assert_eq!(env.ticks(), 300);
        assert_eq!(env.target().finished_count(), 1);
    }

    #[test]
    fn test_boundary_wraps_with_jump() {
        let mut env = envelope(3, 100, false, 1.0);
        env.start();
        env.time_pulse(80);
        env.target_mut().take();

        env.time_pulse(130);
        assert_eq!(
            env.target().events,
            vec![
                Event::PlayTo(100, 100),
                Event::JumpTo(0, 100, false),
                Event::PlayTo(30, 100),
            ]
        );
    }

    #[test]
    fn test_exact_boundary_lands_on_next_cycle() {
        let mut env = envelope(3, 100, false, 1.0);
        env.start();
        env.time_pulse(100);

        assert_eq!(
            env.target().events,
            vec![Event::PlayTo(100, 100), Event::JumpTo(0, 100, false)]
        );
        assert_eq!(env.cycle_num(), 1);
        assert_eq!(env.current_cycle(), 1);
    }

    #[test]
    fn test_one_pulse_crossing_many_cycles() {
        let mut env = envelope(4, 100, false, 1.0);
        env.start();
        env.time_pulse(1000);

        assert_eq!(env.ticks(), 400);
        assert_eq!(
            env.target().play_positions(),
            vec![100, 100, 100, 100]
        );
        assert_eq!(env.target().finished_count(), 1);
    }

    #[test]
    fn test_auto_reverse_alternates_direction() {
        let mut env = envelope(3, 100, true, 1.0);
        env.start();

        env.time_pulse(150);
        assert_eq!(
            env.target().events,
            vec![
                Event::PlayTo(100, 100),
                Event::SetCurrentRate(-1.0),
                Event::PlayTo(50, 100),
            ]
        );
        assert_eq!(env.calculate_current_running_rate(), -1.0);

        env.target_mut().take();
        env.time_pulse(300);
        assert_eq!(
            env.target().events,
            vec![
                Event::PlayTo(0, 100),
                Event::SetCurrentRate(1.0),
                Event::PlayTo(100, 100),
                Event::Finished,
            ]
        );
        assert_eq!(env.calculate_current_running_rate(), 1.0);
    }

    #[test]
    fn test_reverse_rate_plays_from_the_end() {
        let mut env = envelope(2, 100, false, -1.0);
        env.start();

        env.time_pulse(30);
        assert_eq!(env.position(), 170);
        assert_eq!(env.cycle_num(), 1);
        assert_eq!(env.target().events, vec![Event::PlayTo(70, 100)]);

        env.time_pulse(200);
        assert_eq!(env.position(), 0);
        assert!(env.has_reached_end());
        assert_eq!(env.target().finished_count(), 1);
    }

    #[test]
    fn test_direction_toggle_keeps_position() {
        let mut env = envelope(3, 100, false, 1.0);
        env.start();
        env.time_pulse(120);
        assert_eq!(env.position(), 120);

        env.set_rate(-1.0).unwrap();
        assert_eq!(env.position(), 120);
        assert_eq!(env.ticks(), 180);

        env.time_pulse(150);
        assert_eq!(env.position(), 90);
        assert_eq!(env.cycle_num(), 0);
    }

    #[test]
    fn test_jump_to_is_absolute() {
        let mut env = envelope(3, 100, true, -1.0);
        env.jump_to(250);

        assert_eq!(env.position(), 250);
        assert_eq!(env.ticks(), 50);
        assert_eq!(env.cycle_num(), 2);
        assert_eq!(env.delta_ticks(), 50);
        assert_eq!(env.target().events, vec![Event::JumpTo(50, 100, false)]);

        env.jump_to(150);
        assert_eq!(env.cycle_num(), 1);
        assert_eq!(
            env.target().events[1..],
            [
                Event::SetCurrentRate(1.0),
                Event::JumpTo(50, 100, false)
            ]
        );
    }

    #[test]
    fn test_seek_request_at_boundary_stops_wrap() {
        let target = Recorder::new().on_next_play(vec![PulseRequest::JumpTo(20)]);
        let mut env = envelope_with(3, 100, false, 1.0, target);
        env.start();
        env.time_pulse(150);

        assert_eq!(
            env.target().events,
            vec![Event::PlayTo(100, 100), Event::JumpTo(20, 100, false)]
        );
        assert_eq!(env.position(), 20);

        env.time_pulse(160);
        assert_eq!(env.position(), 30);
    }

    #[test]
    fn test_count_change_in_place_keeps_position() {
        let mut env = envelope(3, 100, false, -1.0);
        env.jump_to(120);
        env.set_cycle_count(CycleCount::Finite(5));

        assert_eq!(env.kind(), EnvelopeKind::FiniteLoop);
        assert_eq!(env.position(), 120);
        assert_eq!(env.ticks(), 380);
    }

    #[test]
    fn test_calculate_new_ticks_wraps_into_cycle() {
        let env = envelope(3, 100, false, 1.0);
        assert_eq!(env.calculate_new_ticks(0), 0);
        assert_eq!(env.calculate_new_ticks(250), 50);
        // A completed cycle reports its end
        assert_eq!(env.calculate_new_ticks(200), 100);
        assert_eq!(env.calculate_new_ticks(1000), 100);
        assert_eq!(env.calculate_new_ticks(-20), 0);
    }

    #[test]
    fn test_saturated_total_does_not_overflow() {
        let mut env = envelope(3, 4_000_000_000_000_000_000, false, 1.0);
        let cycle_ticks = env.cycle_ticks();
        env.start();
        env.time_pulse(i64::MAX);

        assert!(env.has_reached_end());
        assert_eq!(
            env.target().play_positions(),
            vec![cycle_ticks, cycle_ticks, cycle_ticks]
        );
        assert_eq!(env.target().finished_count(), 1);
    }
}
