//! Envelope callbacks
//!
//! A [`ClipTarget`] receives the progress an envelope computes. It is the
//! only link between the tick arithmetic and whatever is being animated.
//!
//! Callbacks may want to reconfigure the envelope that is calling them (a
//! listener seeking on a cycle boundary, say). They cannot borrow the
//! envelope, so [`ClipTarget::play_to`] gets a [`PulseContext`] instead:
//! requests queued there are applied in order as soon as the callback
//! returns, and a seek or rate change aborts the rest of the pulse.

use smallvec::SmallVec;

/// Receiver of envelope progress
pub trait ClipTarget {
    /// Advance the clip to `ticks` within a cycle of `cycle_ticks` ticks
    fn play_to(&mut self, ticks: i64, cycle_ticks: i64, pulse: &mut PulseContext);

    /// Move the clip to `ticks` without playing the ticks in between
    fn jump_to(&mut self, ticks: i64, cycle_ticks: i64, force_jump: bool);

    /// The effective running rate changed (direction flip or new rate)
    fn set_current_rate(&mut self, rate: f64);

    /// The play head reached the end of the last cycle
    fn finished(&mut self) {}
}

/// A request issued from inside [`ClipTarget::play_to`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PulseRequest {
    /// Seek to an absolute timeline position
    JumpTo(i64),
    /// Change the nominal rate
    SetRate(f64),
    /// Drop the remainder of the current pulse
    Abort,
}

/// Request queue handed to [`ClipTarget::play_to`]
#[derive(Debug, Default)]
pub struct PulseContext {
    requests: SmallVec<[PulseRequest; 2]>,
}

impl PulseContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seek the envelope once the callback returns
    pub fn jump_to(&mut self, ticks: i64) {
        self.requests.push(PulseRequest::JumpTo(ticks));
    }

    /// Change the envelope's rate once the callback returns
    pub fn set_rate(&mut self, rate: f64) {
        self.requests.push(PulseRequest::SetRate(rate));
    }

    /// Abort the pulse that is currently calling back
    pub fn abort(&mut self) {
        self.requests.push(PulseRequest::Abort);
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub(crate) fn into_requests(self) -> SmallVec<[PulseRequest; 2]> {
        self.requests
    }
}

impl<T: ClipTarget + ?Sized> ClipTarget for Box<T> {
    fn play_to(&mut self, ticks: i64, cycle_ticks: i64, pulse: &mut PulseContext) {
        (**self).play_to(ticks, cycle_ticks, pulse)
    }

    fn jump_to(&mut self, ticks: i64, cycle_ticks: i64, force_jump: bool) {
        (**self).jump_to(ticks, cycle_ticks, force_jump)
    }

    fn set_current_rate(&mut self, rate: f64) {
        (**self).set_current_rate(rate)
    }

    fn finished(&mut self) {
        (**self).finished()
    }
}
