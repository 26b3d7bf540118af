//! Blinc Clip Envelopes
//!
//! Cycle timing for clip animations: how many times a clip repeats, in which
//! direction each cycle runs, and where the play head sits after a pulse.
//!
//! # Features
//!
//! - **Loop Policies**: Single, finite and infinite loops chosen from the clip configuration
//! - **Reclassification**: Changing count or duration swaps the policy and keeps progress
//! - **Auto-Reverse**: Odd cycles run backwards at the negated rate
//! - **Signed Rates**: Negative rates play clips from end to start
//! - **Re-entrant Targets**: Targets can seek, change rate or abort from inside a pulse
//! - **ClipPlayer**: Play, pause and stop driven by an external pulse clock
//! - **TOML Config**: Clip configurations load from TOML

pub mod config;
pub mod envelope;
pub mod error;
pub mod player;
pub mod target;
pub mod ticks;

pub use config::{ClipConfig, CycleCount};
pub use envelope::{
    ClipEnvelope, EnvelopeKind, FiniteLoopEnvelope, InfiniteLoopEnvelope, PulseState,
    Reconfigured, SingleLoopEnvelope,
};
pub use error::{ClipError, Result};
pub use player::{ClipPlayer, Status};
pub use target::{ClipTarget, PulseContext, PulseRequest};
pub use ticks::{CycleDuration, TickRate, INDEFINITE, TICKS_PER_SECOND};
