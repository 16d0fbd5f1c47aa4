//! Internal completion messages posted into the supervisor loop
//!
//! Sessions, timers, and the pre-resolver all report back asynchronously by
//! sending a `Signal` onto the supervisor's single consumer queue. Each
//! signal that belongs to one connection attempt carries the generation it
//! was created under, so a stale completion can be recognized and dropped at
//! the receiving end.

use crate::connect::session::TerminateCode;

/// Ordinal identifying one connection attempt.
///
/// Every timer arm and every session construction captures the generation
/// current at that moment; the supervisor acts on a completion only when its
/// generation still matches.
pub type Generation = u64;

/// Which supervisor timer fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerKind {
    RestartWait,
    ServerPoll,
    ConnTimeout,
}

/// Completion notices consumed by the supervisor loop.
#[derive(Debug)]
pub(crate) enum Signal {
    /// The session for `generation` finished its handshake.
    Connected { generation: Generation },

    /// The session for `generation` reported its one terminal outcome.
    /// `code: None` means no fatal error was recorded.
    Terminated {
        generation: Generation,
        code: Option<TerminateCode>,
        reason: String,
    },

    /// A single-shot timer armed at `generation` expired.
    TimerFired {
        kind: TimerKind,
        generation: Generation,
    },

    /// Pre-resolution finished (successfully or not).
    ResolveDone,
}
