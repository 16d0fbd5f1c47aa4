//! Single-shot, cancellable, generation-tagged timers
//!
//! Arming spawns a task that sleeps and then posts a [`Signal::TimerFired`]
//! onto the supervisor queue. Cancellation may lose the race with a firing
//! that is already queued; the supervisor resolves that race by comparing
//! the generation tag, never by assuming cancellation is instantaneous.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::connect::signal::{Generation, Signal, TimerKind};

/// A re-armable single-shot timer
pub(crate) struct SingleShot {
    kind: TimerKind,
    tx: mpsc::UnboundedSender<Signal>,
    armed: Option<CancellationToken>,
}

impl SingleShot {
    pub(crate) fn new(kind: TimerKind, tx: mpsc::UnboundedSender<Signal>) -> Self {
        Self {
            kind,
            tx,
            armed: None,
        }
    }

    /// Arm the timer, replacing any earlier deadline
    pub(crate) fn arm(&mut self, delay: Duration, generation: Generation) {
        self.cancel();

        let token = CancellationToken::new();
        let guard = token.clone();
        let tx = self.tx.clone();
        let kind = self.kind;

        tokio::spawn(async move {
            tokio::select! {
                _ = guard.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(Signal::TimerFired { kind, generation });
                }
            }
        });

        self.armed = Some(token);
    }

    /// Cancel the pending deadline, if any
    pub(crate) fn cancel(&mut self) {
        if let Some(token) = self.armed.take() {
            token.cancel();
        }
    }

    /// Whether the most recent arm is still in force.
    ///
    /// A firing already queued when `cancel` ran reaches the supervisor
    /// anyway; this is the receiver-side check that recognizes it as
    /// aborted.
    pub(crate) fn live(&self) -> bool {
        self.armed.as_ref().is_some_and(|token| !token.is_cancelled())
    }
}

impl Drop for SingleShot {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_armed_timer_fires_with_its_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = SingleShot::new(TimerKind::RestartWait, tx);

        timer.arm(Duration::from_secs(3), 7);

        match rx.recv().await {
            Some(Signal::TimerFired { kind, generation }) => {
                assert_eq!(kind, TimerKind::RestartWait);
                assert_eq!(generation, 7);
            }
            other => panic!("unexpected signal: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_does_not_fire() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = SingleShot::new(TimerKind::ServerPoll, tx);

        timer.arm(Duration::from_secs(3), 1);
        assert!(timer.live());
        timer.cancel();
        assert!(!timer.live());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_previous_deadline() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = SingleShot::new(TimerKind::ConnTimeout, tx);

        timer.arm(Duration::from_secs(100), 1);
        timer.arm(Duration::from_secs(2), 2);

        match rx.recv().await {
            Some(Signal::TimerFired { generation, .. }) => assert_eq!(generation, 2),
            other => panic!("unexpected signal: {:?}", other),
        }

        // The replaced deadline must never fire
        tokio::time::sleep(Duration::from_secs(200)).await;
        assert!(rx.try_recv().is_err());
    }
}
