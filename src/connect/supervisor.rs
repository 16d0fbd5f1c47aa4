//! Connection lifecycle supervision
//!
//! `ConnectionSupervisor` owns the decision of when to (re)connect, when to
//! pause, and when to give up, and classifies every session termination as
//! retryable or fatal. It keeps retrying through network-class failures,
//! rotating the remote list past endpoints that never worked, and halts for
//! good on failures that retrying cannot fix (such as a rejected login).
//!
//! All supervisor state lives on one consumer task driven by a single
//! `select!` loop; other threads interact only through [`SupervisorHandle`],
//! which posts a message and returns. Sessions, timers, and the pre-resolver
//! report back through generation-tagged signals on the same queue, so a
//! completion that raced a cancellation is recognized as stale and dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::ConnectConfig;
use crate::connect::alive::{ActivityGuard, ActivityTracker};
use crate::connect::challenge;
use crate::connect::event::ConnectEvent;
use crate::connect::remote::RemoteList;
use crate::connect::resolver::{PreResolve, ResolveNotify};
use crate::connect::session::{Session, SessionConfig, SessionFactory, SessionSink, TerminateCode};
use crate::connect::signal::{Generation, Signal, TimerKind};
use crate::connect::state::SupervisorState;
use crate::connect::stats::{ConnectStats, CounterKind};
use crate::connect::timer::SingleShot;
use crate::error::Result;

/// Delay before an automatic restart after a recoverable termination
const RESTART_DELAY: Duration = Duration::from_secs(2);

/// Control messages posted by [`SupervisorHandle`]
#[derive(Debug, Clone)]
enum Command {
    Start,
    Stop,
    GracefulStop,
    Pause,
    Resume,
    Reconnect { delay_secs: i64 },
    DontRestart,
}

/// Thread-safe control surface for a running supervisor
///
/// Every method posts into the supervisor's queue and returns immediately;
/// none blocks or touches supervisor state. All become no-ops once the
/// supervisor has halted.
#[derive(Clone)]
pub struct SupervisorHandle {
    tx: mpsc::UnboundedSender<Command>,
    halted: Arc<AtomicBool>,
}

impl SupervisorHandle {
    /// Begin connecting; no-op if a session already exists or after halt
    pub fn start(&self) {
        self.post(Command::Start);
    }

    /// Halt immediately without notifying the remote peer
    pub fn stop(&self) {
        self.post(Command::Stop);
    }

    /// Best-effort exit notification to the peer, then halt
    pub fn graceful_stop(&self) {
        self.post(Command::GracefulStop);
    }

    /// Stop the live session and idle until [`resume`](Self::resume)
    pub fn pause(&self) {
        self.post(Command::Pause);
    }

    /// Leave the paused state and build a new session
    pub fn resume(&self) {
        self.post(Command::Resume);
    }

    /// Schedule a reconnect after `delay_secs` (negative counts as zero)
    pub fn reconnect(&self, delay_secs: i64) {
        self.post(Command::Reconnect { delay_secs });
    }

    /// Suppress the next automatic restart only; the next termination halts
    pub fn dont_restart(&self) {
        self.post(Command::DontRestart);
    }

    fn post(&self, cmd: Command) {
        if self.halted.load(Ordering::SeqCst) {
            return;
        }
        let _ = self.tx.send(cmd);
    }
}

/// Top-level connection lifecycle supervisor
///
/// Construct with a validated [`ConnectConfig`] and a [`SessionFactory`],
/// take the observation channels, then drive it with
/// [`run`](Self::run) on a tokio task and control it through the
/// [`SupervisorHandle`].
pub struct ConnectionSupervisor {
    config: ConnectConfig,
    remotes: RemoteList,
    factory: Box<dyn SessionFactory>,
    pre_resolver: Option<Box<dyn PreResolve>>,

    generation: Generation,
    halted: Arc<AtomicBool>,
    paused: bool,
    dont_restart: bool,
    resolving: bool,

    /// Exclusively owned session slot; replaced wholesale, never mutated
    session: Option<Box<dyn Session>>,

    restart_wait: SingleShot,
    server_poll: SingleShot,
    conn_timer: SingleShot,

    command_tx: mpsc::UnboundedSender<Command>,
    commands: mpsc::UnboundedReceiver<Command>,
    signal_tx: mpsc::UnboundedSender<Signal>,
    signals: mpsc::UnboundedReceiver<Signal>,

    state_tx: watch::Sender<SupervisorState>,
    state_rx: watch::Receiver<SupervisorState>,
    events_tx: mpsc::UnboundedSender<ConnectEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<ConnectEvent>>,
    stats: Arc<ConnectStats>,
    tracker: ActivityTracker,
    /// Held across a pause so the hosting context does not look idle
    _keep_alive: Option<ActivityGuard>,
}

impl ConnectionSupervisor {
    /// Create a supervisor for the given configuration
    ///
    /// # Returns
    ///
    /// * `Ok(ConnectionSupervisor)` ready to be driven by [`run`](Self::run)
    /// * `Err(TetherError::Config)` if the configuration is invalid
    pub fn new(config: ConnectConfig, factory: Box<dyn SessionFactory>) -> Result<Self> {
        config.validate()?;

        let (command_tx, commands) = mpsc::unbounded_channel();
        let (signal_tx, signals) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SupervisorState::Idle);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let remotes = RemoteList::new(config.remotes.clone());

        Ok(Self {
            restart_wait: SingleShot::new(TimerKind::RestartWait, signal_tx.clone()),
            server_poll: SingleShot::new(TimerKind::ServerPoll, signal_tx.clone()),
            conn_timer: SingleShot::new(TimerKind::ConnTimeout, signal_tx.clone()),
            config,
            remotes,
            factory,
            pre_resolver: None,
            generation: 0,
            halted: Arc::new(AtomicBool::new(false)),
            paused: false,
            dont_restart: false,
            resolving: false,
            session: None,
            command_tx,
            commands,
            signal_tx,
            signals,
            state_tx,
            state_rx,
            events_tx,
            events_rx: Some(events_rx),
            stats: Arc::new(ConnectStats::new()),
            tracker: ActivityTracker::new(),
            _keep_alive: None,
        })
    }

    /// Install a pre-resolver to run before the first session is built
    pub fn set_pre_resolver(&mut self, resolver: Box<dyn PreResolve>) {
        self.pre_resolver = Some(resolver);
    }

    /// Get a cloneable control handle
    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle {
            tx: self.command_tx.clone(),
            halted: self.halted.clone(),
        }
    }

    /// Get a receiver for supervisor state updates
    pub fn state_receiver(&self) -> watch::Receiver<SupervisorState> {
        self.state_rx.clone()
    }

    /// Take the lifecycle event receiver; `None` after the first call
    pub fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<ConnectEvent>> {
        self.events_rx.take()
    }

    /// Shared error/lifecycle counters
    pub fn stats(&self) -> Arc<ConnectStats> {
        self.stats.clone()
    }

    /// Tracker observing the keep-alive token held across a pause
    pub fn activity_tracker(&self) -> ActivityTracker {
        self.tracker.clone()
    }

    /// Run the supervisor event loop
    ///
    /// Consumes the supervisor; exits once it has halted. Should be spawned
    /// as a background tokio task.
    pub async fn run(mut self) {
        debug!(remotes = self.remotes.len(), "connection supervisor running");

        while !self.is_halted() {
            tokio::select! {
                Some(cmd) = self.commands.recv() => self.on_command(cmd),
                Some(sig) = self.signals.recv() => self.on_signal(sig),
                else => break,
            }
        }

        debug!("connection supervisor loop ended");
    }

    fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::Start => self.start(),
            Command::Stop => self.stop(),
            Command::GracefulStop => self.graceful_stop(),
            Command::Pause => self.pause(),
            Command::Resume => self.resume(),
            Command::Reconnect { delay_secs } => self.reconnect(delay_secs),
            Command::DontRestart => self.dont_restart = true,
        }
    }

    fn on_signal(&mut self, sig: Signal) {
        match sig {
            Signal::Connected { generation } => self.on_session_connected(generation),
            Signal::Terminated {
                generation,
                code,
                reason,
            } => self.on_session_terminated(generation, code, reason),
            Signal::TimerFired { kind, generation } => self.on_timer(kind, generation),
            Signal::ResolveDone => self.on_resolve_done(),
        }
    }

    fn start(&mut self) {
        if self.session.is_some() || self.resolving || self.is_halted() {
            return;
        }

        let work = self
            .pre_resolver
            .as_ref()
            .map(|r| r.work_available())
            .unwrap_or(false);
        if work {
            self.resolving = true;
            self.emit(ConnectEvent::Resolving);
            self.set_state(SupervisorState::Resolving);
            let notify = ResolveNotify::new(self.signal_tx.clone());
            if let Some(resolver) = self.pre_resolver.as_mut() {
                resolver.start(notify);
            }
        } else {
            self.new_session(true);
        }
    }

    fn on_resolve_done(&mut self) {
        if self.is_halted() {
            return;
        }
        // The handle is transient; release it once resolution completed
        self.resolving = false;
        self.pre_resolver = None;
        self.new_session(true);
    }

    fn stop(&mut self) {
        if self.is_halted() {
            return;
        }
        self.halted.store(true, Ordering::SeqCst);

        if let Some(resolver) = self.pre_resolver.as_mut() {
            resolver.cancel();
        }
        if let Some(session) = self.session.as_mut() {
            session.stop(false);
        }
        self.cancel_timers();
        self._keep_alive = None;

        self.emit(ConnectEvent::Disconnected);
        self.set_state(SupervisorState::Halted);
        info!("connection supervisor halted");
    }

    fn graceful_stop(&mut self) {
        if !self.is_halted() {
            if let Some(session) = self.session.as_mut() {
                session.send_exit_notify();
            }
        }
        self.stop();
    }

    fn pause(&mut self) {
        if self.is_halted() || self.paused {
            return;
        }
        self.paused = true;

        // The stopped session stays in its slot so the rotation policy can
        // still ask whether it ever reached the connected state.
        if let Some(session) = self.session.as_mut() {
            session.send_exit_notify();
            session.stop(false);
        }
        self.cancel_timers();
        self._keep_alive = Some(self.tracker.guard());

        self.emit(ConnectEvent::Pause);
        self.stats.error(CounterKind::Pause);
        self.set_state(SupervisorState::Paused);
        info!("connection supervisor paused");
    }

    fn resume(&mut self) {
        if self.is_halted() || !self.paused {
            return;
        }
        self.paused = false;
        self.emit(ConnectEvent::Resume);
        info!("connection supervisor resuming");
        self.new_session(true);
    }

    fn reconnect(&mut self, delay_secs: i64) {
        if self.is_halted() {
            return;
        }
        let delay = Duration::from_secs(delay_secs.max(0) as u64);
        info!(delay_secs = delay.as_secs(), "reconnect scheduled");
        self.schedule_restart(delay);
    }

    fn queue_restart(&mut self) {
        info!(
            delay_secs = RESTART_DELAY.as_secs(),
            "client terminated, restarting"
        );
        self.schedule_restart(RESTART_DELAY);
    }

    fn schedule_restart(&mut self, delay: Duration) {
        self.server_poll.cancel();
        self.restart_wait.arm(delay, self.generation);
        self.set_state(SupervisorState::Restarting);
    }

    fn cancel_timers(&mut self) {
        self.restart_wait.cancel();
        self.server_poll.cancel();
        self.conn_timer.cancel();
    }

    /// Build and start the session for the next generation.
    ///
    /// `announce` controls the reconnecting event and counter; routine
    /// server-poll endpoint cycling passes `false` and stays silent.
    fn new_session(&mut self, announce: bool) {
        self.generation += 1;
        self._keep_alive = None;

        let prior_connected = self
            .session
            .as_ref()
            .map(|s| s.reached_connected_state())
            .unwrap_or(false);
        if let Some(old) = self.session.as_mut() {
            old.stop(false);
        }

        if self.generation > 1 {
            if announce {
                self.emit(ConnectEvent::Reconnecting);
                self.stats.error(CounterKind::Reconnect);
            }
            // Only rotate past an endpoint that never worked; one that
            // connected and later dropped is retried in place.
            if !prior_connected {
                self.remotes.next();
            }
        }

        let session_config = SessionConfig {
            remote: self.remotes.current().clone(),
        };
        info!(
            generation = self.generation,
            remote = %session_config.remote,
            "starting session"
        );

        let sink = SessionSink::new(self.signal_tx.clone(), self.generation);
        let mut session = self.factory.build(session_config, sink);

        self.restart_wait.cancel();
        if let Some(poll) = self.config.server_poll_timeout() {
            self.server_poll.arm(poll, self.generation);
        }
        if let Some(timeout) = self.config.conn_timeout() {
            self.conn_timer.arm(timeout, self.generation);
        }

        session.start();
        self.session = Some(session);
        self.set_state(SupervisorState::Connecting);
    }

    fn on_session_connected(&mut self, generation: Generation) {
        if generation != self.generation || self.is_halted() {
            return;
        }
        self.conn_timer.cancel();
        self.set_state(SupervisorState::Connected);
        debug!(generation, "session connected");
    }

    fn on_session_terminated(
        &mut self,
        generation: Generation,
        code: Option<TerminateCode>,
        reason: String,
    ) {
        if generation != self.generation || self.is_halted() {
            return;
        }

        if self.dont_restart {
            self.stop();
            return;
        }

        match code {
            // No fatal error recorded; retry after the fixed delay
            None => self.queue_restart(),
            Some(code) => self.classify_termination(code, reason),
        }
    }

    /// Apply retry-vs-halt policy for a fatal termination code.
    ///
    /// The match is exhaustive over the closed code set; an unclassified
    /// outcome is unrepresentable.
    fn classify_termination(&mut self, code: TerminateCode, reason: String) {
        match code {
            TerminateCode::AuthFailed => {
                if challenge::is_dynamic(&reason) {
                    // The server wants an interactive challenge; the caller
                    // must gather credentials and start a fresh supervisor.
                    self.emit(ConnectEvent::DynamicChallenge { challenge: reason });
                } else {
                    self.emit(ConnectEvent::AuthFailed { reason });
                    self.stats.error(CounterKind::AuthFailed);
                }
                self.stop();
            }
            TerminateCode::TunSetupFailed => {
                self.halt_with(
                    ConnectEvent::TunSetupFailed { reason },
                    CounterKind::TunSetupFailed,
                );
            }
            TerminateCode::TunIfaceCreate => {
                self.halt_with(
                    ConnectEvent::TunIfaceCreate { reason },
                    CounterKind::TunIfaceCreate,
                );
            }
            TerminateCode::TunIfaceDisabled => {
                self.halt_with(
                    ConnectEvent::TunIfaceDisabled { reason },
                    CounterKind::TunIfaceDisabled,
                );
            }
            TerminateCode::ProxyError => {
                self.halt_with(ConnectEvent::ProxyError { reason }, CounterKind::ProxyError);
            }
            TerminateCode::ProxyNeedCreds => {
                self.halt_with(
                    ConnectEvent::ProxyNeedCreds { reason },
                    CounterKind::ProxyNeedCreds,
                );
            }
            TerminateCode::CertVerifyFail => {
                self.halt_with(
                    ConnectEvent::CertVerifyFail { reason },
                    CounterKind::CertVerifyFail,
                );
            }
            TerminateCode::TlsVersionMin => {
                self.halt_with(ConnectEvent::TlsVersionMin, CounterKind::TlsVersionMin);
            }
            TerminateCode::ClientHalt => {
                self.halt_with(ConnectEvent::ClientHalt { reason }, CounterKind::ClientHalt);
            }
            TerminateCode::InactiveTimeout => {
                self.halt_with(ConnectEvent::InactiveTimeout, CounterKind::InactiveTimeout);
            }
            TerminateCode::ClientRestart => {
                // Server-requested restart is recoverable
                self.emit(ConnectEvent::ClientRestart { reason });
                self.stats.error(CounterKind::ClientRestart);
                self.queue_restart();
            }
        }
    }

    fn halt_with(&mut self, event: ConnectEvent, counter: CounterKind) {
        warn!(event = %event, "fatal session termination");
        self.emit(event);
        self.stats.error(counter);
        self.stop();
    }

    fn on_timer(&mut self, kind: TimerKind, generation: Generation) {
        // A firing that lost the race with its own cancellation is aborted;
        // then the usual ordering: check generation, check halted, then act.
        let live = match kind {
            TimerKind::RestartWait => self.restart_wait.live(),
            TimerKind::ServerPoll => self.server_poll.live(),
            TimerKind::ConnTimeout => self.conn_timer.live(),
        };
        if !live || generation != self.generation || self.is_halted() {
            return;
        }
        match kind {
            TimerKind::RestartWait => self.on_restart_wait(),
            TimerKind::ServerPoll => self.on_server_poll(),
            TimerKind::ConnTimeout => self.on_conn_timeout(),
        }
    }

    fn on_restart_wait(&mut self) {
        if self.paused {
            self.resume();
        } else {
            if let Some(session) = self.session.as_mut() {
                session.send_exit_notify();
            }
            self.new_session(true);
        }
    }

    fn on_server_poll(&mut self) {
        let unresponsive = self
            .session
            .as_ref()
            .is_some_and(|s| !s.first_packet_received());
        if unresponsive {
            // Routine endpoint cycling, not a user-visible failure:
            // no event, no counter.
            info!("server poll timeout, trying next remote");
            self.new_session(false);
        }
    }

    fn on_conn_timeout(&mut self) {
        self.stats.error(CounterKind::ConnectionTimeout);
        if !self.paused && self.config.pause_on_connection_timeout {
            self.pause();
        } else {
            self.emit(ConnectEvent::ConnectionTimeout);
            self.stop();
        }
    }

    fn emit(&self, event: ConnectEvent) {
        debug!(event = %event, "lifecycle event");
        let _ = self.events_tx.send(event);
    }

    fn set_state(&self, state: SupervisorState) {
        let _ = self.state_tx.send(state);
    }
}
