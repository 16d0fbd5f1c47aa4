//! Shared test harness: a scripted mock session/factory plus helpers for
//! observing the supervisor from tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::timeout;

use tether::config::ConnectConfig;
use tether::connect::{
    ActivityTracker, ConnectEvent, ConnectStats, ConnectionSupervisor, PreResolve, Remote,
    ResolveNotify, Session, SessionConfig, SessionFactory, SessionSink, SupervisorHandle,
    SupervisorState, TerminateCode,
};

/// Scripted behavior applied when a mock session is started.
#[derive(Debug, Clone)]
pub enum SessionScript {
    /// Report connected (and a received packet) right away.
    ConnectImmediately,
    /// Report the given terminal outcome right away.
    TerminateOnStart(Option<TerminateCode>, &'static str),
    /// Do nothing until driven through the recorded sink or probe.
    Silent,
}

/// Observable state of one constructed mock session.
#[derive(Debug, Default)]
pub struct SessionProbe {
    pub started: AtomicBool,
    pub stopped: AtomicBool,
    pub stop_notified_peer: AtomicBool,
    pub exit_notifies: AtomicUsize,
    pub first_packet: AtomicBool,
    pub reached_connected: AtomicBool,
}

/// Everything recorded about one constructed session.
pub struct BuiltSession {
    pub remote: Remote,
    pub sink: SessionSink,
    pub probe: Arc<SessionProbe>,
}

struct MockSession {
    script: SessionScript,
    sink: SessionSink,
    probe: Arc<SessionProbe>,
}

impl Session for MockSession {
    fn start(&mut self) {
        self.probe.started.store(true, Ordering::SeqCst);
        match &self.script {
            SessionScript::ConnectImmediately => {
                self.probe.first_packet.store(true, Ordering::SeqCst);
                self.probe.reached_connected.store(true, Ordering::SeqCst);
                self.sink.connected();
            }
            SessionScript::TerminateOnStart(code, reason) => {
                self.sink.terminated(*code, *reason);
            }
            SessionScript::Silent => {}
        }
    }

    fn stop(&mut self, notify_peer: bool) {
        self.probe.stopped.store(true, Ordering::SeqCst);
        if notify_peer {
            self.probe.stop_notified_peer.store(true, Ordering::SeqCst);
        }
    }

    fn send_exit_notify(&mut self) {
        self.probe.exit_notifies.fetch_add(1, Ordering::SeqCst);
    }

    fn first_packet_received(&self) -> bool {
        self.probe.first_packet.load(Ordering::SeqCst)
    }

    fn reached_connected_state(&self) -> bool {
        self.probe.reached_connected.load(Ordering::SeqCst)
    }
}

/// Factory applying one script per generation, in order; generations beyond
/// the script list stay silent.
pub struct MockFactory {
    scripts: Vec<SessionScript>,
    built: Arc<Mutex<Vec<BuiltSession>>>,
}

impl MockFactory {
    pub fn new(scripts: Vec<SessionScript>, built: Arc<Mutex<Vec<BuiltSession>>>) -> Self {
        Self { scripts, built }
    }
}

impl SessionFactory for MockFactory {
    fn build(&mut self, config: SessionConfig, sink: SessionSink) -> Box<dyn Session> {
        let mut built = self.built.lock().unwrap();
        let script = self
            .scripts
            .get(built.len())
            .cloned()
            .unwrap_or(SessionScript::Silent);
        let probe = Arc::new(SessionProbe::default());
        built.push(BuiltSession {
            remote: config.remote.clone(),
            sink: sink.clone(),
            probe: probe.clone(),
        });
        Box::new(MockSession {
            script,
            sink,
            probe,
        })
    }
}

/// Scripted pre-resolver.
pub struct MockResolver {
    pub work: bool,
    pub complete_immediately: bool,
    pub started: Arc<AtomicBool>,
    pub cancelled: Arc<AtomicBool>,
    /// Holds the completion callback when not completing immediately
    pub notify_slot: Arc<Mutex<Option<ResolveNotify>>>,
}

impl MockResolver {
    pub fn new(work: bool, complete_immediately: bool) -> Self {
        Self {
            work,
            complete_immediately,
            started: Arc::new(AtomicBool::new(false)),
            cancelled: Arc::new(AtomicBool::new(false)),
            notify_slot: Arc::new(Mutex::new(None)),
        }
    }
}

impl PreResolve for MockResolver {
    fn work_available(&self) -> bool {
        self.work
    }

    fn start(&mut self, notify: ResolveNotify) {
        self.started.store(true, Ordering::SeqCst);
        if self.complete_immediately {
            notify.done();
        } else {
            *self.notify_slot.lock().unwrap() = Some(notify);
        }
    }

    fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

/// A spawned supervisor plus every observation channel a test needs.
pub struct Harness {
    pub handle: SupervisorHandle,
    pub state: watch::Receiver<SupervisorState>,
    pub events: mpsc::UnboundedReceiver<ConnectEvent>,
    pub stats: Arc<ConnectStats>,
    pub tracker: ActivityTracker,
    pub built: Arc<Mutex<Vec<BuiltSession>>>,
}

/// Three remotes, connection timer disabled, no server polling. Individual
/// tests opt back in to the timers they exercise.
pub fn test_config() -> ConnectConfig {
    let mut config = ConnectConfig::new(vec![
        Remote::new("a.example.com", 1194),
        Remote::new("b.example.com", 1194),
        Remote::new("c.example.com", 1194),
    ]);
    config.conn_timeout_secs = 0;
    config
}

pub fn spawn_supervisor(config: ConnectConfig, scripts: Vec<SessionScript>) -> Harness {
    spawn_supervisor_with(config, scripts, None)
}

pub fn spawn_supervisor_with(
    config: ConnectConfig,
    scripts: Vec<SessionScript>,
    resolver: Option<Box<dyn PreResolve>>,
) -> Harness {
    let built = Arc::new(Mutex::new(Vec::new()));
    let factory = MockFactory::new(scripts, built.clone());
    let mut supervisor =
        ConnectionSupervisor::new(config, Box::new(factory)).expect("valid test config");
    if let Some(resolver) = resolver {
        supervisor.set_pre_resolver(resolver);
    }

    let harness = Harness {
        handle: supervisor.handle(),
        state: supervisor.state_receiver(),
        events: supervisor.take_event_receiver().expect("event receiver"),
        stats: supervisor.stats(),
        tracker: supervisor.activity_tracker(),
        built,
    };
    tokio::spawn(supervisor.run());
    harness
}

pub async fn wait_for_state(state: &mut watch::Receiver<SupervisorState>, want: SupervisorState) {
    timeout(Duration::from_secs(30), async {
        loop {
            if *state.borrow_and_update() == want {
                return;
            }
            state.changed().await.expect("state channel closed");
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for state {:?}", want));
}

pub async fn wait_for_session_count(built: &Arc<Mutex<Vec<BuiltSession>>>, want: usize) {
    timeout(Duration::from_secs(30), async {
        loop {
            if built.lock().unwrap().len() >= want {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {} sessions", want));
}

/// Collect every event emitted so far without blocking.
pub fn drain_events(events: &mut mpsc::UnboundedReceiver<ConnectEvent>) -> Vec<ConnectEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = events.try_recv() {
        out.push(ev);
    }
    out
}
