//! Protocol session contract consumed by the supervisor
//!
//! A session performs the actual handshake, key exchange, and tunnel I/O for
//! exactly one connection attempt. The supervisor owns the single live
//! session, replaces it wholesale on every reconnect, and hears back from it
//! through the generation-tagged [`SessionSink`] it was built with.

use tokio::sync::mpsc;

use crate::connect::remote::Remote;
use crate::connect::signal::{Generation, Signal};

/// Why a session terminated, when a fatal error was recorded.
///
/// The set is closed: the supervisor's retry-vs-halt classification is an
/// exhaustive match over these variants, so an unclassified outcome cannot
/// be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminateCode {
    AuthFailed,
    TunSetupFailed,
    TunIfaceCreate,
    TunIfaceDisabled,
    ProxyError,
    ProxyNeedCreds,
    CertVerifyFail,
    TlsVersionMin,
    ClientHalt,
    ClientRestart,
    InactiveTimeout,
}

/// Parameters for constructing one session
///
/// Built fresh from the current configuration and remote-list cursor at
/// every construction; never reused across generations.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// The endpoint this session will connect to
    pub remote: Remote,
}

/// Callback sink handed to a session at construction
///
/// One sink corresponds to one session and one generation. Both calls are
/// non-blocking posts into the supervisor queue; a post arriving after the
/// supervisor moved on to a later generation is silently dropped there.
#[derive(Debug, Clone)]
pub struct SessionSink {
    tx: mpsc::UnboundedSender<Signal>,
    generation: Generation,
}

impl SessionSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Signal>, generation: Generation) -> Self {
        Self { tx, generation }
    }

    /// The generation this sink (and its session) belongs to
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Report that the session reached the connected state
    pub fn connected(&self) {
        let _ = self.tx.send(Signal::Connected {
            generation: self.generation,
        });
    }

    /// Report the session's one terminal outcome.
    ///
    /// `code: None` means the session ended without a fatal error and the
    /// supervisor may retry.
    pub fn terminated(&self, code: Option<TerminateCode>, reason: impl Into<String>) {
        let _ = self.tx.send(Signal::Terminated {
            generation: self.generation,
            code,
            reason: reason.into(),
        });
    }
}

/// One live connection attempt
///
/// Implementations run their I/O asynchronously and must not block in any of
/// these methods; `stop` requests teardown and returns, any cleanup happens
/// in the background.
pub trait Session: Send {
    /// Begin the connection attempt
    fn start(&mut self);

    /// Tear the session down. `notify_peer` asks for a best-effort exit
    /// notification first; it is not awaited. After `stop` the session must
    /// not report back through its sink.
    fn stop(&mut self, notify_peer: bool);

    /// Best-effort, unacknowledged exit notification to the remote peer
    fn send_exit_notify(&mut self);

    /// Whether any inbound packet has arrived yet
    fn first_packet_received(&self) -> bool;

    /// Whether this session ever reached the connected state
    fn reached_connected_state(&self) -> bool;
}

/// Builds one session per connection attempt
pub trait SessionFactory: Send {
    fn build(&mut self, config: SessionConfig, sink: SessionSink) -> Box<dyn Session>;
}
