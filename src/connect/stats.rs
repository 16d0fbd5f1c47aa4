//! Error and lifecycle counters
//!
//! `ConnectStats` is shared between the supervisor and its observers as an
//! `Arc`; increments are atomic and never block.

use std::sync::atomic::{AtomicU64, Ordering};

/// Named counters incremented by the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum CounterKind {
    Pause,
    Reconnect,
    ConnectionTimeout,
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

impl CounterKind {
    const COUNT: usize = 14;

    /// Stable counter name for reporting
    pub fn name(self) -> &'static str {
        match self {
            CounterKind::Pause => "pause",
            CounterKind::Reconnect => "reconnect",
            CounterKind::ConnectionTimeout => "connection_timeout",
            CounterKind::AuthFailed => "auth_failed",
            CounterKind::TunSetupFailed => "tun_setup_failed",
            CounterKind::TunIfaceCreate => "tun_iface_create",
            CounterKind::TunIfaceDisabled => "tun_iface_disabled",
            CounterKind::ProxyError => "proxy_error",
            CounterKind::ProxyNeedCreds => "proxy_need_creds",
            CounterKind::CertVerifyFail => "cert_verify_fail",
            CounterKind::TlsVersionMin => "tls_version_min",
            CounterKind::ClientHalt => "client_halt",
            CounterKind::ClientRestart => "client_restart",
            CounterKind::InactiveTimeout => "inactive_timeout",
        }
    }
}

/// Atomic counter set for one supervisor
#[derive(Debug)]
pub struct ConnectStats {
    counters: [AtomicU64; CounterKind::COUNT],
}

impl ConnectStats {
    pub fn new() -> Self {
        Self {
            counters: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    /// Increment a named counter
    pub fn error(&self, kind: CounterKind) {
        self.counters[kind as usize].fetch_add(1, Ordering::Relaxed);
    }

    /// Read a named counter
    pub fn get(&self, kind: CounterKind) -> u64 {
        self.counters[kind as usize].load(Ordering::Relaxed)
    }
}

impl Default for ConnectStats {
    fn default() -> Self {
        Self::new()
    }
}
