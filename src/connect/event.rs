//! Typed lifecycle events emitted by the supervisor
//!
//! Events are delivered over an unbounded channel: sending never blocks the
//! supervisor and observers see them in emission order.

/// Events emitted during connection supervision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectEvent {
    /// Pre-resolution of remote addresses started
    Resolving,

    /// A replacement session is being constructed for a later generation
    Reconnecting,

    /// The supervisor entered the paused state
    Pause,

    /// The supervisor left the paused state
    Resume,

    /// Final disconnect; the supervisor has halted
    Disconnected,

    /// The connection timer expired without reaching the connected state
    ConnectionTimeout,

    /// The server requested an interactive credential challenge
    DynamicChallenge { challenge: String },

    /// Authentication was rejected outright
    AuthFailed { reason: String },

    /// Tunnel configuration failed
    TunSetupFailed { reason: String },

    /// Tunnel interface could not be created
    TunIfaceCreate { reason: String },

    /// Tunnel interface is administratively disabled
    TunIfaceDisabled { reason: String },

    /// Proxy negotiation failed
    ProxyError { reason: String },

    /// Proxy demanded credentials the client does not have
    ProxyNeedCreds { reason: String },

    /// Server certificate verification failed
    CertVerifyFail { reason: String },

    /// Server TLS version below the configured minimum
    TlsVersionMin,

    /// Server instructed the client to halt
    ClientHalt { reason: String },

    /// Connection closed after the inactivity timeout
    InactiveTimeout,

    /// Server instructed the client to restart
    ClientRestart { reason: String },
}

impl std::fmt::Display for ConnectEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectEvent::Resolving => write!(f, "resolving"),
            ConnectEvent::Reconnecting => write!(f, "reconnecting"),
            ConnectEvent::Pause => write!(f, "pause"),
            ConnectEvent::Resume => write!(f, "resume"),
            ConnectEvent::Disconnected => write!(f, "disconnected"),
            ConnectEvent::ConnectionTimeout => write!(f, "connection timeout"),
            ConnectEvent::DynamicChallenge { .. } => write!(f, "dynamic challenge"),
            ConnectEvent::AuthFailed { reason } => write!(f, "auth failed: {}", reason),
            ConnectEvent::TunSetupFailed { reason } => write!(f, "tun setup failed: {}", reason),
            ConnectEvent::TunIfaceCreate { reason } => {
                write!(f, "tun interface create failed: {}", reason)
            }
            ConnectEvent::TunIfaceDisabled { reason } => {
                write!(f, "tun interface disabled: {}", reason)
            }
            ConnectEvent::ProxyError { reason } => write!(f, "proxy error: {}", reason),
            ConnectEvent::ProxyNeedCreds { reason } => {
                write!(f, "proxy needs credentials: {}", reason)
            }
            ConnectEvent::CertVerifyFail { reason } => {
                write!(f, "certificate verify failed: {}", reason)
            }
            ConnectEvent::TlsVersionMin => write!(f, "tls version below minimum"),
            ConnectEvent::ClientHalt { reason } => write!(f, "client halt: {}", reason),
            ConnectEvent::InactiveTimeout => write!(f, "inactivity timeout"),
            ConnectEvent::ClientRestart { reason } => write!(f, "client restart: {}", reason),
        }
    }
}
