//! One-shot address pre-resolution
//!
//! Before the first connection attempt the supervisor may run a pre-resolve
//! pass over the remote list. Completion is reported back into the
//! supervisor queue; whether resolution actually succeeded is logged here
//! and not reinterpreted by the supervisor.

use std::net::IpAddr;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::connect::remote::RemoteList;
use crate::connect::signal::Signal;

/// Completion callback handed to a pre-resolver
///
/// Consumed by the one completion call; a cancelled resolver simply drops it.
pub struct ResolveNotify {
    tx: mpsc::UnboundedSender<Signal>,
}

impl ResolveNotify {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Signal>) -> Self {
        Self { tx }
    }

    /// Report completion; the supervisor proceeds to build generation 1
    pub fn done(self) {
        let _ = self.tx.send(Signal::ResolveDone);
    }
}

/// One-shot asynchronous address resolution
pub trait PreResolve: Send {
    /// Whether there is anything to resolve
    fn work_available(&self) -> bool;

    /// Start resolving; invokes `notify` exactly once on completion
    fn start(&mut self, notify: ResolveNotify);

    /// Abort a resolution in flight; idempotent, safe if never started
    fn cancel(&mut self);
}

/// DNS pre-resolver over the hostname entries of a remote list
///
/// IP-literal remotes need no resolution and are skipped at construction.
pub struct DnsPreResolver {
    targets: Vec<String>,
    cancel: Option<CancellationToken>,
}

impl DnsPreResolver {
    pub fn new(remotes: &RemoteList) -> Self {
        let targets = remotes
            .iter()
            .filter(|r| r.host.parse::<IpAddr>().is_err())
            .map(|r| format!("{}:{}", r.host, r.port))
            .collect();
        Self {
            targets,
            cancel: None,
        }
    }
}

impl PreResolve for DnsPreResolver {
    fn work_available(&self) -> bool {
        !self.targets.is_empty()
    }

    fn start(&mut self, notify: ResolveNotify) {
        let token = CancellationToken::new();
        self.cancel = Some(token.clone());
        let targets = self.targets.clone();

        tokio::spawn(async move {
            let resolve_all = async {
                for target in &targets {
                    match tokio::net::lookup_host(target.as_str()).await {
                        Ok(addrs) => {
                            debug!(host = %target, addresses = addrs.count(), "pre-resolved")
                        }
                        Err(e) => warn!(host = %target, error = %e, "pre-resolution failed"),
                    }
                }
                notify.done();
            };

            tokio::select! {
                _ = token.cancelled() => {}
                _ = resolve_all => {}
            }
        });
    }

    fn cancel(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connect::remote::Remote;

    #[test]
    fn test_ip_literals_need_no_resolution() {
        let remotes = RemoteList::new(vec![
            Remote::new("192.0.2.10", 1194),
            Remote::new("2001:db8::1", 1194),
        ]);
        let resolver = DnsPreResolver::new(&remotes);
        assert!(!resolver.work_available());
    }

    #[test]
    fn test_hostnames_need_resolution() {
        let remotes = RemoteList::new(vec![
            Remote::new("192.0.2.10", 1194),
            Remote::new("vpn.example.com", 1194),
        ]);
        let resolver = DnsPreResolver::new(&remotes);
        assert!(resolver.work_available());
    }

    #[test]
    fn test_cancel_is_safe_when_never_started() {
        let remotes = RemoteList::new(vec![Remote::new("vpn.example.com", 1194)]);
        let mut resolver = DnsPreResolver::new(&remotes);
        resolver.cancel();
        resolver.cancel();
    }
}
