//! Network reachability monitor.
//!
//! Tracks whether the backend is reachable and fires an edge signal exactly
//! once per transition into [`NetworkStatus::Reachable`]. Steady-state polls
//! and transitions out of reachable never fire it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{broadcast, watch};

use crate::config::ProbeTarget;

const MAX_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const MIN_PROBE_INTERVAL: Duration = Duration::from_millis(100);
const EDGE_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    /// Nothing observed yet
    Unknown,
    Unreachable,
    Reachable,
}

/// Shared handle to the process-wide reachability state.
#[derive(Clone)]
pub struct ReachabilityMonitor {
    inner: Arc<Inner>,
}

struct Inner {
    status: watch::Sender<NetworkStatus>,
    regained: broadcast::Sender<()>,
    started: AtomicBool,
    probe: ProbeTarget,
}

impl ReachabilityMonitor {
    pub fn new(probe: ProbeTarget) -> Self {
        let (status, _) = watch::channel(NetworkStatus::Unknown);
        let (regained, _) = broadcast::channel(EDGE_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                status,
                regained,
                started: AtomicBool::new(false),
                probe,
            }),
        }
    }

    /// Monitor without active probing; status comes from [`set_status`](Self::set_status).
    pub fn manual() -> Self {
        Self::new(ProbeTarget::Disabled)
    }

    /// Begin observing. Safe to call any number of times; only the first call
    /// starts the probe task, which then runs for the life of the process.
    ///
    /// Must be called from within a tokio runtime when a probe is configured.
    pub fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return;
        }
        match &self.inner.probe {
            ProbeTarget::Tcp { addr, interval } => {
                crate::log_info!("Reachability: probing {} every {:?}", addr, interval);
                tokio::spawn(run_probe(self.clone(), addr.clone(), *interval));
            }
            ProbeTarget::Disabled => {
                crate::log_debug!("Reachability: started without probe");
            }
        }
    }

    pub fn status(&self) -> NetworkStatus {
        *self.inner.status.borrow()
    }

    pub fn is_reachable(&self) -> bool {
        self.status() == NetworkStatus::Reachable
    }

    /// Record an observation. Returns `true` if this fired the regained edge.
    pub fn set_status(&self, next: NetworkStatus) -> bool {
        let mut edge = false;
        self.inner.status.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            edge = next == NetworkStatus::Reachable;
            *current = next;
            true
        });

        if edge {
            crate::log_info!("Reachability: network became reachable");
            // no subscribers is fine
            let _ = self.inner.regained.send(());
        } else {
            crate::log_trace!("Reachability: status {:?}", next);
        }
        edge
    }

    /// Receive one `()` per unreachable-to-reachable transition.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.inner.regained.subscribe()
    }

    pub fn watch(&self) -> watch::Receiver<NetworkStatus> {
        self.inner.status.subscribe()
    }
}

async fn run_probe(monitor: ReachabilityMonitor, addr: String, interval: Duration) {
    let interval = interval.max(MIN_PROBE_INTERVAL);
    let timeout = interval.min(MAX_PROBE_TIMEOUT);
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let status = probe_once(&addr, timeout).await;
        monitor.set_status(status);
    }
}

async fn probe_once(addr: &str, timeout: Duration) -> NetworkStatus {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_)) => NetworkStatus::Reachable,
        Ok(Err(e)) => {
            crate::log_debug!("Reachability probe to {} failed: {}", addr, e);
            NetworkStatus::Unreachable
        }
        Err(_) => {
            crate::log_debug!("Reachability probe to {} timed out", addr);
            NetworkStatus::Unreachable
        }
    }
}
