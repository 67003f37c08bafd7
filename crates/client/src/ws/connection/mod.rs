//! Transport-level connection with lifecycle events.
//!
//! A [`Connection`] owns at most one running session task. The task reports
//! back through [`ConnectionEvent`]s tagged with the connection's id, so the
//! owner can tell events of a discarded connection apart from current ones.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chatlink_shared::{ChannelFrame, SESSION_TOKEN_PARAM};
use futures_channel::mpsc::{unbounded, UnboundedSender};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

use super::transport::{Connector, TransportError};
use super::SocketError;

mod session;

/// Identity of one [`Connection`] instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Transport state of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Disconnected,
    Connecting,
    Connected,
}

impl TransportState {
    pub fn is_connected(&self) -> bool {
        matches!(self, TransportState::Connected)
    }

    /// Connected, or an attempt is in flight.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            TransportState::Connecting | TransportState::Connected
        )
    }
}

/// Lifecycle events reported by a connection's session task
#[derive(Debug)]
pub enum ConnectionEvent {
    /// The transport handshake completed
    Opened { id: ConnectionId },
    /// A frame arrived (heartbeat replies are consumed by the session)
    Frame { id: ConnectionId, frame: ChannelFrame },
    /// The transport ended. `error` is `None` for a clean close.
    Closed {
        id: ConnectionId,
        error: Option<TransportError>,
    },
}

impl ConnectionEvent {
    pub fn id(&self) -> ConnectionId {
        match self {
            ConnectionEvent::Opened { id }
            | ConnectionEvent::Frame { id, .. }
            | ConnectionEvent::Closed { id, .. } => *id,
        }
    }
}

/// Configuration for reconnect pacing
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the second consecutive attempt, in milliseconds
    pub initial_delay_ms: u32,
    /// Maximum delay in milliseconds
    pub max_delay_ms: u32,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 1.5,
        }
    }
}

impl ReconnectConfig {
    /// Delay before retry number `attempt` (0-based, counting consecutive
    /// failures). The first retry is immediate.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exponent = (attempt - 1).min(32) as i32;
        let delay = self.initial_delay_ms as f32 * self.backoff_multiplier.powi(exponent);
        Duration::from_millis((delay as u64).min(self.max_delay_ms as u64))
    }
}

/// Build the socket URL with the session token as a query parameter.
pub fn socket_url(endpoint: &str, session_token: &str) -> Result<Url, SocketError> {
    let mut url = Url::parse(endpoint)?;
    url.query_pairs_mut()
        .append_pair(SESSION_TOKEN_PARAM, session_token);
    Ok(url)
}

/// A single transport connection to the backend.
pub struct Connection {
    id: ConnectionId,
    url: Url,
    state: TransportState,
    heartbeat_interval: Duration,
    refs: Arc<AtomicU64>,
    outbound: Option<UnboundedSender<ChannelFrame>>,
    task: Option<JoinHandle<()>>,
}

impl Connection {
    pub fn new(id: ConnectionId, url: Url, heartbeat_interval: Duration) -> Self {
        Self {
            id,
            url,
            state: TransportState::Disconnected,
            heartbeat_interval,
            refs: Arc::new(AtomicU64::new(0)),
            outbound: None,
            task: None,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Record a state reported by the session task.
    pub fn set_state(&mut self, state: TransportState) {
        self.state = state;
    }

    /// Next message ref, unique for this connection.
    pub fn make_ref(&self) -> String {
        next_ref(&self.refs)
    }

    /// Start a session task unless one is already connecting or connected.
    ///
    /// The outcome arrives on `events` as [`ConnectionEvent::Opened`] or
    /// [`ConnectionEvent::Closed`].
    pub fn connect(
        &mut self,
        connector: Arc<dyn Connector>,
        events: mpsc::UnboundedSender<ConnectionEvent>,
    ) {
        if self.state.is_active() {
            crate::log_debug!("{}: connect ignored, already {:?}", self.id, self.state);
            return;
        }
        self.stop_task();

        let (outbound, outbound_rx) = unbounded();
        self.outbound = Some(outbound);
        self.state = TransportState::Connecting;

        crate::log_info!("{}: connecting to {}", self.id, redacted(&self.url));
        self.task = Some(tokio::spawn(session::run_session(
            session::SessionParams {
                id: self.id,
                url: self.url.clone(),
                connector,
                heartbeat_interval: self.heartbeat_interval,
                refs: self.refs.clone(),
            },
            outbound_rx,
            events,
        )));
    }

    /// Queue a frame for the running session.
    pub fn push(&self, frame: ChannelFrame) -> Result<(), SocketError> {
        let sender = self.outbound.as_ref().ok_or(SocketError::NotConnected)?;
        sender
            .unbounded_send(frame)
            .map_err(|_| SocketError::NotConnected)
    }

    /// Tear down the session task. No lifecycle event is reported for it.
    pub fn disconnect(&mut self) {
        if self.task.is_some() {
            crate::log_info!("{}: disconnecting", self.id);
        }
        self.stop_task();
        self.state = TransportState::Disconnected;
    }

    fn stop_task(&mut self) {
        self.outbound = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.stop_task();
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("url", &redacted(&self.url))
            .field("state", &self.state)
            .finish()
    }
}

fn next_ref(refs: &AtomicU64) -> String {
    (refs.fetch_add(1, Ordering::Relaxed) + 1).to_string()
}

/// URL without its query, so session tokens stay out of logs.
fn redacted(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}
