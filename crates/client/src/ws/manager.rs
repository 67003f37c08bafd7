//! Realtime connection manager.
//!
//! A single actor task owns the [`Connection`] and its [`Channel`]. Commands
//! from [`SocketManager`] handles, lifecycle events from the session task,
//! retry timers and reachability edges all arrive on the actor's inboxes and
//! are handled one at a time, so no state here needs a lock.
//!
//! ```text
//! Idle ──connect──▶ Connecting ──opened──▶ Joining ──joined──▶ Live
//!                       ▲                                       │
//!                       │ reachable / edge          closed      ▼
//!                       └──────────────────────────── Disconnected
//! ```

use std::sync::Arc;
use std::time::Duration;

use chatlink_shared::{decode_change, ChangeEvent, InboundEvent, SessionCredentials};
use tokio::sync::{broadcast, mpsc, watch};

use super::channel::{Channel, ChannelUpdate};
use super::connection::{
    socket_url, Connection, ConnectionEvent, ConnectionId, TransportState,
};
use super::transport::{Connector, TransportError};
use crate::config::SocketConfig;
use crate::notifications::{Notification, NotificationBus};
use crate::reachability::ReachabilityMonitor;
use crate::session::SessionStore;

/// Lifecycle state of the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    /// No connection requested, or explicitly disconnected
    Idle,
    /// Transport handshake in flight (or a retry is scheduled)
    Connecting,
    /// Transport up, waiting for the channel join reply
    Joining,
    /// Channel joined; messages flow
    Live,
    /// Transport lost while the network is unreachable
    Disconnected,
}

#[derive(Debug)]
enum Command {
    Connect(SessionCredentials),
    Disconnect,
    Shutdown,
}

#[derive(Debug)]
enum Timer {
    Retry(ConnectionId),
    /// Rejoin the channel of one transport session
    Rejoin { id: ConnectionId, session: u64 },
}

/// Handle to the connection manager. Cheap to clone; construct once at
/// application start and hand it to whoever needs to connect.
#[derive(Clone)]
pub struct SocketManager {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ManagerState>,
}

impl SocketManager {
    /// Start the manager actor on the current tokio runtime.
    pub fn spawn(
        config: SocketConfig,
        connector: Arc<dyn Connector>,
        reachability: ReachabilityMonitor,
        bus: NotificationBus,
    ) -> Self {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (timers_tx, timers_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ManagerState::Idle);
        let regained = reachability.subscribe();

        let actor = ManagerActor {
            config,
            connector,
            reachability,
            bus,
            state: state_tx,
            events_tx,
            timers_tx,
            connection: None,
            channel: None,
            credentials: None,
            next_id: 0,
            session: 0,
            failed_attempts: 0,
            retry_pending: false,
            announced: false,
        };
        tokio::spawn(actor.run(commands_rx, events_rx, timers_rx, regained));

        Self { commands, state }
    }

    /// Connect with `credentials`, replacing any existing connection.
    ///
    /// Returns immediately; the outcome is published on the notification bus.
    /// Invalid credentials are logged and ignored.
    pub fn connect(&self, credentials: SessionCredentials) {
        self.send(Command::Connect(credentials));
    }

    /// Connect with whatever the session store holds. Does nothing if the
    /// auth flow has not completed.
    pub fn connect_from_store(&self, store: &dyn SessionStore) {
        match store.credentials() {
            Some(credentials) => self.connect(credentials),
            None => crate::log_info!("No session available, not connecting"),
        }
    }

    /// Tear down the connection. Reachability changes will not revive it.
    pub fn disconnect(&self) {
        self.send(Command::Disconnect);
    }

    /// Stop the actor and drop the connection.
    pub fn shutdown(&self) {
        self.send(Command::Shutdown);
    }

    pub fn state(&self) -> ManagerState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ManagerState> {
        self.state.clone()
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            crate::log_warn!("Socket manager is gone, command dropped");
        }
    }
}

struct ManagerActor {
    config: SocketConfig,
    connector: Arc<dyn Connector>,
    reachability: ReachabilityMonitor,
    bus: NotificationBus,
    state: watch::Sender<ManagerState>,
    events_tx: mpsc::UnboundedSender<ConnectionEvent>,
    timers_tx: mpsc::UnboundedSender<Timer>,
    connection: Option<Connection>,
    channel: Option<Channel>,
    credentials: Option<SessionCredentials>,
    next_id: u64,
    /// Bumped on every transport connect, so timers can tell sessions of
    /// the same connection apart
    session: u64,
    /// Consecutive attempts without a successful join
    failed_attempts: u32,
    retry_pending: bool,
    /// `SocketConnected` was published for the current transport session
    announced: bool,
}

impl ManagerActor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<ConnectionEvent>,
        mut timers: mpsc::UnboundedReceiver<Timer>,
        mut regained: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Connect(credentials)) => self.connect(credentials),
                    Some(Command::Disconnect) => self.disconnect(),
                    Some(Command::Shutdown) | None => break,
                },
                Some(event) = events.recv() => self.on_connection_event(event),
                Some(timer) = timers.recv() => self.on_timer(timer),
                edge = regained.recv() => match edge {
                    Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        self.on_reachability_regained()
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }

        if let Some(mut connection) = self.connection.take() {
            connection.disconnect();
        }
        crate::log_info!("Socket manager stopped");
    }

    fn connect(&mut self, credentials: SessionCredentials) {
        if let Err(e) = credentials.validate() {
            crate::log_warn!("Not connecting: {}", e);
            return;
        }
        self.reachability.start();
        self.teardown();

        let url = match socket_url(&self.config.url, &credentials.session_token) {
            Ok(url) => url,
            Err(e) => {
                crate::log_error!("Not connecting: {}", e);
                self.set_state(ManagerState::Idle);
                return;
            }
        };

        self.next_id += 1;
        let mut connection = Connection::new(
            ConnectionId(self.next_id),
            url,
            self.config.heartbeat_interval,
        );
        connection.connect(self.connector.clone(), self.events_tx.clone());

        self.connection = Some(connection);
        self.credentials = Some(credentials);
        self.failed_attempts = 0;
        self.set_state(ManagerState::Connecting);
    }

    fn disconnect(&mut self) {
        if self.connection.is_none() {
            crate::log_debug!("Disconnect requested with no connection");
            return;
        }
        self.teardown();
        self.credentials = None;
        self.set_state(ManagerState::Idle);
    }

    /// Discard the current connection and channel. Publishes
    /// `SocketDisconnected` if the transport was up.
    fn teardown(&mut self) {
        let Some(mut connection) = self.connection.take() else {
            return;
        };
        let was_connected = connection.state().is_connected();
        connection.disconnect();
        self.channel = None;
        self.announced = false;
        self.retry_pending = false;
        if was_connected {
            self.bus.publish(Notification::SocketDisconnected);
        }
    }

    fn current_id(&self) -> Option<ConnectionId> {
        self.connection.as_ref().map(Connection::id)
    }

    fn on_connection_event(&mut self, event: ConnectionEvent) {
        let id = event.id();
        if self.current_id() != Some(id) {
            crate::log_debug!("Ignoring event from discarded {}", id);
            return;
        }

        match event {
            ConnectionEvent::Opened { .. } => self.on_transport_connect(),
            ConnectionEvent::Frame { frame, .. } => self.on_frame(id, frame),
            ConnectionEvent::Closed { error, .. } => self.on_transport_disconnect(id, error),
        }
    }

    fn on_transport_connect(&mut self) {
        let (Some(connection), Some(credentials)) =
            (self.connection.as_mut(), self.credentials.as_ref())
        else {
            return;
        };
        connection.set_state(TransportState::Connected);
        self.session += 1;

        let mut channel = Channel::new(credentials.channel_topic());
        if let Err(e) = channel.join(connection) {
            crate::log_error!("Channel join for {} failed: {}", channel.topic(), e);
        }
        self.channel = Some(channel);
        self.set_state(ManagerState::Joining);
    }

    fn on_frame(&mut self, id: ConnectionId, frame: chatlink_shared::ChannelFrame) {
        let Some(channel) = self.channel.as_mut() else {
            crate::log_debug!("Ignoring {} with no channel", frame.event);
            return;
        };

        match channel.handle(frame) {
            ChannelUpdate::Joined => {
                crate::log_info!("Joined {}", channel.topic());
                self.failed_attempts = 0;
                self.set_state(ManagerState::Live);
                if !self.announced {
                    self.announced = true;
                    self.bus.publish(Notification::SocketConnected);
                }
            }
            ChannelUpdate::JoinRejected(reason) => {
                crate::log_warn!("Join of {} rejected: {}", channel.topic(), reason);
                self.set_state(ManagerState::Joining);
                self.schedule(
                    Timer::Rejoin {
                        id,
                        session: self.session,
                    },
                    self.config.rejoin_delay,
                );
            }
            ChannelUpdate::Failed(event) => {
                crate::log_warn!("Channel {} dropped by server ({})", channel.topic(), event);
                self.set_state(ManagerState::Joining);
                self.schedule(
                    Timer::Rejoin {
                        id,
                        session: self.session,
                    },
                    self.config.rejoin_delay,
                );
            }
            ChannelUpdate::Event(InboundEvent::Change(payload)) => match decode_change(&payload) {
                Ok(ChangeEvent::Message(message)) => {
                    crate::log_debug!("New message {} from {}", message.id, message.author_id);
                    self.bus.publish(Notification::NewMessageReceived(message));
                }
                Ok(ChangeEvent::Unsupported { kind }) => {
                    crate::log_debug!("Ignoring unknown event type {:?}", kind);
                }
                Err(e) => crate::log_warn!("Ignoring change event: {}", e),
            },
            ChannelUpdate::Event(InboundEvent::Other(name)) => {
                crate::log_debug!("Ignoring unhandled event {}", name);
            }
            ChannelUpdate::Ignored => {}
        }
    }

    fn on_transport_disconnect(&mut self, id: ConnectionId, error: Option<TransportError>) {
        match &error {
            Some(e) => crate::log_warn!("{} disconnected: {}", id, e),
            None => crate::log_info!("{} disconnected", id),
        }
        if let Some(connection) = self.connection.as_mut() {
            connection.set_state(TransportState::Disconnected);
        }
        self.channel = None;
        self.announced = false;
        self.set_state(ManagerState::Disconnected);
        self.bus.publish(Notification::SocketDisconnected);

        if !self.reachability.is_reachable() {
            crate::log_info!("Network unreachable, waiting for it to return");
            return;
        }

        let delay = self.config.reconnect.delay_for_attempt(self.failed_attempts);
        self.failed_attempts = self.failed_attempts.saturating_add(1);
        if delay.is_zero() {
            self.reconnect();
        } else {
            crate::log_info!("Reconnecting {} in {:?}", id, delay);
            self.retry_pending = true;
            self.set_state(ManagerState::Connecting);
            self.schedule(Timer::Retry(id), delay);
        }
    }

    fn on_reachability_regained(&mut self) {
        let Some(connection) = self.connection.as_ref() else {
            return;
        };
        if connection.state().is_active() || self.retry_pending {
            crate::log_debug!("Network regained, {} already {:?}", connection.id(), connection.state());
            return;
        }
        crate::log_info!("Network regained, reconnecting {}", connection.id());
        self.reconnect();
    }

    fn on_timer(&mut self, timer: Timer) {
        match timer {
            Timer::Retry(id) if self.current_id() == Some(id) => {
                self.retry_pending = false;
                if self.reachability.is_reachable() {
                    self.reconnect();
                } else {
                    crate::log_info!("Network unreachable, waiting for it to return");
                    self.set_state(ManagerState::Disconnected);
                }
            }
            Timer::Rejoin { id, session }
                if self.current_id() == Some(id) && self.session == session =>
            {
                let (Some(connection), Some(channel)) =
                    (self.connection.as_ref(), self.channel.as_mut())
                else {
                    return;
                };
                if !connection.state().is_connected()
                    || channel.is_joined()
                    || channel.is_joining()
                {
                    return;
                }
                if let Err(e) = channel.join(connection) {
                    crate::log_error!("Channel rejoin for {} failed: {}", channel.topic(), e);
                }
            }
            stale => crate::log_debug!("Ignoring stale timer {:?}", stale),
        }
    }

    /// Start a new attempt on the current connection.
    fn reconnect(&mut self) {
        let Some(connection) = self.connection.as_mut() else {
            return;
        };
        connection.connect(self.connector.clone(), self.events_tx.clone());
        self.set_state(ManagerState::Connecting);
    }

    fn schedule(&self, timer: Timer, delay: Duration) {
        let timers = self.timers_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = timers.send(timer);
        });
    }

    fn set_state(&self, next: ManagerState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            crate::log_debug!("Socket manager: {:?} -> {:?}", previous, next);
        }
    }
}
