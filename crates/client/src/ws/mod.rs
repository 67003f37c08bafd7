//! Realtime socket layer.
//!
//! This module provides:
//! - A transport [`Connection`] with lifecycle events and heartbeats
//! - The per-user [`Channel`] multiplexed over it
//! - The [`SocketManager`] actor that reconnects and republishes events
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐    regained edge   ┌───────────────────────┐
//! │ ReachabilityMonitor │ ─────────────────▶ │     SocketManager     │
//! └─────────────────────┘                    │ (single-owner actor)  │
//!                                            └───────────────────────┘
//!                                              │ owns          ▲ ConnectionEvent
//!                                              ▼               │
//!                                   ┌────────────┐      ┌────────────┐
//!                                   │ Connection │ ───▶ │  session   │
//!                                   │ + Channel  │      │   task     │
//!                                   └────────────┘      └────────────┘
//!                                              │
//!                                              ▼ publish
//!                                   ┌─────────────────────┐
//!                                   │   NotificationBus   │
//!                                   └─────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let bus = NotificationBus::new();
//! let reachability = ReachabilityMonitor::new(config.probe.clone());
//! let manager = SocketManager::spawn(config, Arc::new(WsConnector), reachability, bus.clone());
//!
//! let mut rx = bus.subscribe();
//! manager.connect(SessionCredentials::new(token, user_id));
//! while let Ok(notification) = rx.recv().await {
//!     // update stores / UI
//! }
//! ```

use thiserror::Error;

mod channel;
mod connection;
mod manager;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use channel::{Channel, ChannelState, ChannelUpdate};
pub use connection::{
    socket_url, Connection, ConnectionEvent, ConnectionId, ReconnectConfig, TransportState,
};
pub use manager::{ManagerState, SocketManager};
pub use transport::{Connector, FrameSink, FrameStream, TransportError, WsConnector};

/// Errors from local socket operations. Transport failures are reported as
/// lifecycle events instead.
#[derive(Debug, Error)]
pub enum SocketError {
    #[error("invalid socket url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("connection is not running")]
    NotConnected,
}
