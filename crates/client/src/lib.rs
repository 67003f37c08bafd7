//! Chatlink Client - realtime connection for the chat widget
//!
//! Keeps one persistent socket to the chat backend, joins the user's
//! channel, recovers from network loss and server disconnects, and
//! republishes inbound events on a [`NotificationBus`].

pub mod config;
pub mod logging;
pub mod notifications;
pub mod reachability;
pub mod session;
pub mod ws;

pub use chatlink_shared::{Message, SessionCredentials};
pub use config::{ProbeTarget, SocketConfig};
pub use notifications::{Notification, NotificationBus};
pub use reachability::{NetworkStatus, ReachabilityMonitor};
pub use session::{FileSessionStore, SessionStore, StaticSession};
pub use ws::{ManagerState, SocketManager, WsConnector};
