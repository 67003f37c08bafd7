//! Notification bus for realtime events.
//!
//! The socket manager holds the sending side and publishes; UI layers and
//! stores subscribe and react. Publishing never waits for subscribers.

use chatlink_shared::Message;
use tokio::sync::broadcast;

const BUS_CAPACITY: usize = 256;

/// Events republished to the rest of the application
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// The user channel is joined and live
    SocketConnected,
    /// The transport dropped (or failed to connect)
    SocketDisconnected,
    /// A chat message arrived on the user channel
    NewMessageReceived(Message),
}

impl Notification {
    /// Stable identifier for this kind of notification.
    pub fn name(&self) -> &'static str {
        match self {
            Notification::SocketConnected => "chatlink.socket.connected",
            Notification::SocketDisconnected => "chatlink.socket.disconnected",
            Notification::NewMessageReceived(_) => "chatlink.message.new",
        }
    }
}

/// Many-to-many broadcast of [`Notification`]s.
#[derive(Clone)]
pub struct NotificationBus {
    sender: broadcast::Sender<Notification>,
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::with_capacity(BUS_CAPACITY)
    }

    /// Subscribers that fall more than `capacity` events behind lose the
    /// oldest ones.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Fire-and-forget publish.
    pub fn publish(&self, notification: Notification) {
        let name = notification.name();
        match self.sender.send(notification) {
            Ok(receivers) => crate::log_debug!("Published {} to {} subscriber(s)", name, receivers),
            Err(_) => crate::log_trace!("Published {} with no subscribers", name),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_gets_every_notification() {
        let bus = NotificationBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(Notification::SocketConnected);
        bus.publish(Notification::SocketDisconnected);

        for rx in [&mut a, &mut b] {
            assert_eq!(rx.try_recv().unwrap(), Notification::SocketConnected);
            assert_eq!(rx.try_recv().unwrap(), Notification::SocketDisconnected);
            assert!(rx.try_recv().is_err());
        }
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = NotificationBus::new();
        bus.publish(Notification::SocketConnected);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn names_are_distinct() {
        let msg: Message = serde_json::from_str(r#"{"id":1,"authorId":2}"#).unwrap();
        let names = [
            Notification::SocketConnected.name(),
            Notification::SocketDisconnected.name(),
            Notification::NewMessageReceived(msg).name(),
        ];
        assert_ne!(names[0], names[1]);
        assert_ne!(names[1], names[2]);
        assert_ne!(names[0], names[2]);
    }
}
