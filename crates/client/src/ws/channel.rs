//! Logical channel multiplexed over a [`Connection`].

use chatlink_shared::{ChannelFrame, InboundEvent};

use super::connection::Connection;
use super::SocketError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Closed,
    Joining,
    Joined,
    /// The server rejected the join or dropped the channel
    Errored,
}

/// What a frame meant for the channel.
#[derive(Debug, PartialEq)]
pub enum ChannelUpdate {
    Joined,
    JoinRejected(String),
    /// `phx_error` / `phx_close` from the server
    Failed(String),
    Event(InboundEvent),
    Ignored,
}

/// Subscription to one topic. Lives only as long as the connection that
/// joined it.
#[derive(Debug)]
pub struct Channel {
    topic: String,
    state: ChannelState,
    /// Ref of the most recent join; replies and lifecycle frames carry it.
    join_ref: Option<String>,
}

impl Channel {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            state: ChannelState::Closed,
            join_ref: None,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn is_joined(&self) -> bool {
        self.state == ChannelState::Joined
    }

    /// A join was sent and has not been answered yet.
    pub fn is_joining(&self) -> bool {
        self.state == ChannelState::Joining
    }

    /// Send a join request over `connection`.
    pub fn join(&mut self, connection: &Connection) -> Result<(), SocketError> {
        let reference = connection.make_ref();
        connection.push(ChannelFrame::join(&self.topic, &reference))?;
        crate::log_debug!("Joining {} (ref {})", self.topic, reference);
        self.join_ref = Some(reference);
        self.state = ChannelState::Joining;
        Ok(())
    }

    /// Route one inbound frame.
    pub fn handle(&mut self, frame: ChannelFrame) -> ChannelUpdate {
        if frame.topic != self.topic {
            crate::log_debug!("Ignoring frame for foreign topic {}", frame.topic);
            return ChannelUpdate::Ignored;
        }

        if let Some(reply) = frame.reply() {
            if self.state != ChannelState::Joining
                || frame.reference.is_none()
                || frame.reference != self.join_ref
            {
                return ChannelUpdate::Ignored;
            }
            if reply.is_ok() {
                self.state = ChannelState::Joined;
                return ChannelUpdate::Joined;
            }
            self.state = ChannelState::Errored;
            return ChannelUpdate::JoinRejected(reply.response.to_string());
        }

        if frame.is_channel_failure() {
            // lifecycle frames name the join they belong to
            if frame.reference.is_some() && frame.reference != self.join_ref {
                crate::log_debug!(
                    "Ignoring {} for superseded join {:?}",
                    frame.event,
                    frame.reference
                );
                return ChannelUpdate::Ignored;
            }
            if self.state == ChannelState::Errored {
                return ChannelUpdate::Ignored;
            }
            self.state = ChannelState::Errored;
            return ChannelUpdate::Failed(frame.event);
        }

        if !self.is_joined() {
            crate::log_debug!(
                "Ignoring {} on {} before join completed",
                frame.event,
                self.topic
            );
            return ChannelUpdate::Ignored;
        }

        ChannelUpdate::Event(InboundEvent::from_frame(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatlink_shared::EVENT_REPLY;
    use serde_json::json;

    fn joining_channel() -> Channel {
        Channel {
            topic: "user:42".to_string(),
            state: ChannelState::Joining,
            join_ref: Some("1".to_string()),
        }
    }

    fn reply(reference: &str, status: &str) -> ChannelFrame {
        ChannelFrame::new(
            "user:42",
            EVENT_REPLY,
            json!({"status": status, "response": {}}),
        )
        .with_ref(reference)
    }

    #[test]
    fn ok_reply_to_join_ref_joins() {
        let mut channel = joining_channel();
        assert_eq!(channel.handle(reply("1", "ok")), ChannelUpdate::Joined);
        assert!(channel.is_joined());
    }

    #[test]
    fn reply_to_other_ref_is_ignored() {
        let mut channel = joining_channel();
        assert_eq!(channel.handle(reply("9", "ok")), ChannelUpdate::Ignored);
        assert_eq!(channel.state(), ChannelState::Joining);
    }

    #[test]
    fn error_reply_rejects() {
        let mut channel = joining_channel();
        assert!(matches!(
            channel.handle(reply("1", "error")),
            ChannelUpdate::JoinRejected(_)
        ));
        assert_eq!(channel.state(), ChannelState::Errored);
    }

    #[test]
    fn events_before_join_are_dropped() {
        let mut channel = joining_channel();
        let change = ChannelFrame::new("user:42", "change", json!({}));
        assert_eq!(channel.handle(change), ChannelUpdate::Ignored);
    }

    #[test]
    fn events_after_join_are_classified() {
        let mut channel = joining_channel();
        channel.handle(reply("1", "ok"));

        let change = ChannelFrame::new("user:42", "change", json!({"body": {}}));
        assert_eq!(
            channel.handle(change),
            ChannelUpdate::Event(InboundEvent::Change(json!({"body": {}})))
        );

        let foreign = ChannelFrame::new("user:7", "change", json!({}));
        assert_eq!(channel.handle(foreign), ChannelUpdate::Ignored);
    }

    #[test]
    fn server_error_marks_channel_errored() {
        let mut channel = joining_channel();
        channel.handle(reply("1", "ok"));
        let error = ChannelFrame::new("user:42", "phx_error", json!({}));
        assert_eq!(
            channel.handle(error),
            ChannelUpdate::Failed("phx_error".to_string())
        );
        assert!(!channel.is_joined());
    }

    #[test]
    fn failure_for_superseded_join_is_ignored() {
        let mut channel = joining_channel();
        channel.handle(reply("1", "ok"));

        let stale = ChannelFrame::new("user:42", "phx_close", json!({})).with_ref("0");
        assert_eq!(channel.handle(stale), ChannelUpdate::Ignored);
        assert!(channel.is_joined());

        let current = ChannelFrame::new("user:42", "phx_close", json!({})).with_ref("1");
        assert_eq!(
            channel.handle(current),
            ChannelUpdate::Failed("phx_close".to_string())
        );
    }

    #[test]
    fn repeated_failure_reports_once() {
        let mut channel = joining_channel();
        channel.handle(reply("1", "ok"));
        let error = ChannelFrame::new("user:42", "phx_error", json!({}));
        assert!(matches!(channel.handle(error.clone()), ChannelUpdate::Failed(_)));
        assert_eq!(channel.handle(error), ChannelUpdate::Ignored);
    }

    #[test]
    fn late_reply_after_join_is_ignored() {
        let mut channel = joining_channel();
        channel.handle(reply("1", "ok"));
        assert_eq!(channel.handle(reply("1", "error")), ChannelUpdate::Ignored);
        assert!(channel.is_joined());
    }
}
