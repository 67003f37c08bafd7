//! Shared data models for the chat backend and the realtime client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Identity ---

/// Credentials for one realtime connection attempt.
///
/// Supplied by the host application's auth flow. A new value replaces any
/// connection that is already in flight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionCredentials {
    pub session_token: String,
    pub user_id: i64,
}

impl SessionCredentials {
    pub fn new(session_token: impl Into<String>, user_id: i64) -> Self {
        Self {
            session_token: session_token.into(),
            user_id,
        }
    }

    /// Check that the credentials are usable for a connect attempt.
    pub fn validate(&self) -> Result<(), CredentialsError> {
        if self.session_token.trim().is_empty() {
            return Err(CredentialsError::MissingToken);
        }
        if self.user_id <= 0 {
            return Err(CredentialsError::InvalidUserId(self.user_id));
        }
        Ok(())
    }

    /// Topic of the per-user channel, `user:<id>`.
    pub fn channel_topic(&self) -> String {
        format!("user:{}", self.user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialsError {
    #[error("session token is empty")]
    MissingToken,
    #[error("invalid user id {0}")]
    InvalidUserId(i64),
}

// --- Messaging ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorType {
    User,
    Contact,
    Robot,
    #[serde(other)]
    Unknown,
}

/// One chat message as delivered by the realtime channel.
///
/// The wire has carried the message body as both `text` and `body`; when a
/// payload has both, `text` wins. A `null` attachment list reads as empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", from = "WireMessage")]
pub struct Message {
    pub id: i64,
    pub author_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub author_type: Option<AuthorType>,
    /// Milliseconds since the epoch on the wire.
    #[serde(
        serialize_with = "chrono::serde::ts_milliseconds_option::serialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    pub attachments: Vec<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    id: i64,
    author_id: i64,
    #[serde(default)]
    conversation_id: Option<i64>,
    #[serde(default)]
    org_id: Option<i64>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(rename = "type", default)]
    author_type: Option<AuthorType>,
    #[serde(
        default,
        deserialize_with = "chrono::serde::ts_milliseconds_option::deserialize"
    )]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    attachments: Option<Vec<i64>>,
}

impl From<WireMessage> for Message {
    fn from(wire: WireMessage) -> Self {
        Self {
            id: wire.id,
            author_id: wire.author_id,
            conversation_id: wire.conversation_id,
            org_id: wire.org_id,
            text: wire.text.or(wire.body),
            content_type: wire.content_type,
            author_type: wire.author_type,
            created_at: wire.created_at,
            attachments: wire.attachments.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn credentials_validation() {
        assert!(SessionCredentials::new("abc", 42).validate().is_ok());
        assert_eq!(
            SessionCredentials::new("  ", 42).validate(),
            Err(CredentialsError::MissingToken)
        );
        assert_eq!(
            SessionCredentials::new("abc", 0).validate(),
            Err(CredentialsError::InvalidUserId(0))
        );
    }

    #[test]
    fn channel_topic_uses_user_id_verbatim() {
        assert_eq!(SessionCredentials::new("abc", 42).channel_topic(), "user:42");
    }

    #[test]
    fn minimal_message_decodes() {
        let msg: Message =
            serde_json::from_value(json!({"id": 1, "authorId": 7, "text": "hi"})).unwrap();
        assert_eq!(msg.id, 1);
        assert_eq!(msg.author_id, 7);
        assert_eq!(msg.text.as_deref(), Some("hi"));
        assert!(msg.attachments.is_empty());
        assert!(msg.created_at.is_none());
    }

    #[test]
    fn full_message_decodes() {
        let msg: Message = serde_json::from_value(json!({
            "id": 99,
            "authorId": 7,
            "conversationId": 1234,
            "orgId": 5,
            "body": "<p>hello</p>",
            "contentType": "CHAT",
            "type": "ROBOT",
            "createdAt": 1_496_232_000_000_i64,
            "attachments": [3, 4],
            "somethingNew": true
        }))
        .unwrap();

        assert_eq!(msg.conversation_id, Some(1234));
        assert_eq!(msg.text.as_deref(), Some("<p>hello</p>"));
        assert_eq!(msg.author_type, Some(AuthorType::Robot));
        assert_eq!(msg.created_at.unwrap().timestamp_millis(), 1_496_232_000_000);
        assert_eq!(msg.attachments, vec![3, 4]);
    }

    #[test]
    fn unknown_author_type_is_tolerated() {
        let msg: Message =
            serde_json::from_value(json!({"id": 1, "authorId": 7, "type": "ALIEN"})).unwrap();
        assert_eq!(msg.author_type, Some(AuthorType::Unknown));
    }

    #[test]
    fn text_wins_over_body() {
        let msg: Message = serde_json::from_value(json!({
            "id": 1,
            "authorId": 7,
            "body": "<p>hi</p>",
            "text": "hi"
        }))
        .unwrap();
        assert_eq!(msg.text.as_deref(), Some("hi"));
    }

    #[test]
    fn null_optionals_are_tolerated() {
        let msg: Message = serde_json::from_value(json!({
            "id": 1,
            "authorId": 7,
            "text": null,
            "createdAt": null,
            "attachments": null
        }))
        .unwrap();
        assert!(msg.text.is_none());
        assert!(msg.created_at.is_none());
        assert!(msg.attachments.is_empty());
    }

    #[test]
    fn serialized_message_reads_back() {
        let msg: Message = serde_json::from_value(json!({
            "id": 5,
            "authorId": 7,
            "body": "hello",
            "createdAt": 1_496_232_000_000_i64
        }))
        .unwrap();
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["text"], "hello");
        assert_eq!(value["createdAt"], 1_496_232_000_000_i64);
        assert_eq!(serde_json::from_value::<Message>(value).unwrap(), msg);
    }

    #[test]
    fn missing_author_is_rejected() {
        assert!(serde_json::from_value::<Message>(json!({"id": 1, "text": "hi"})).is_err());
    }
}
