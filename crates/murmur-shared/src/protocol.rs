//! Live-channel wire protocol.
//!
//! Every frame is a JSON text message of the shape
//! `{ "event": "<name>", "data": <payload> }`. Event names and payload keys
//! are kept stable for existing web clients (camelCase, `_id` identifiers).
//!
//! Inbound frames are decoded into [`ClientEvent`] and validated before they
//! reach any handler; a frame that fails validation never causes a state
//! change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::MAX_MESSAGE_CHARS;
use crate::error::ProtocolError;
use crate::types::{GroupId, MessageId, NotificationId, NotificationKind, NotificationMetadata, UserId};

// ---------------------------------------------------------------------------
// Client -> server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Join the broadcast room of each listed group. Idempotent.
    JoinGroups(Vec<GroupId>),

    /// Send a direct or group message.
    SendMessage(SendMessage),

    /// Flip the read flag on the caller's own notifications.
    MarkNotificationsRead(Vec<NotificationId>),
}

impl ClientEvent {
    /// Decode and validate one inbound text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let event: ClientEvent = serde_json::from_str(text)?;
        event.validate()?;
        Ok(event)
    }

    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            ClientEvent::SendMessage(send) => send.message.validate(),
            ClientEvent::JoinGroups(_) | ClientEvent::MarkNotificationsRead(_) => Ok(()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinGroups(_) => "join-groups",
            ClientEvent::SendMessage(_) => "send-message",
            ClientEvent::MarkNotificationsRead(_) => "mark-notifications-read",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    /// Recipient user id, or group id when `is_group` is set.
    pub to: Uuid,
    pub message: MessageDraft,
    #[serde(default)]
    pub is_group: bool,
    /// Conversation the recipient is believed to have open. A hint only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_chat_user_id: Option<String>,
}

/// Where a message is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    User(UserId),
    Group(GroupId),
}

impl SendMessage {
    pub fn recipient(&self) -> Recipient {
        if self.is_group {
            Recipient::Group(GroupId(self.to))
        } else {
            Recipient::User(UserId(self.to))
        }
    }

    /// The active-chat hint, if it names a well-formed id. Garbage hints are
    /// ignored rather than rejected since the field is advisory.
    pub fn active_chat_hint(&self) -> Option<Uuid> {
        self.active_chat_user_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
    }
}

/// Body of a message as submitted by a client.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MessageDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl MessageDraft {
    /// Blank text or image references count as absent.
    pub fn normalized(&self) -> MessageDraft {
        fn non_blank(v: &Option<String>) -> Option<String> {
            v.as_ref().filter(|s| !s.trim().is_empty()).cloned()
        }
        MessageDraft {
            text: non_blank(&self.text),
            image: non_blank(&self.image),
        }
    }

    pub fn validate(&self) -> Result<(), ProtocolError> {
        let draft = self.normalized();
        if draft.text.is_none() && draft.image.is_none() {
            return Err(ProtocolError::MissingField("message.text or message.image"));
        }
        if let Some(text) = &draft.text {
            let len = text.chars().count();
            if len > MAX_MESSAGE_CHARS {
                return Err(ProtocolError::InvalidField {
                    field: "message.text",
                    reason: format!("{len} chars exceeds limit of {MAX_MESSAGE_CHARS}"),
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Server -> client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Full set of currently connected identities.
    OnlineUsers(Vec<UserId>),

    ReceiveMessage(ReceiveMessage),

    Notification(NotificationPayload),

    NotificationsMarkedRead(Vec<NotificationId>),

    AllNotificationsMarkedRead,

    NotificationDeleted(NotificationId),

    /// Failure of an inbound event, sent to the originating session only.
    Error(ErrorPayload),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::OnlineUsers(_) => "online-users",
            ServerEvent::ReceiveMessage(_) => "receive-message",
            ServerEvent::Notification(_) => "notification",
            ServerEvent::NotificationsMarkedRead(_) => "notifications-marked-read",
            ServerEvent::AllNotificationsMarkedRead => "all-notifications-marked-read",
            ServerEvent::NotificationDeleted(_) => "notification-deleted",
            ServerEvent::Error(_) => "error",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveMessage {
    pub from: UserId,
    pub message: MessagePayload,
    pub is_group: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    #[serde(rename = "_id")]
    pub id: MessageId,
    pub sender_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub is_group: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    #[serde(rename = "_id")]
    pub id: NotificationId,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub content: String,
    pub is_read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_id: Option<Uuid>,
    #[serde(default)]
    pub metadata: NotificationMetadata,
    pub sender: UserSummary,
    pub created_at: DateTime<Utc>,
}

/// Public face of a user as embedded in payloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub profile_pic: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_send_message() {
        let to = Uuid::new_v4();
        let frame = json!({
            "event": "send-message",
            "data": {
                "to": to,
                "message": { "text": "hi there", "_id": "ignored-client-field" },
                "isGroup": false,
                "activeChatUserId": ""
            }
        });

        let event = ClientEvent::parse(&frame.to_string()).unwrap();
        let ClientEvent::SendMessage(send) = event else {
            panic!("expected send-message");
        };
        assert_eq!(send.recipient(), Recipient::User(UserId(to)));
        assert_eq!(send.message.text.as_deref(), Some("hi there"));
        assert_eq!(send.active_chat_hint(), None);
    }

    #[test]
    fn test_send_message_requires_body() {
        let frame = json!({
            "event": "send-message",
            "data": { "to": Uuid::new_v4(), "message": { "text": "   " } }
        });
        assert!(matches!(
            ClientEvent::parse(&frame.to_string()),
            Err(ProtocolError::MissingField(_))
        ));
    }

    #[test]
    fn test_send_message_rejects_oversized_text() {
        let frame = json!({
            "event": "send-message",
            "data": {
                "to": Uuid::new_v4(),
                "message": { "text": "x".repeat(MAX_MESSAGE_CHARS + 1) }
            }
        });
        assert!(matches!(
            ClientEvent::parse(&frame.to_string()),
            Err(ProtocolError::InvalidField { field: "message.text", .. })
        ));
    }

    #[test]
    fn test_unknown_event_and_bad_ids_are_malformed() {
        let unknown = json!({ "event": "drop-tables", "data": [] });
        assert!(matches!(
            ClientEvent::parse(&unknown.to_string()),
            Err(ProtocolError::Malformed(_))
        ));

        let bad_ids = json!({ "event": "join-groups", "data": ["nope"] });
        assert!(matches!(
            ClientEvent::parse(&bad_ids.to_string()),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn test_image_only_message_is_valid() {
        let frame = json!({
            "event": "send-message",
            "data": {
                "to": Uuid::new_v4(),
                "message": { "image": "https://cdn.example/cat.png" },
                "isGroup": true
            }
        });
        let event = ClientEvent::parse(&frame.to_string()).unwrap();
        assert!(matches!(
            event,
            ClientEvent::SendMessage(SendMessage { is_group: true, .. })
        ));
    }

    #[test]
    fn test_notification_wire_shape() {
        let sender = UserSummary {
            id: UserId::new(),
            username: "ada".into(),
            profile_pic: String::new(),
        };
        let event = ServerEvent::Notification(NotificationPayload {
            id: NotificationId::new(),
            kind: NotificationKind::FriendRequest,
            content: "ada sent you a friend request".into(),
            is_read: false,
            related_id: None,
            metadata: NotificationMetadata::default(),
            sender,
            created_at: Utc::now(),
        });

        let value: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(value["event"], "notification");
        let data = &value["data"];
        for key in ["_id", "type", "content", "isRead", "metadata", "sender", "createdAt"] {
            assert!(data.get(key).is_some(), "missing {key}");
        }
        assert_eq!(data["type"], "friend_request");
        assert!(data["sender"].get("profilePic").is_some());
    }

    #[test]
    fn test_unit_ack_has_no_data() {
        let json = ServerEvent::AllNotificationsMarkedRead.to_json().unwrap();
        assert_eq!(json, r#"{"event":"all-notifications-marked-read"}"#);
    }
}
