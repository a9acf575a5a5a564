//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the HTTP layer.

use std::collections::BTreeSet;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use murmur_shared::constants::{IMAGE_ONLY_PREVIEW, PREVIEW_CHARS};
use murmur_shared::protocol::{MessageDraft, MessagePayload, NotificationPayload, UserSummary};
use murmur_shared::types::{
    GroupId, MessageId, NotificationId, NotificationKind, NotificationMetadata, UserId,
};

/// Current time at the precision the database keeps (microseconds), so a
/// record reads back exactly as it was written.
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub username: String,
    pub email: String,
    /// Avatar reference (URL); empty when unset.
    pub profile_pic: String,
    /// Symmetric: if `a.friends` holds `b`, `b.friends` holds `a`.
    pub friends: BTreeSet<UserId>,
    /// Requests received by this user, oldest first.
    pub friend_requests: Vec<FriendRequest>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: UserId::new(),
            username: username.into(),
            email: email.into(),
            profile_pic: String::new(),
            friends: BTreeSet::new(),
            friend_requests: Vec::new(),
            created_at: timestamp_now(),
        }
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
            profile_pic: self.profile_pic.clone(),
        }
    }

    pub fn is_friend(&self, other: &UserId) -> bool {
        self.friends.contains(other)
    }

    /// The request this user received from `from`, in any status.
    pub fn request_from(&self, from: &UserId) -> Option<&FriendRequest> {
        self.friend_requests.iter().find(|r| r.from == *from)
    }

    pub fn request_from_mut(&mut self, from: &UserId) -> Option<&mut FriendRequest> {
        self.friend_requests.iter_mut().find(|r| r.from == *from)
    }

    pub fn pending_request_from(&self, from: &UserId) -> Option<&FriendRequest> {
        self.request_from(from)
            .filter(|r| r.status == RequestStatus::Pending)
    }

    /// Drop every request (pending or declined) received from `from`.
    pub fn remove_requests_from(&mut self, from: &UserId) -> bool {
        let before = self.friend_requests.len();
        self.friend_requests.retain(|r| r.from != *from);
        before != self.friend_requests.len()
    }
}

/// A friend request as recorded on the recipient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequest {
    pub from: UserId,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub declined_at: Option<DateTime<Utc>>,
}

impl FriendRequest {
    pub fn pending(from: UserId) -> Self {
        Self {
            from,
            status: RequestStatus::Pending,
            created_at: timestamp_now(),
            declined_at: None,
        }
    }

    pub fn decline(&mut self, at: DateTime<Utc>) {
        self.status = RequestStatus::Declined;
        self.declined_at = Some(at);
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Declined,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Declined => "declined",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "declined" => Some(Self::Declined),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Group
// ---------------------------------------------------------------------------

/// A named set of members with an admin subset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    #[serde(rename = "_id")]
    pub id: GroupId,
    pub name: String,
    pub profile_pic: String,
    pub created_by: UserId,
    pub members: BTreeSet<UserId>,
    /// Always a subset of `members`.
    pub admins: BTreeSet<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Group {
    /// The creator is always inserted as both member and admin.
    pub fn new(
        name: impl Into<String>,
        created_by: UserId,
        members: impl IntoIterator<Item = UserId>,
    ) -> Self {
        let mut members: BTreeSet<UserId> = members.into_iter().collect();
        members.insert(created_by);
        let admins = BTreeSet::from([created_by]);
        Self {
            id: GroupId::new(),
            name: name.into(),
            profile_pic: String::new(),
            created_by,
            members,
            admins,
            created_at: timestamp_now(),
        }
    }

    pub fn is_member(&self, user: &UserId) -> bool {
        self.members.contains(user)
    }

    pub fn is_admin(&self, user: &UserId) -> bool {
        self.admins.contains(user)
    }

    /// Returns `false` if the user was already a member.
    pub fn add_member(&mut self, user: UserId) -> bool {
        self.members.insert(user)
    }

    /// Removes from both members and admins. Returns `false` if absent.
    pub fn remove_member(&mut self, user: &UserId) -> bool {
        self.admins.remove(user);
        self.members.remove(user)
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Exactly one destination per message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MessageTarget {
    Direct(UserId),
    Group(GroupId),
}

/// A sent message. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    pub target: MessageTarget,
    pub text: Option<String>,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(sender_id: UserId, target: MessageTarget, draft: &MessageDraft) -> Self {
        let draft = draft.normalized();
        Self {
            id: MessageId::new(),
            sender_id,
            target,
            text: draft.text,
            image: draft.image,
            created_at: timestamp_now(),
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.target, MessageTarget::Group(_))
    }

    /// First [`PREVIEW_CHARS`] characters of the text, or a placeholder for
    /// image-only messages.
    pub fn preview(&self) -> String {
        match &self.text {
            Some(text) => text.chars().take(PREVIEW_CHARS).collect(),
            None => IMAGE_ONLY_PREVIEW.to_string(),
        }
    }

    pub fn to_payload(&self) -> MessagePayload {
        let (receiver_id, group_id) = match self.target {
            MessageTarget::Direct(user) => (Some(user), None),
            MessageTarget::Group(group) => (None, Some(group)),
        };
        MessagePayload {
            id: self.id,
            sender_id: self.sender_id,
            receiver_id,
            group_id,
            text: self.text.clone(),
            image: self.image.clone(),
            is_group: self.is_group(),
            created_at: self.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// A durable feed entry for one recipient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient_id: UserId,
    pub sender_id: UserId,
    pub kind: NotificationKind,
    pub content: String,
    pub is_read: bool,
    /// Triggering entity, e.g. the message id.
    pub related_id: Option<Uuid>,
    pub metadata: NotificationMetadata,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        recipient_id: UserId,
        sender_id: UserId,
        kind: NotificationKind,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: NotificationId::new(),
            recipient_id,
            sender_id,
            kind,
            content: content.into(),
            is_read: false,
            related_id: None,
            metadata: NotificationMetadata::default(),
            created_at: timestamp_now(),
        }
    }

    pub fn with_related(mut self, related_id: Uuid) -> Self {
        self.related_id = Some(related_id);
        self
    }

    pub fn with_metadata(mut self, metadata: NotificationMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn to_payload(&self, sender: UserSummary) -> NotificationPayload {
        NotificationPayload {
            id: self.id,
            kind: self.kind,
            content: self.content.clone(),
            is_read: self.is_read,
            related_id: self.related_id,
            metadata: self.metadata.clone(),
            sender,
            created_at: self.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Query shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub(crate) fn sql(&self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

/// Which messages to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFilter {
    /// Direct messages exchanged between two users, either direction.
    Conversation(UserId, UserId),
    /// All messages posted to a group.
    Group(GroupId),
}

/// Conjunction of optional predicates over notifications.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationFilter {
    pub recipient: Option<UserId>,
    pub sender: Option<UserId>,
    pub ids: Option<Vec<NotificationId>>,
    pub kind: Option<NotificationKind>,
    pub is_read: Option<bool>,
}

impl NotificationFilter {
    pub fn for_recipient(recipient: UserId) -> Self {
        Self {
            recipient: Some(recipient),
            ..Self::default()
        }
    }

    pub fn sender(mut self, sender: UserId) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn ids(mut self, ids: impl IntoIterator<Item = NotificationId>) -> Self {
        self.ids = Some(ids.into_iter().collect());
        self
    }

    pub fn kind(mut self, kind: NotificationKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn is_read(mut self, is_read: bool) -> Self {
        self.is_read = Some(is_read);
        self
    }
}

/// Mutable fields of a notification. Only the read flag may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationPatch {
    pub is_read: bool,
}
