//! The send path shared by the live `send-message` event and
//! `POST /api/messages/:id`, plus history and conversation list reads.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error};
use uuid::Uuid;

use murmur_shared::protocol::{MessagePayload, ReceiveMessage, Recipient, SendMessage};
use murmur_shared::types::{GroupId, UserId};
use murmur_store::{Group, Message, MessageFilter, MessageTarget, SortOrder, User};

use crate::error::ServerError;
use crate::state::AppState;

/// Validate, persist, push `receive-message`, then run the notification
/// pipeline. Nothing is pushed if the message itself fails to persist.
pub async fn send_message(
    state: &AppState,
    sender: &User,
    send: &SendMessage,
) -> Result<Message, ServerError> {
    send.message.validate()?;

    let group = match send.recipient() {
        Recipient::User(to) => {
            if to == sender.id {
                return Err(ServerError::Validation("cannot message yourself".into()));
            }
            if state.store.find_user(to).await?.is_none() {
                return Err(ServerError::NotFound(format!("user {to}")));
            }
            None
        }
        Recipient::Group(id) => Some(member_group(state, sender.id, id).await?),
    };

    let target = match &group {
        Some(group) => MessageTarget::Group(group.id),
        None => MessageTarget::Direct(UserId(send.to)),
    };
    let message = Message::new(sender.id, target, &send.message);

    if let Err(e) = state.store.create_message(&message).await {
        error!(sender = %sender.id, error = %e, "Failed to persist message");
        return Err(e.into());
    }
    debug!(sender = %sender.id, message = %message.id, group = message.is_group(), "Message stored");

    let delivered = state
        .router
        .deliver_message(
            target,
            ReceiveMessage {
                from: sender.id,
                message: message.to_payload(),
                is_group: message.is_group(),
            },
        )
        .await;
    debug!(message = %message.id, delivered, "receive-message pushed");

    let hint = send.active_chat_hint();
    match &group {
        Some(group) => {
            state.pipeline.group_message(sender, group, &message, hint).await?;
        }
        None => {
            state
                .pipeline
                .direct_message(sender, UserId(send.to), &message, hint)
                .await?;
        }
    }

    Ok(message)
}

/// Which conversation a history request is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversation {
    Direct(UserId),
    Group(GroupId),
}

/// Conversation history, oldest first.
pub async fn history(
    state: &AppState,
    me: &User,
    conversation: Conversation,
) -> Result<Vec<MessagePayload>, ServerError> {
    let filter = match conversation {
        Conversation::Direct(other) => MessageFilter::Conversation(me.id, other),
        Conversation::Group(id) => {
            member_group(state, me.id, id).await?;
            MessageFilter::Group(id)
        }
    };
    let messages = state.store.find_messages(filter, SortOrder::Ascending).await?;
    Ok(messages.iter().map(Message::to_payload).collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    User,
    Group,
}

/// One entry of the conversation list: a friend or a group, with the time of
/// the last message exchanged there.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    #[serde(rename = "type")]
    pub kind: ConversationKind,
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub profile_pic: String,
    pub last_message_time: Option<DateTime<Utc>>,
}

/// Friends and groups of `me`, most recently active first. Conversations
/// with no messages come last.
pub async fn conversations(
    state: &AppState,
    me: &User,
) -> Result<Vec<ConversationSummary>, ServerError> {
    let friend_ids: Vec<UserId> = me.friends.iter().copied().collect();
    let friends = state.store.find_users_by_ids(&friend_ids).await?;
    let groups = state.store.find_groups_by_member(me.id).await?;

    let mut entries = Vec::with_capacity(friends.len() + groups.len());
    for friend in friends {
        let last = state
            .store
            .find_latest_message(MessageFilter::Conversation(me.id, friend.id))
            .await?;
        entries.push(ConversationSummary {
            kind: ConversationKind::User,
            id: friend.id.0,
            name: friend.username,
            profile_pic: friend.profile_pic,
            last_message_time: last.map(|m| m.created_at),
        });
    }
    for group in groups {
        let last = state
            .store
            .find_latest_message(MessageFilter::Group(group.id))
            .await?;
        entries.push(ConversationSummary {
            kind: ConversationKind::Group,
            id: group.id.0,
            name: group.name,
            profile_pic: group.profile_pic,
            last_message_time: last.map(|m| m.created_at),
        });
    }

    entries.sort_by(|a, b| b.last_message_time.cmp(&a.last_message_time));
    Ok(entries)
}

async fn member_group(state: &AppState, user: UserId, id: GroupId) -> Result<Group, ServerError> {
    let group = state
        .store
        .find_group(id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("group {id}")))?;
    if !group.is_member(&user) {
        return Err(ServerError::Forbidden("not a member of this group".into()));
    }
    Ok(group)
}
