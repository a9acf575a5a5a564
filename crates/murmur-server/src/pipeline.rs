//! Notification pipeline.
//!
//! Every triggering event becomes one notification row per recipient. The
//! whole batch is written in one store call before anything is pushed; if the
//! write fails no recipient hears about it and the error goes back to the
//! caller.

use std::sync::Arc;

use tracing::{debug, error};
use uuid::Uuid;

use murmur_shared::types::{NotificationKind, NotificationMetadata, UserId};
use murmur_store::{Group, Message, Notification, Store, User};

use crate::error::ServerError;
use crate::router::EventRouter;

#[derive(Clone)]
pub struct NotificationPipeline {
    store: Arc<dyn Store>,
    router: EventRouter,
}

impl NotificationPipeline {
    pub fn new(store: Arc<dyn Store>, router: EventRouter) -> Self {
        Self { store, router }
    }

    /// Notify the other party of a direct message.
    ///
    /// When the active-chat hint says the conversation is already open the
    /// row is still written but the live `notification` push is skipped.
    pub async fn direct_message(
        &self,
        sender: &User,
        recipient: UserId,
        message: &Message,
        active_chat: Option<Uuid>,
    ) -> Result<Notification, ServerError> {
        let notification = Notification::new(
            recipient,
            sender.id,
            NotificationKind::Message,
            format!("{} sent you a message", sender.username),
        )
        .with_related(message.id.0)
        .with_metadata(message_metadata(message));

        let suppress = active_chat.is_some_and(|hint| hint == sender.id.0 || hint == recipient.0);
        let mut batch = self
            .emit(sender, vec![notification], |_| !suppress)
            .await?;
        if suppress {
            debug!(recipient = %recipient, "Conversation open, notification push suppressed");
        }
        batch.pop().ok_or_else(|| ServerError::Internal("empty notification batch".into()))
    }

    /// Notify every member except the sender and the member named by the
    /// active-chat hint.
    pub async fn group_message(
        &self,
        sender: &User,
        group: &Group,
        message: &Message,
        active_chat: Option<Uuid>,
    ) -> Result<Vec<Notification>, ServerError> {
        let mut metadata = message_metadata(message);
        metadata.group_id = Some(group.id);
        metadata.group_name = Some(group.name.clone());

        let content = format!("{} sent a message in {}", sender.username, group.name);
        let batch = group
            .members
            .iter()
            .filter(|member| **member != sender.id)
            .filter(|member| active_chat != Some(member.0))
            .map(|member| {
                Notification::new(*member, sender.id, NotificationKind::GroupMessage, &content)
                    .with_related(message.id.0)
                    .with_metadata(metadata.clone())
            })
            .collect();

        self.emit(sender, batch, |_| true).await
    }

    pub async fn friend_request(
        &self,
        sender: &User,
        recipient: UserId,
    ) -> Result<Notification, ServerError> {
        let notification = Notification::new(
            recipient,
            sender.id,
            NotificationKind::FriendRequest,
            format!("{} sent you a friend request", sender.username),
        )
        .with_related(sender.id.0);
        self.single(sender, notification).await
    }

    /// Tell the original requester that `accepter` said yes.
    pub async fn friend_accept(
        &self,
        accepter: &User,
        requester: UserId,
    ) -> Result<Notification, ServerError> {
        let notification = Notification::new(
            requester,
            accepter.id,
            NotificationKind::FriendAccept,
            format!("{} accepted your friend request", accepter.username),
        )
        .with_related(accepter.id.0);
        self.single(accepter, notification).await
    }

    pub async fn group_invite(
        &self,
        inviter: &User,
        group: &Group,
        invitees: &[UserId],
    ) -> Result<Vec<Notification>, ServerError> {
        let metadata = NotificationMetadata {
            group_id: Some(group.id),
            group_name: Some(group.name.clone()),
            ..Default::default()
        };
        let content = format!("{} added you to {}", inviter.username, group.name);
        let batch = invitees
            .iter()
            .filter(|user| **user != inviter.id)
            .map(|user| {
                Notification::new(*user, inviter.id, NotificationKind::GroupInvite, &content)
                    .with_related(group.id.0)
                    .with_metadata(metadata.clone())
            })
            .collect();
        self.emit(inviter, batch, |_| true).await
    }

    async fn single(&self, sender: &User, notification: Notification) -> Result<Notification, ServerError> {
        let mut batch = self.emit(sender, vec![notification], |_| true).await?;
        batch.pop().ok_or_else(|| ServerError::Internal("empty notification batch".into()))
    }

    /// Persist the batch, then push each row for which `push` holds.
    async fn emit(
        &self,
        sender: &User,
        batch: Vec<Notification>,
        push: impl Fn(&Notification) -> bool,
    ) -> Result<Vec<Notification>, ServerError> {
        if batch.is_empty() {
            return Ok(batch);
        }

        if let Err(e) = self.store.create_notifications(&batch).await {
            error!(
                sender = %sender.id,
                kind = %batch[0].kind,
                recipients = batch.len(),
                error = %e,
                "Failed to persist notifications, nothing pushed"
            );
            return Err(e.into());
        }

        let summary = sender.summary();
        for notification in batch.iter().filter(|n| push(n)) {
            self.router
                .deliver_notification(notification.recipient_id, notification.to_payload(summary.clone()))
                .await;
        }
        Ok(batch)
    }
}

fn message_metadata(message: &Message) -> NotificationMetadata {
    NotificationMetadata {
        message_preview: Some(message.preview()),
        has_image: Some(message.image.is_some()),
        ..Default::default()
    }
}
