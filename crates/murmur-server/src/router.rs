//! Best-effort live delivery on top of the presence registry.
//!
//! Nothing here queues or retries: an offline target is a normal outcome and
//! the client catches up from the store on its next fetch.

use tracing::debug;

use murmur_shared::protocol::{NotificationPayload, ReceiveMessage, ServerEvent};
use murmur_shared::types::{ConnectionId, GroupId, UserId};
use murmur_store::MessageTarget;

use crate::presence::{Delivery, PresenceRegistry};

#[derive(Clone)]
pub struct EventRouter {
    registry: PresenceRegistry,
}

impl EventRouter {
    pub fn new(registry: PresenceRegistry) -> Self {
        Self { registry }
    }

    /// Push to the user's live connection, if any.
    pub async fn deliver_to_user(&self, user: UserId, event: ServerEvent) -> Delivery {
        match self.registry.lookup(&user).await {
            Some(handle) => handle.push(event),
            None => {
                debug!(user = %user, event = event.name(), "Target offline, skipping push");
                Delivery::Offline
            }
        }
    }

    /// Push to every connection in a group room except `exclude`. Returns how
    /// many connections accepted the event.
    pub async fn deliver_to_room(
        &self,
        group: GroupId,
        event: ServerEvent,
        exclude: Option<ConnectionId>,
    ) -> usize {
        let members = self.registry.room_members(&group).await;
        let mut delivered = 0;
        for handle in members.iter().filter(|h| Some(h.id) != exclude) {
            if handle.push(event.clone()) == Delivery::Delivered {
                delivered += 1;
            }
        }
        debug!(group = %group, event = event.name(), delivered, "Room push");
        delivered
    }

    /// Push a `receive-message` to a direct recipient or to the whole group
    /// room, sender's own connection included.
    pub async fn deliver_message(&self, target: MessageTarget, message: ReceiveMessage) -> usize {
        let event = ServerEvent::ReceiveMessage(message);
        match target {
            MessageTarget::Direct(user) => {
                usize::from(self.deliver_to_user(user, event).await == Delivery::Delivered)
            }
            MessageTarget::Group(group) => self.deliver_to_room(group, event, None).await,
        }
    }

    /// Push an already persisted notification to its recipient.
    pub async fn deliver_notification(
        &self,
        recipient: UserId,
        notification: NotificationPayload,
    ) -> Delivery {
        self.deliver_to_user(recipient, ServerEvent::Notification(notification))
            .await
    }

    /// Send the full online set to every connection.
    pub async fn broadcast_online_users(&self) -> usize {
        let online = self.registry.online_users().await;
        let connections = self.registry.connections().await;
        let event = ServerEvent::OnlineUsers(online);
        connections
            .iter()
            .filter(|h| h.push(event.clone()) == Delivery::Delivered)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_user_is_a_miss_not_an_error() {
        let router = EventRouter::new(PresenceRegistry::new());
        let result = router
            .deliver_to_user(UserId::new(), ServerEvent::AllNotificationsMarkedRead)
            .await;
        assert_eq!(result, Delivery::Offline);
    }

    #[tokio::test]
    async fn test_room_push_honours_exclusion() {
        let registry = PresenceRegistry::new();
        let router = EventRouter::new(registry.clone());
        let group = GroupId::new();

        let (a, mut rx_a) = registry.open(UserId::new(), 8);
        let (b, mut rx_b) = registry.open(UserId::new(), 8);
        for h in [&a, &b] {
            registry.register(h.clone()).await;
            registry.join_room(group, h).await;
        }

        let sent = router
            .deliver_to_room(group, ServerEvent::AllNotificationsMarkedRead, Some(a.id))
            .await;
        assert_eq!(sent, 1);
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_everyone_with_full_set() {
        let registry = PresenceRegistry::new();
        let router = EventRouter::new(registry.clone());
        let (a, mut rx_a) = registry.open(UserId::new(), 8);
        let (b, mut rx_b) = registry.open(UserId::new(), 8);
        registry.register(a.clone()).await;
        registry.register(b.clone()).await;

        assert_eq!(router.broadcast_online_users().await, 2);
        for rx in [&mut rx_a, &mut rx_b] {
            let Ok(ServerEvent::OnlineUsers(users)) = rx.try_recv() else {
                panic!("expected online-users");
            };
            assert_eq!(users.len(), 2);
            assert!(users.contains(&a.user) && users.contains(&b.user));
        }
    }
}
