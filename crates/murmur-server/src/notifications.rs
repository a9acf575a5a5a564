//! The caller's notification feed. Every operation is scoped to notifications
//! the caller received; ids belonging to someone else are silently ignored
//! for bulk updates and reported as not found for deletes.

use std::collections::HashMap;

use murmur_shared::constants::NOTIFICATION_PAGE_LIMIT;
use murmur_shared::protocol::{NotificationPayload, UserSummary};
use murmur_shared::types::{NotificationId, UserId};
use murmur_store::{NotificationFilter, NotificationPatch, SortOrder};

use crate::error::ServerError;
use crate::state::AppState;

/// Newest first, with sender summaries joined in.
pub async fn list(state: &AppState, me: UserId) -> Result<Vec<NotificationPayload>, ServerError> {
    let notifications = state
        .store
        .find_notifications(
            &NotificationFilter::for_recipient(me),
            SortOrder::Descending,
            Some(NOTIFICATION_PAGE_LIMIT),
        )
        .await?;

    let mut sender_ids: Vec<UserId> = notifications.iter().map(|n| n.sender_id).collect();
    sender_ids.sort();
    sender_ids.dedup();
    let senders: HashMap<UserId, UserSummary> = state
        .store
        .find_users_by_ids(&sender_ids)
        .await?
        .iter()
        .map(|u| (u.id, u.summary()))
        .collect();

    Ok(notifications
        .iter()
        .map(|n| {
            let sender = senders.get(&n.sender_id).cloned().unwrap_or(UserSummary {
                id: n.sender_id,
                username: String::new(),
                profile_pic: String::new(),
            });
            n.to_payload(sender)
        })
        .collect())
}

pub async fn unread_count(state: &AppState, me: UserId) -> Result<u64, ServerError> {
    let filter = NotificationFilter::for_recipient(me).is_read(false);
    Ok(state.store.count_notifications(&filter).await?)
}

/// Set the read flag on the listed notifications. Returns how many changed;
/// repeating the call changes nothing.
pub async fn set_read(
    state: &AppState,
    me: UserId,
    ids: &[NotificationId],
    is_read: bool,
) -> Result<u64, ServerError> {
    let filter = NotificationFilter::for_recipient(me).ids(ids.iter().copied());
    Ok(state
        .store
        .update_notifications(&filter, NotificationPatch { is_read })
        .await?)
}

pub async fn mark_all_read(state: &AppState, me: UserId) -> Result<u64, ServerError> {
    let filter = NotificationFilter::for_recipient(me).is_read(false);
    Ok(state
        .store
        .update_notifications(&filter, NotificationPatch { is_read: true })
        .await?)
}

pub async fn delete(state: &AppState, me: UserId, id: NotificationId) -> Result<(), ServerError> {
    let filter = NotificationFilter::for_recipient(me).ids([id]);
    if state.store.delete_notifications(&filter).await? == 0 {
        return Err(ServerError::NotFound(format!("notification {id}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_shared::types::NotificationKind;
    use murmur_store::Notification;

    use crate::test_support::{seed_user, test_state};

    #[tokio::test]
    async fn test_mark_read_is_idempotent() {
        let state = test_state();
        let ada = seed_user(&state, "ada").await;
        let bob = seed_user(&state, "bob").await;
        let batch: Vec<_> = (0..3)
            .map(|_| Notification::new(ada.id, bob.id, NotificationKind::Message, "bob sent you a message"))
            .collect();
        state.store.create_notifications(&batch).await.unwrap();
        let ids: Vec<_> = batch.iter().take(2).map(|n| n.id).collect();

        assert_eq!(unread_count(&state, ada.id).await.unwrap(), 3);
        assert_eq!(set_read(&state, ada.id, &ids, true).await.unwrap(), 2);
        assert_eq!(unread_count(&state, ada.id).await.unwrap(), 1);

        assert_eq!(set_read(&state, ada.id, &ids, true).await.unwrap(), 0);
        assert_eq!(unread_count(&state, ada.id).await.unwrap(), 1);

        assert_eq!(set_read(&state, ada.id, &ids[..1], false).await.unwrap(), 1);
        assert_eq!(mark_all_read(&state, ada.id).await.unwrap(), 2);
        assert_eq!(unread_count(&state, ada.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cannot_touch_someone_elses_notifications() {
        let state = test_state();
        let ada = seed_user(&state, "ada").await;
        let bob = seed_user(&state, "bob").await;
        let theirs = Notification::new(bob.id, ada.id, NotificationKind::FriendRequest, "ada sent you a friend request");
        state.store.create_notification(&theirs).await.unwrap();

        assert_eq!(set_read(&state, ada.id, &[theirs.id], true).await.unwrap(), 0);
        assert!(matches!(
            delete(&state, ada.id, theirs.id).await,
            Err(ServerError::NotFound(_))
        ));
        delete(&state, bob.id, theirs.id).await.unwrap();
        assert_eq!(unread_count(&state, bob.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_joins_sender_and_caps_page() {
        let state = test_state();
        let ada = seed_user(&state, "ada").await;
        let bob = seed_user(&state, "bob").await;
        let batch: Vec<_> = (0..NOTIFICATION_PAGE_LIMIT + 5)
            .map(|_| Notification::new(ada.id, bob.id, NotificationKind::Message, "bob sent you a message"))
            .collect();
        state.store.create_notifications(&batch).await.unwrap();

        let page = list(&state, ada.id).await.unwrap();
        assert_eq!(page.len(), NOTIFICATION_PAGE_LIMIT as usize);
        assert!(page.iter().all(|p| p.sender.username == "bob"));
        assert!(page.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }
}
