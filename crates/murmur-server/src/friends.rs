//! Friend requests and the symmetric friend relation.
//!
//! Every mutation locks both users, reloads them from the store and writes
//! both in one `save_users` call, so a completed operation never leaves a
//! one-sided friendship behind and concurrent edits of the same user queue
//! up instead of overwriting each other.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::info;

use murmur_shared::constants::{FRIEND_REQUEST_COOLDOWN_HOURS, USER_SEARCH_LIMIT};
use murmur_shared::protocol::UserSummary;
use murmur_shared::types::{NotificationKind, UserId};
use murmur_store::{timestamp_now, FriendRequest, NotificationFilter, RequestStatus, User};

use crate::error::ServerError;
use crate::state::AppState;

/// A pending request as shown to its recipient.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequest {
    pub from: UserSummary,
    pub created_at: DateTime<Utc>,
}

async fn load(state: &AppState, id: UserId) -> Result<User, ServerError> {
    state
        .store
        .find_user(id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("user {id}")))
}

/// Seconds left on a decline cooldown, if it is still running.
fn cooldown_remaining(declined_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<i64> {
    let ends = declined_at + Duration::hours(FRIEND_REQUEST_COOLDOWN_HOURS);
    (ends > now).then(|| (ends - now).num_seconds().max(1))
}

pub async fn send_request(state: &AppState, me: UserId, to: UserId) -> Result<(), ServerError> {
    if me == to {
        return Err(ServerError::Validation(
            "cannot send a friend request to yourself".into(),
        ));
    }

    let _guard = state.locks.lock([me.0, to.0]).await;
    let me = load(state, me).await?;
    let mut target = load(state, to).await?;

    if target.is_friend(&me.id) {
        return Err(ServerError::Conflict("already friends".into()));
    }
    if me.pending_request_from(&to).is_some() {
        return Err(ServerError::Conflict(
            "this user already sent you a request".into(),
        ));
    }
    if let Some(existing) = target.request_from(&me.id) {
        match existing.status {
            RequestStatus::Pending => {
                return Err(ServerError::Conflict("request already pending".into()));
            }
            RequestStatus::Declined => {
                let declined_at = existing.declined_at.unwrap_or(existing.created_at);
                if let Some(remaining_secs) = cooldown_remaining(declined_at, Utc::now()) {
                    return Err(ServerError::Cooldown { remaining_secs });
                }
            }
        }
        target.remove_requests_from(&me.id);
    }

    target.friend_requests.push(FriendRequest::pending(me.id));
    state.store.save_user(&target).await?;
    info!(from = %me.id, to = %to, "Friend request sent");

    state.pipeline.friend_request(&me, to).await?;
    Ok(())
}

/// Accept the pending request from `from`. Returns the new friend.
pub async fn accept(state: &AppState, me: UserId, from: UserId) -> Result<UserSummary, ServerError> {
    let _guard = state.locks.lock([me.0, from.0]).await;
    let mut me = load(state, me).await?;
    if me.pending_request_from(&from).is_none() {
        return Err(ServerError::NotFound("no pending request from this user".into()));
    }
    let mut requester = load(state, from).await?;

    me.friends.insert(requester.id);
    requester.friends.insert(me.id);
    me.remove_requests_from(&requester.id);
    requester.remove_requests_from(&me.id);
    state.store.save_users(&[me.clone(), requester.clone()]).await?;

    for (recipient, sender) in [(me.id, requester.id), (requester.id, me.id)] {
        let filter = NotificationFilter::for_recipient(recipient)
            .sender(sender)
            .kind(NotificationKind::FriendRequest);
        state.store.delete_notifications(&filter).await?;
    }
    info!(user = %me.id, friend = %requester.id, "Friend request accepted");

    state.pipeline.friend_accept(&me, requester.id).await?;
    Ok(requester.summary())
}

pub async fn decline(state: &AppState, me: UserId, from: UserId) -> Result<(), ServerError> {
    let _guard = state.locks.lock([me.0, from.0]).await;
    let mut me = load(state, me).await?;
    let request = me
        .request_from_mut(&from)
        .filter(|r| r.status == RequestStatus::Pending)
        .ok_or_else(|| ServerError::NotFound("no pending request from this user".into()))?;
    request.decline(timestamp_now());
    state.store.save_user(&me).await?;

    let filter = NotificationFilter::for_recipient(me.id)
        .sender(from)
        .kind(NotificationKind::FriendRequest);
    state.store.delete_notifications(&filter).await?;
    info!(user = %me.id, from = %from, "Friend request declined");
    Ok(())
}

pub async fn remove(state: &AppState, me: UserId, friend: UserId) -> Result<(), ServerError> {
    let _guard = state.locks.lock([me.0, friend.0]).await;
    let mut me = load(state, me).await?;
    if !me.is_friend(&friend) {
        return Err(ServerError::NotFound("not a friend".into()));
    }
    let mut other = load(state, friend).await?;

    me.friends.remove(&friend);
    other.friends.remove(&me.id);
    state.store.save_users(&[me.clone(), other]).await?;
    info!(user = %me.id, friend = %friend, "Friend removed");
    Ok(())
}

pub async fn list(state: &AppState, me: UserId) -> Result<Vec<UserSummary>, ServerError> {
    let me = load(state, me).await?;
    let ids: Vec<UserId> = me.friends.iter().copied().collect();
    let friends = state.store.find_users_by_ids(&ids).await?;
    Ok(friends.iter().map(User::summary).collect())
}

/// Find people to befriend by username, case-insensitively. The caller is
/// never in the results.
pub async fn search(
    state: &AppState,
    me: UserId,
    query: &str,
) -> Result<Vec<UserSummary>, ServerError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(ServerError::Validation("search query is required".into()));
    }
    let users = state.store.search_users(query, me, USER_SEARCH_LIMIT).await?;
    Ok(users.iter().map(User::summary).collect())
}

/// Pending requests received by `me`, oldest first.
pub async fn pending(state: &AppState, me: UserId) -> Result<Vec<PendingRequest>, ServerError> {
    let me = load(state, me).await?;
    let pending: Vec<&FriendRequest> = me
        .friend_requests
        .iter()
        .filter(|r| r.status == RequestStatus::Pending)
        .collect();
    let ids: Vec<UserId> = pending.iter().map(|r| r.from).collect();
    let senders = state.store.find_users_by_ids(&ids).await?;

    Ok(pending
        .into_iter()
        .filter_map(|r| {
            senders.iter().find(|u| u.id == r.from).map(|u| PendingRequest {
                from: u.summary(),
                created_at: r.created_at,
            })
        })
        .collect())
}
