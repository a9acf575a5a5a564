//! Group creation and membership management.
//!
//! Membership changes never touch live rooms except on removal: a removed
//! member's connection leaves the room so it stops receiving group traffic.
//! New members join the room themselves with `join-groups`.

use std::collections::BTreeSet;

use tracing::info;

use murmur_shared::constants::MAX_NAME_CHARS;
use murmur_shared::types::{GroupId, UserId};
use murmur_store::{Group, User};

use crate::error::ServerError;
use crate::state::AppState;

async fn load_group(state: &AppState, id: GroupId) -> Result<Group, ServerError> {
    state
        .store
        .find_group(id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("group {id}")))
}

fn require_admin(group: &Group, user: &UserId) -> Result<(), ServerError> {
    if group.is_admin(user) {
        Ok(())
    } else {
        Err(ServerError::Forbidden("only group admins can change membership".into()))
    }
}

fn validate_name(name: &str) -> Result<String, ServerError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServerError::Validation("group name is required".into()));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(ServerError::Validation(format!(
            "group name exceeds {MAX_NAME_CHARS} characters"
        )));
    }
    Ok(name.to_string())
}

/// Create a group owned by `creator` and invite everyone in `members`.
pub async fn create(
    state: &AppState,
    creator: &User,
    name: &str,
    members: &[UserId],
    profile_pic: Option<String>,
) -> Result<Group, ServerError> {
    let name = validate_name(name)?;

    let invitees: Vec<UserId> = members
        .iter()
        .copied()
        .filter(|id| *id != creator.id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let found = state.store.find_users_by_ids(&invitees).await?;
    if found.len() != invitees.len() {
        let missing = invitees
            .iter()
            .find(|id| !found.iter().any(|u| u.id == **id))
            .map(ToString::to_string)
            .unwrap_or_default();
        return Err(ServerError::NotFound(format!("user {missing}")));
    }

    let mut group = Group::new(name, creator.id, invitees.iter().copied());
    if let Some(pic) = profile_pic {
        group.profile_pic = pic;
    }
    state.store.save_group(&group).await?;
    info!(group = %group.id, creator = %creator.id, members = group.members.len(), "Group created");

    state.pipeline.group_invite(creator, &group, &invitees).await?;
    Ok(group)
}

pub async fn add_member(
    state: &AppState,
    me: &User,
    group: GroupId,
    user: UserId,
) -> Result<Group, ServerError> {
    let _guard = state.locks.lock([group.0]).await;
    let mut group = load_group(state, group).await?;
    require_admin(&group, &me.id)?;
    if state.store.find_user(user).await?.is_none() {
        return Err(ServerError::NotFound(format!("user {user}")));
    }
    if !group.add_member(user) {
        return Err(ServerError::Conflict("already a member".into()));
    }
    state.store.save_group(&group).await?;
    info!(group = %group.id, user = %user, by = %me.id, "Member added");

    state.pipeline.group_invite(me, &group, &[user]).await?;
    Ok(group)
}

pub async fn remove_member(
    state: &AppState,
    me: &User,
    group: GroupId,
    user: UserId,
) -> Result<Group, ServerError> {
    let _guard = state.locks.lock([group.0]).await;
    let mut group = load_group(state, group).await?;
    require_admin(&group, &me.id)?;
    if !group.remove_member(&user) {
        return Err(ServerError::Validation("user is not a member".into()));
    }
    state.store.save_group(&group).await?;
    state.registry.leave_room(group.id, &user).await;
    info!(group = %group.id, user = %user, by = %me.id, "Member removed");
    Ok(group)
}

pub async fn list(state: &AppState, me: &User) -> Result<Vec<Group>, ServerError> {
    Ok(state.store.find_groups_by_member(me.id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_shared::types::NotificationKind;
    use murmur_store::{NotificationFilter, SortOrder};

    use std::sync::Arc;

    use crate::test_support::{seed_user, test_state, test_state_with, FaultyStore};

    async fn invites(state: &AppState, user: UserId) -> usize {
        let filter = NotificationFilter::for_recipient(user).kind(NotificationKind::GroupInvite);
        state
            .store
            .find_notifications(&filter, SortOrder::Descending, None)
            .await
            .unwrap()
            .len()
    }

    #[tokio::test]
    async fn test_create_invites_everyone_but_creator() {
        let state = test_state();
        let ada = seed_user(&state, "ada").await;
        let bob = seed_user(&state, "bob").await;
        let cy = seed_user(&state, "cy").await;

        let group = create(&state, &ada, "  crew ", &[bob.id, cy.id, ada.id, bob.id], None)
            .await
            .unwrap();
        assert_eq!(group.name, "crew");
        assert!(group.is_admin(&ada.id));
        assert_eq!(group.members.len(), 3);

        assert_eq!(invites(&state, ada.id).await, 0);
        assert_eq!(invites(&state, bob.id).await, 1);
        assert_eq!(invites(&state, cy.id).await, 1);
        assert_eq!(list(&state, &bob).await.unwrap(), vec![group]);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let state = test_state();
        let ada = seed_user(&state, "ada").await;
        assert!(matches!(
            create(&state, &ada, "   ", &[], None).await,
            Err(ServerError::Validation(_))
        ));
        assert!(matches!(
            create(&state, &ada, "crew", &[UserId::new()], None).await,
            Err(ServerError::NotFound(_))
        ));
        assert!(list(&state, &ada).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_membership_changes_are_admin_only() {
        let state = test_state();
        let ada = seed_user(&state, "ada").await;
        let bob = seed_user(&state, "bob").await;
        let cy = seed_user(&state, "cy").await;
        let group = create(&state, &ada, "crew", &[bob.id], None).await.unwrap();

        assert!(matches!(
            add_member(&state, &bob, group.id, cy.id).await,
            Err(ServerError::Forbidden(_))
        ));

        add_member(&state, &ada, group.id, cy.id).await.unwrap();
        assert_eq!(invites(&state, cy.id).await, 1);
        assert!(matches!(
            add_member(&state, &ada, group.id, cy.id).await,
            Err(ServerError::Conflict(_))
        ));

        assert!(matches!(
            remove_member(&state, &bob, group.id, cy.id).await,
            Err(ServerError::Forbidden(_))
        ));
        let group = remove_member(&state, &ada, group.id, cy.id).await.unwrap();
        assert!(!group.is_member(&cy.id));
        assert!(matches!(
            remove_member(&state, &ada, group.id, cy.id).await,
            Err(ServerError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_removed_member_leaves_live_room() {
        let state = test_state();
        let ada = seed_user(&state, "ada").await;
        let bob = seed_user(&state, "bob").await;
        let group = create(&state, &ada, "crew", &[bob.id], None).await.unwrap();

        let (handle, _rx) = state.registry.open(bob.id, 8);
        state.registry.register(handle.clone()).await;
        state.registry.join_room(group.id, &handle).await;

        remove_member(&state, &ada, group.id, bob.id).await.unwrap();
        assert!(state.registry.room_members(&group.id).await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_adds_keep_every_member() {
        let store = Arc::new(FaultyStore::new());
        store.interleave(true);
        let state = test_state_with(store);
        let ada = seed_user(&state, "ada").await;
        let bob = seed_user(&state, "bob").await;
        let cy = seed_user(&state, "cy").await;
        let group = create(&state, &ada, "crew", &[], None).await.unwrap();

        let (r1, r2) = tokio::join!(
            add_member(&state, &ada, group.id, bob.id),
            add_member(&state, &ada, group.id, cy.id)
        );
        r1.unwrap();
        r2.unwrap();

        let stored = state.store.find_group(group.id).await.unwrap().unwrap();
        assert!(stored.is_member(&bob.id) && stored.is_member(&cy.id));
        assert_eq!(stored.members.len(), 3);
    }
}
