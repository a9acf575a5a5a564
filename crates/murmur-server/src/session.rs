//! Connection lifecycle.
//!
//! A connection moves `Connecting -> Authenticated -> Active -> Closed`, and
//! each state is its own type so a handler can only run on a session that is
//! actually registered:
//!
//! - [`Session::authenticate`] turns a token into an [`AuthenticatedSession`]
//!   (nothing registered yet, so a failed upgrade leaves no trace).
//! - [`AuthenticatedSession::activate`] registers in the presence registry,
//!   joins the user's group rooms and broadcasts `online-users`.
//! - [`Session::close`] consumes the session, unregisters this exact
//!   connection and broadcasts again.
//!
//! Inbound event failures are reported to this connection only as an `error`
//! event; they never close it.

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use murmur_shared::protocol::{ClientEvent, ServerEvent};
use murmur_shared::types::{GroupId, NotificationId};
use murmur_store::User;

use crate::auth;
use crate::error::ServerError;
use crate::messaging;
use crate::notifications;
use crate::presence::ConnectionHandle;
use crate::state::AppState;

/// A verified identity that is not yet live.
pub struct AuthenticatedSession {
    user: User,
    groups: Vec<GroupId>,
}

impl AuthenticatedSession {
    /// Go live. Returns the session and the receiving end of its outbound
    /// queue, which the transport drains.
    pub async fn activate(self, state: &AppState) -> (Session, mpsc::Receiver<ServerEvent>) {
        let (handle, outbound) = state
            .registry
            .open(self.user.id, state.config.outbound_buffer);

        if let Some(old) = state.registry.register(handle.clone()).await {
            debug!(user = %self.user.id, old = %old.id, "Previous connection superseded");
        }
        for group in &self.groups {
            state.registry.join_room(*group, &handle).await;
        }
        state.router.broadcast_online_users().await;

        info!(
            user = %self.user.id,
            connection = %handle.id,
            rooms = self.groups.len(),
            "Session active"
        );

        let session = Session {
            state: state.clone(),
            user: self.user,
            handle,
        };
        (session, outbound)
    }
}

/// A live, registered connection.
pub struct Session {
    state: AppState,
    user: User,
    handle: ConnectionHandle,
}

impl Session {
    /// Verify `token` and load the user and their group memberships.
    pub async fn authenticate(
        state: &AppState,
        token: &str,
    ) -> Result<AuthenticatedSession, ServerError> {
        let user = auth::authenticate(state, token).await?;
        let groups = state
            .store
            .find_groups_by_member(user.id)
            .await?
            .into_iter()
            .map(|g| g.id)
            .collect();
        Ok(AuthenticatedSession { user, groups })
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    /// Decode and handle one inbound text frame.
    pub async fn handle_text(&self, text: &str) {
        match ClientEvent::parse(text) {
            Ok(event) => self.handle_event(event).await,
            Err(e) => {
                debug!(connection = %self.handle.id, error = %e, "Rejected inbound frame");
                self.report(&ServerError::from(e));
            }
        }
    }

    /// Handle one decoded event, reporting any failure to this connection.
    pub async fn handle_event(&self, event: ClientEvent) {
        let name = event.name();
        if let Err(e) = self.dispatch(event).await {
            match &e {
                ServerError::Persistence(_) | ServerError::Internal(_) => error!(
                    user = %self.user.id,
                    event = name,
                    error = %e,
                    "Event handler failed"
                ),
                _ => warn!(user = %self.user.id, event = name, error = %e, "Event rejected"),
            }
            self.report(&e);
        }
    }

    /// Send an `error` event to this connection only.
    pub fn report(&self, err: &ServerError) {
        self.handle.push(err.to_event());
    }

    async fn dispatch(&self, event: ClientEvent) -> Result<(), ServerError> {
        match event {
            ClientEvent::JoinGroups(groups) => self.join_groups(&groups).await,
            ClientEvent::SendMessage(send) => {
                messaging::send_message(&self.state, &self.user, &send).await?;
                Ok(())
            }
            ClientEvent::MarkNotificationsRead(ids) => self.mark_read(&ids).await,
        }
    }

    /// Join the rooms of the listed groups the user belongs to. Ids of
    /// groups they are not a member of are skipped.
    async fn join_groups(&self, groups: &[GroupId]) -> Result<(), ServerError> {
        let memberships = self.state.store.find_groups_by_member(self.user.id).await?;
        let mut joined = 0;
        for group in groups {
            if memberships.iter().any(|g| g.id == *group) {
                if self.state.registry.join_room(*group, &self.handle).await {
                    joined += 1;
                }
            } else {
                debug!(user = %self.user.id, group = %group, "Not a member, not joining room");
            }
        }
        debug!(user = %self.user.id, requested = groups.len(), joined, "join-groups");
        Ok(())
    }

    async fn mark_read(&self, ids: &[NotificationId]) -> Result<(), ServerError> {
        let changed = notifications::set_read(&self.state, self.user.id, ids, true).await?;
        debug!(user = %self.user.id, changed, "Notifications marked read");
        Ok(())
    }

    /// Tear down this connection. Only broadcasts if it was still the
    /// user's live connection.
    pub async fn close(self) {
        let removed = self
            .state
            .registry
            .unregister(self.user.id, self.handle.id)
            .await;
        if removed {
            self.state.router.broadcast_online_users().await;
        }
        info!(user = %self.user.id, connection = %self.handle.id, "Session closed");
    }
}
