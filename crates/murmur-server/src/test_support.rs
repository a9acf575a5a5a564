//! Shared fixtures for the server's unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use murmur_shared::protocol::ServerEvent;
use murmur_shared::types::{GroupId, NotificationId, UserId};
use murmur_store::{
    Group, Message, MessageFilter, Notification, NotificationFilter, NotificationPatch, Result,
    SortOrder, SqliteStore, Store, StoreError, User,
};

use crate::config::ServerConfig;
use crate::session::Session;
use crate::state::AppState;

pub fn test_state() -> AppState {
    test_state_with(Arc::new(SqliteStore::in_memory().unwrap()))
}

pub fn test_state_with(store: Arc<dyn Store>) -> AppState {
    let config = ServerConfig {
        session_secret: [42u8; 32],
        outbound_buffer: 64,
        ..ServerConfig::default()
    };
    AppState::new(config, store)
}

pub async fn seed_user(state: &AppState, name: &str) -> User {
    let user = User::new(name, format!("{name}@example.com"));
    state.store.save_user(&user).await.unwrap();
    user
}

/// Authenticate and activate a live session for `user`.
pub async fn connect(state: &AppState, user: &User) -> (Session, mpsc::Receiver<ServerEvent>) {
    let token = state.auth.issue(user.id);
    Session::authenticate(state, &token)
        .await
        .unwrap()
        .activate(state)
        .await
}

/// Everything queued on a connection so far.
pub fn drain(rx: &mut mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// In-memory store whose message and notification writes can be made to
/// fail on demand, and whose user and group reads and writes can be made to
/// yield to the scheduler the way real I/O would.
pub struct FaultyStore {
    inner: SqliteStore,
    fail_messages: AtomicBool,
    fail_notifications: AtomicBool,
    interleave: AtomicBool,
    miss_email_lookups: AtomicBool,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteStore::in_memory().unwrap(),
            fail_messages: AtomicBool::new(false),
            fail_notifications: AtomicBool::new(false),
            interleave: AtomicBool::new(false),
            miss_email_lookups: AtomicBool::new(false),
        }
    }

    /// Make `find_user_by_email` report nothing, as if another request
    /// registered the address right after the lookup.
    pub fn miss_email_lookups(&self, miss: bool) {
        self.miss_email_lookups.store(miss, Ordering::SeqCst);
    }

    pub fn interleave(&self, on: bool) {
        self.interleave.store(on, Ordering::SeqCst);
    }

    async fn suspend(&self) {
        if self.interleave.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
    }

    pub fn fail_messages(&self, fail: bool) {
        self.fail_messages.store(fail, Ordering::SeqCst);
    }

    pub fn fail_notifications(&self, fail: bool) {
        self.fail_notifications.store(fail, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::Invalid("injected write failure".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for FaultyStore {
    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        self.suspend().await;
        let user = self.inner.find_user(id).await;
        self.suspend().await;
        user
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        if self.miss_email_lookups.load(Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.find_user_by_email(email).await
    }

    async fn find_users_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>> {
        self.inner.find_users_by_ids(ids).await
    }

    async fn search_users(&self, query: &str, exclude: UserId, limit: u32) -> Result<Vec<User>> {
        self.inner.search_users(query, exclude, limit).await
    }

    async fn save_user(&self, user: &User) -> Result<()> {
        self.suspend().await;
        self.inner.save_user(user).await
    }

    async fn save_users(&self, users: &[User]) -> Result<()> {
        self.suspend().await;
        self.inner.save_users(users).await
    }

    async fn find_group(&self, id: GroupId) -> Result<Option<Group>> {
        self.suspend().await;
        let group = self.inner.find_group(id).await;
        self.suspend().await;
        group
    }

    async fn find_groups_by_member(&self, user: UserId) -> Result<Vec<Group>> {
        self.inner.find_groups_by_member(user).await
    }

    async fn save_group(&self, group: &Group) -> Result<()> {
        self.suspend().await;
        self.inner.save_group(group).await
    }

    async fn create_message(&self, message: &Message) -> Result<()> {
        Self::check(&self.fail_messages)?;
        self.inner.create_message(message).await
    }

    async fn find_messages(&self, filter: MessageFilter, order: SortOrder) -> Result<Vec<Message>> {
        self.inner.find_messages(filter, order).await
    }

    async fn find_latest_message(&self, filter: MessageFilter) -> Result<Option<Message>> {
        self.inner.find_latest_message(filter).await
    }

    async fn create_notification(&self, notification: &Notification) -> Result<()> {
        Self::check(&self.fail_notifications)?;
        self.inner.create_notification(notification).await
    }

    async fn create_notifications(&self, notifications: &[Notification]) -> Result<()> {
        Self::check(&self.fail_notifications)?;
        self.inner.create_notifications(notifications).await
    }

    async fn find_notifications(
        &self,
        filter: &NotificationFilter,
        order: SortOrder,
        limit: Option<u32>,
    ) -> Result<Vec<Notification>> {
        self.inner.find_notifications(filter, order, limit).await
    }

    async fn count_notifications(&self, filter: &NotificationFilter) -> Result<u64> {
        self.inner.count_notifications(filter).await
    }

    async fn update_notifications(
        &self,
        filter: &NotificationFilter,
        patch: NotificationPatch,
    ) -> Result<u64> {
        self.inner.update_notifications(filter, patch).await
    }

    async fn delete_notification(&self, id: NotificationId) -> Result<bool> {
        self.inner.delete_notification(id).await
    }

    async fn delete_notifications(&self, filter: &NotificationFilter) -> Result<u64> {
        self.inner.delete_notifications(filter).await
    }
}
