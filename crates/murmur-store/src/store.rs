//! The persistent store as seen by the server core.
//!
//! [`Store`] is the only contract the core depends on: create/find/update
//! over users, groups, messages and notifications. [`SqliteStore`] backs it
//! with the synchronous [`Database`], serialising access through an async
//! mutex.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use murmur_shared::types::{GroupId, NotificationId, UserId};

use crate::database::Database;
use crate::error::Result;
use crate::models::{
    Group, Message, MessageFilter, Notification, NotificationFilter, NotificationPatch, SortOrder,
    User,
};

#[async_trait]
pub trait Store: Send + Sync {
    async fn find_user(&self, id: UserId) -> Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn find_users_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>>;
    async fn search_users(&self, query: &str, exclude: UserId, limit: u32) -> Result<Vec<User>>;
    async fn save_user(&self, user: &User) -> Result<()>;
    /// All-or-nothing write of several users.
    async fn save_users(&self, users: &[User]) -> Result<()>;

    async fn find_group(&self, id: GroupId) -> Result<Option<Group>>;
    async fn find_groups_by_member(&self, user: UserId) -> Result<Vec<Group>>;
    async fn save_group(&self, group: &Group) -> Result<()>;

    async fn create_message(&self, message: &Message) -> Result<()>;
    async fn find_messages(&self, filter: MessageFilter, order: SortOrder) -> Result<Vec<Message>>;
    async fn find_latest_message(&self, filter: MessageFilter) -> Result<Option<Message>>;

    async fn create_notification(&self, notification: &Notification) -> Result<()>;
    /// All-or-nothing insert of a fan-out batch.
    async fn create_notifications(&self, notifications: &[Notification]) -> Result<()>;
    async fn find_notifications(
        &self,
        filter: &NotificationFilter,
        order: SortOrder,
        limit: Option<u32>,
    ) -> Result<Vec<Notification>>;
    async fn count_notifications(&self, filter: &NotificationFilter) -> Result<u64>;
    async fn update_notifications(
        &self,
        filter: &NotificationFilter,
        patch: NotificationPatch,
    ) -> Result<u64>;
    async fn delete_notification(&self, id: NotificationId) -> Result<bool>;
    async fn delete_notifications(&self, filter: &NotificationFilter) -> Result<u64>;
}

/// [`Store`] over a single SQLite connection.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<Database>>,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        self.db.lock().await.find_user(id)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.db.lock().await.find_user_by_email(email)
    }

    async fn find_users_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>> {
        self.db.lock().await.find_users_by_ids(ids)
    }

    async fn search_users(&self, query: &str, exclude: UserId, limit: u32) -> Result<Vec<User>> {
        self.db.lock().await.search_users(query, exclude, limit)
    }

    async fn save_user(&self, user: &User) -> Result<()> {
        self.db.lock().await.save_user(user)
    }

    async fn save_users(&self, users: &[User]) -> Result<()> {
        self.db.lock().await.save_users(users)
    }

    async fn find_group(&self, id: GroupId) -> Result<Option<Group>> {
        self.db.lock().await.find_group(id)
    }

    async fn find_groups_by_member(&self, user: UserId) -> Result<Vec<Group>> {
        self.db.lock().await.find_groups_by_member(user)
    }

    async fn save_group(&self, group: &Group) -> Result<()> {
        self.db.lock().await.save_group(group)
    }

    async fn create_message(&self, message: &Message) -> Result<()> {
        self.db.lock().await.insert_message(message)
    }

    async fn find_messages(&self, filter: MessageFilter, order: SortOrder) -> Result<Vec<Message>> {
        self.db.lock().await.find_messages(filter, order)
    }

    async fn find_latest_message(&self, filter: MessageFilter) -> Result<Option<Message>> {
        self.db.lock().await.find_latest_message(filter)
    }

    async fn create_notification(&self, notification: &Notification) -> Result<()> {
        self.db.lock().await.insert_notification(notification)
    }

    async fn create_notifications(&self, notifications: &[Notification]) -> Result<()> {
        self.db.lock().await.insert_notifications(notifications)
    }

    async fn find_notifications(
        &self,
        filter: &NotificationFilter,
        order: SortOrder,
        limit: Option<u32>,
    ) -> Result<Vec<Notification>> {
        self.db.lock().await.find_notifications(filter, order, limit)
    }

    async fn count_notifications(&self, filter: &NotificationFilter) -> Result<u64> {
        self.db.lock().await.count_notifications(filter)
    }

    async fn update_notifications(
        &self,
        filter: &NotificationFilter,
        patch: NotificationPatch,
    ) -> Result<u64> {
        self.db.lock().await.update_notifications(filter, patch)
    }

    async fn delete_notification(&self, id: NotificationId) -> Result<bool> {
        self.db.lock().await.delete_notification(id)
    }

    async fn delete_notifications(&self, filter: &NotificationFilter) -> Result<u64> {
        self.db.lock().await.delete_notifications(filter)
    }
}
