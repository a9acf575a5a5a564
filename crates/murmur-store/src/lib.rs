//! # murmur-store
//!
//! Durable storage for murmur: users and their friend relations, groups,
//! messages and notifications, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle with typed CRUD
//! helpers per table, and the async [`Store`] trait that the server core is
//! written against.

pub mod database;
pub mod groups;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod notifications;
pub mod store;
pub mod users;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
pub use store::{SqliteStore, Store};
