//! # murmur-shared
//!
//! Types shared between the store and the server: identifiers, notification
//! kinds and the live-channel wire protocol.

pub mod constants;
pub mod error;
pub mod protocol;
pub mod types;

pub use error::ProtocolError;
