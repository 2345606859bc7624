//! # bmessage-store
//!
//! Persistence for the BMessage backend: users, conversations, the post
//! feed and notifications.
//!
//! The crate defines the domain records, the [`Backend`] trait the core
//! writes through, and two implementations: [`Database`], backed by SQLite,
//! and [`MemoryBackend`], an in-process fake used by tests.

pub mod backend;
pub mod chats;
pub mod database;
pub mod groups;
pub mod memory;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod notifications;
pub mod posts;
pub mod users;

mod error;

pub use backend::Backend;
pub use database::Database;
pub use error::{Result, StoreError};
pub use memory::MemoryBackend;
pub use models::*;
