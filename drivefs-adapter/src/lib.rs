//! Scope-enforcing, caching filesystem adapter over Google Drive.
//!
//! Paths are synthetic: a path is a `/`-joined chain of remote IDs and only
//! its trailing segment identifies the item. Every item handed out has been
//! checked to live under the configured root.

pub mod adapter;
pub mod config;
mod content;
pub mod drive_client;
pub mod error;
pub mod identity_cache;
pub mod item;
mod listing;
mod mutation;
pub mod pool;
mod resolver;
pub mod scope;

#[cfg(test)]
mod testing;

pub use adapter::DriveAdapter;
pub use config::AdapterConfig;
pub use drive_client::DriveClient;
pub use error::{Error, ErrorKind, Result};
pub use identity_cache::ParentMap;
pub use item::{Item, ItemKind, Visibility};
pub use pool::{MemoryPool, SqlitePool};
