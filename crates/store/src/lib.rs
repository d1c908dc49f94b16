//! Embedded persistence for the Satchel sync server.
//!
//! This crate owns the durable data model:
//! - Users and their credential material
//! - Sessions and their access/refresh token pairs
//! - Opaque encrypted items and their tombstones
//! - Short-lived PKCE code challenges

pub mod error;
pub mod models;
pub mod repos;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use models::{Item, Pkce, Session, User};
pub use repos::{ItemQuery, ItemRepo, PkceRepo, SessionRepo, UserRepo};
pub use store::{SqliteStore, Store};

use std::path::Path;
use std::sync::Arc;

/// Open the SQLite store at the given path and run migrations.
pub async fn open(path: impl AsRef<Path>) -> StoreResult<Arc<dyn Store>> {
    let store = SqliteStore::new(path).await?;
    Ok(Arc::new(store) as Arc<dyn Store>)
}
