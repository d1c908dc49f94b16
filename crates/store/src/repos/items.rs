//! Item repository.

use crate::error::StoreResult;
use crate::models::Item;
use async_trait::async_trait;
use satchel_core::Timestamp;
use uuid::Uuid;

/// Parameters of the sync retrieval query.
#[derive(Debug, Clone)]
pub struct ItemQuery {
    pub user_id: Uuid,
    /// Only return items of this type when present.
    pub content_type: Option<String>,
    /// Time threshold; `None` means no threshold (full fetch).
    pub updated_after: Option<Timestamp>,
    /// Strict `>` comparison (sync token) vs inclusive `>=` (cursor token).
    pub strict: bool,
    /// Exclude tombstones (initial sync).
    pub exclude_deleted: bool,
    /// Page size; `0` fetches everything.
    pub limit: i64,
}

/// Repository for item records.
#[async_trait]
pub trait ItemRepo: Send + Sync {
    /// Insert or update an item, server-stamping `updated_at` (and
    /// `created_at` for new records). The row is matched by
    /// `(id, user_id)`; an id collision with another user's item yields
    /// `StoreError::Constraint`.
    async fn save_item(&self, item: &mut Item) -> StoreResult<()>;

    /// Get an item by id and owner.
    async fn get_item_by_user(&self, id: Uuid, user_id: Uuid) -> StoreResult<Option<Item>>;

    /// Run the sync retrieval query, newest first. Returns the page and
    /// whether more rows matched than the limit allowed.
    async fn list_items(&self, query: &ItemQuery) -> StoreResult<(Vec<Item>, bool)>;

    /// Items that participate in the integrity hash: not deleted and with
    /// a content type.
    async fn list_items_for_integrity(&self, user_id: Uuid) -> StoreResult<Vec<Item>>;
}
