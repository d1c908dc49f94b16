//! The item sync engine.
//!
//! Merges a client's proposed changes against the server's authoritative
//! state, detects concurrent edits, and hands back cursors the client
//! uses to resume. Two conflict wire formats exist: API 20161215 reports
//! `unsaved` entries after saving unconditionally, later APIs refuse the
//! save up front and report `conflicts` carrying the server's copy.
//!
//! Only the server stamps `updated_at`. An incoming `updated_at` that
//! deviates from the stored row therefore means the client edited a
//! stale snapshot; the tolerance below absorbs wire-precision loss from
//! older clients.

use crate::error::{ApiError, ApiResult};
use satchel_core::{ApiVersion, Timestamp, cursor};
use satchel_store::{Item, ItemQuery, ItemRepo, Store, StoreError, User};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Legacy rule: changes further apart than this many seconds conflict.
const MIN_CONFLICT_INTERVAL_SECONDS: i64 = 20;

/// Current rule: timestamp deltas of at least this many microseconds
/// conflict; anything smaller is wire-precision noise and saves normally.
const MIN_CONFLICT_INTERVAL_MICROSECONDS: i64 = 1_000;

/// Parameters of a sync request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncParams {
    #[serde(default)]
    pub api: Option<String>,
    #[serde(default)]
    pub compute_integrity: bool,
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub sync_token: String,
    #[serde(default)]
    pub cursor_token: String,
    /// Only return items of this type when present.
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub items: Vec<Item>,
}

/// An item that could not be saved (legacy wire format).
#[derive(Debug, Clone, Serialize)]
pub struct UnsavedItem {
    pub item: Item,
    pub error: ItemError,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// A refused save (current wire format). `server_item` carries the
/// authoritative copy for `sync_conflict`; `unsaved_item` echoes the
/// client's copy for `uuid_conflict`.
#[derive(Debug, Clone, Serialize)]
pub struct ConflictItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unsaved_item: Option<Item>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_item: Option<Item>,
    #[serde(rename = "type")]
    pub conflict_type: String,
}

/// A sync response; `unsaved` and `conflicts` are mutually exclusive by
/// API version.
#[derive(Debug, Clone, Serialize)]
pub struct SyncResponse {
    pub retrieved_items: Vec<Item>,
    pub saved_items: Vec<Item>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unsaved: Option<Vec<UnsavedItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflicts: Option<Vec<ConflictItem>>,
    pub sync_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrity_hash: Option<String>,
}

/// The sync engine, bound to one authenticated request.
pub struct SyncService<'a> {
    store: &'a dyn Store,
    user: &'a User,
    api: ApiVersion,
    params: SyncParams,
}

impl<'a> SyncService<'a> {
    pub fn new(store: &'a dyn Store, user: &'a User, params: SyncParams) -> Self {
        let api = ApiVersion::from_param(params.api.as_deref());
        Self {
            store,
            user,
            api,
            params,
        }
    }

    /// Perform the synchronisation.
    pub async fn execute(mut self) -> ApiResult<SyncResponse> {
        let (retrieved, over_limit) = self.get().await?;

        // The cursor must point at the page as fetched, before conflict
        // masking shrinks it.
        let cursor_token = if over_limit {
            retrieved.last().map(|item| cursor::encode(item.updated_at))
        } else {
            None
        };

        let (saved, unsaved, conflicts, masked) = if self.api.uses_conflicts() {
            let (saved, conflicts, masked) = self.save_guarded().await?;
            (saved, None, Some(conflicts), masked)
        } else {
            let (saved, unsaved, masked) = self.save_unconditional(&retrieved).await?;
            (saved, Some(unsaved), None, masked)
        };

        // The saved server value shadows whatever the retrieved set holds
        // for the same id; drop it so the client is not shown a
        // pre-conflict snapshot.
        let retrieved_items: Vec<Item> = retrieved
            .into_iter()
            .filter(|item| !masked.contains(&item.id))
            .collect();

        let integrity_hash = if self.params.compute_integrity {
            Some(self.compute_data_signature().await?)
        } else {
            None
        };

        // Newest saved row, or now when nothing was saved; one nanosecond
        // ahead so the next strict sync does not re-see the same row.
        let last_updated = saved
            .iter()
            .map(|item| item.updated_at)
            .max()
            .unwrap_or_else(Timestamp::now);
        let sync_token = cursor::encode(Timestamp::from_unix_nanos(
            last_updated.unix_nanos().saturating_add(1),
        ));

        Ok(SyncResponse {
            retrieved_items,
            saved_items: saved,
            unsaved,
            conflicts,
            sync_token,
            cursor_token,
            integrity_hash,
        })
    }

    /// Run the retrieval query for this request's tokens.
    async fn get(&mut self) -> ApiResult<(Vec<Item>, bool)> {
        if self.params.sync_token.is_empty() {
            // First sync: front-load every existing items key so the
            // client can decrypt incoming items without having to wait.
            self.params.limit = 0;
        }

        // A cursor token takes precedence since it will eventually walk
        // all results. Cursors compare inclusively (>=): paginated initial
        // syncs can hold many rows with identical updated_at, and a
        // strict comparison would skip the ones sharing the boundary
        // timestamp. The duplicates this re-delivers are tolerated by
        // clients. Sync tokens compare strictly (>).
        let (updated_after, strict, exclude_deleted) = if !self.params.cursor_token.is_empty() {
            (Some(decode_token(&self.params.cursor_token)?), false, false)
        } else if !self.params.sync_token.is_empty() {
            (Some(decode_token(&self.params.sync_token)?), true, false)
        } else {
            // Initial sync: tombstones mean nothing to a client with no
            // prior state.
            (None, false, true)
        };

        let query = ItemQuery {
            user_id: self.user.id,
            content_type: if self.params.content_type.is_empty() {
                None
            } else {
                Some(self.params.content_type.clone())
            },
            updated_after,
            strict,
            exclude_deleted,
            limit: self.params.limit,
        };

        Ok(self.store.list_items(&query).await?)
    }

    /// API 20190520+: refuse stale saves up front.
    async fn save_guarded(
        &mut self,
    ) -> ApiResult<(Vec<Item>, Vec<ConflictItem>, HashSet<Uuid>)> {
        let mut saved = Vec::new();
        let mut conflicts = Vec::new();
        let mut masked = HashSet::new();

        let items = std::mem::take(&mut self.params.items);
        for mut incoming in items {
            // Clients cannot cross-assign ownership.
            incoming.user_id = self.user.id;

            let server_item = self
                .store
                .get_item_by_user(incoming.id, self.user.id)
                .await?;

            if let Some(server_item) = server_item {
                let difference = incoming.updated_at.micros_since(server_item.updated_at);
                if difference.abs() >= MIN_CONFLICT_INTERVAL_MICROSECONDS {
                    // The client edited a snapshot that is not the
                    // current server value. Send the server copy back and
                    // mask it out of the retrieved set.
                    masked.insert(server_item.id);
                    conflicts.push(ConflictItem {
                        unsaved_item: None,
                        server_item: Some(server_item),
                        conflict_type: "sync_conflict".to_string(),
                    });
                    continue;
                }
            }

            if incoming.deleted {
                incoming.prepare_delete();
            }

            match self.store.save_item(&mut incoming).await {
                Ok(()) => saved.push(incoming),
                Err(err) => {
                    tracing::error!(item_id = %incoming.id, error = %err, "could not save item");
                    conflicts.push(ConflictItem {
                        unsaved_item: Some(incoming),
                        server_item: None,
                        conflict_type: "uuid_conflict".to_string(),
                    });
                }
            }
        }

        Ok((saved, conflicts, masked))
    }

    /// API 20161215: save everything, then flag saves that collided with
    /// the retrieved set.
    async fn save_unconditional(
        &mut self,
        retrieved: &[Item],
    ) -> ApiResult<(Vec<Item>, Vec<UnsavedItem>, HashSet<Uuid>)> {
        let mut saved = Vec::new();
        let mut unsaved = Vec::new();

        let items = std::mem::take(&mut self.params.items);
        for mut incoming in items {
            incoming.user_id = self.user.id;

            if incoming.deleted {
                incoming.prepare_delete();
            }

            match self.store.save_item(&mut incoming).await {
                Ok(()) => saved.push(incoming),
                Err(err) => {
                    tracing::error!(item_id = %incoming.id, error = %err, "could not save item");
                    unsaved.push(UnsavedItem {
                        item: incoming,
                        // No tag: the save layer inserts or updates, so
                        // only genuine storage failures land here.
                        error: ItemError {
                            message: Some(store_error_message(&err)),
                            tag: None,
                        },
                    });
                }
            }
        }

        // Saved items take precedence; every retrieved row that was also
        // saved gets masked, and sufficiently divergent ones additionally
        // come back as conflicted copies for the client to duplicate.
        let saved_by_id: HashMap<Uuid, &Item> =
            saved.iter().map(|item| (item.id, item)).collect();
        let mut masked = HashSet::new();

        for conflicted in retrieved {
            let Some(saved_item) = saved_by_id.get(&conflicted.id) else {
                continue;
            };

            let difference = saved_item
                .updated_at
                .micros_since(conflicted.updated_at)
                .abs();
            if difference > MIN_CONFLICT_INTERVAL_SECONDS * 1_000_000 {
                unsaved.push(UnsavedItem {
                    item: conflicted.clone(),
                    error: ItemError {
                        message: None,
                        tag: Some("sync_conflict".to_string()),
                    },
                });
            }
            masked.insert(conflicted.id);
        }

        Ok((saved, unsaved, masked))
    }

    /// Compute the data signature for the integrity check: the user's
    /// live item timestamps as decimal unix milliseconds, sorted
    /// descending, joined with commas, SHA-256, lowercase hex.
    async fn compute_data_signature(&self) -> ApiResult<String> {
        let items = self.store.list_items_for_integrity(self.user.id).await?;

        let mut timestamps: Vec<i64> = items.iter().map(|item| item.updated_at.unix_millis()).collect();
        timestamps.sort_unstable_by(|a, b| b.cmp(a));

        let joined = timestamps
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(",");

        Ok(hex::encode(Sha256::digest(joined.as_bytes())))
    }
}

/// Decode a client-supplied sync/cursor token; malformed or legacy v1
/// tokens are a client error, not a server one.
fn decode_token(token: &str) -> ApiResult<Timestamp> {
    cursor::decode(token).map_err(|e| ApiError::InvalidParameters(e.to_string()))
}

fn store_error_message(err: &StoreError) -> String {
    match err {
        StoreError::Constraint(_) => "could not save the item".to_string(),
        other => other.to_string(),
    }
}

// Integration-grade coverage for the engine lives in
// crates/server/tests/sync_tests.rs; the unit tests here pin the pure
// pieces.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_params_deserialize_defaults() {
        let params: SyncParams = serde_json::from_str(r#"{"api":"20190520"}"#).unwrap();
        assert!(params.items.is_empty());
        assert_eq!(params.limit, 0);
        assert!(!params.compute_integrity);
        assert!(params.sync_token.is_empty());
    }

    #[test]
    fn conflict_item_serialization_shape() {
        let conflict = ConflictItem {
            unsaved_item: None,
            server_item: None,
            conflict_type: "sync_conflict".to_string(),
        };
        let json = serde_json::to_value(&conflict).unwrap();
        assert_eq!(json, serde_json::json!({"type": "sync_conflict"}));
    }

    #[test]
    fn response_omits_absent_sections() {
        let response = SyncResponse {
            retrieved_items: vec![],
            saved_items: vec![],
            unsaved: None,
            conflicts: Some(vec![]),
            sync_token: "t".to_string(),
            cursor_token: None,
            integrity_hash: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("unsaved").is_none());
        assert!(json.get("conflicts").is_some());
        assert!(json.get("cursor_token").is_none());
        assert!(json.get("integrity_hash").is_none());
    }
}
