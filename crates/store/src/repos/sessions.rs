//! Session repository.

use crate::error::StoreResult;
use crate::models::Session;
use async_trait::async_trait;
use satchel_core::Timestamp;
use uuid::Uuid;

/// Repository for session records.
#[async_trait]
pub trait SessionRepo: Send + Sync {
    /// Insert a session, stamping `created_at`/`updated_at`.
    async fn create_session(&self, session: &mut Session) -> StoreResult<()>;

    /// Get a session by id.
    async fn get_session(&self, id: Uuid) -> StoreResult<Option<Session>>;

    /// Get a session by id and raw access token (the `Validate` lookup).
    async fn get_session_by_access_token(
        &self,
        id: Uuid,
        access_token: &str,
    ) -> StoreResult<Option<Session>>;

    /// Get a session by id and both raw tokens (the refresh lookup).
    async fn get_session_by_tokens(
        &self,
        id: Uuid,
        access_token: &str,
        refresh_token: &str,
    ) -> StoreResult<Option<Session>>;

    /// Get a session owned by the given user.
    async fn get_user_session(&self, id: Uuid, user_id: Uuid) -> StoreResult<Option<Session>>;

    /// List sessions of a user that are still within their refresh window.
    async fn list_active_sessions(&self, user_id: Uuid, now: Timestamp)
    -> StoreResult<Vec<Session>>;

    /// Atomically replace a session's token pair and reset its expiration.
    ///
    /// The update is keyed on the old pair, so of two concurrent refreshes
    /// exactly one observes `true`; the loser must treat the session as
    /// gone. Stamps `updated_at`.
    async fn rotate_session_tokens(
        &self,
        id: Uuid,
        old_access_token: &str,
        old_refresh_token: &str,
        new_access_token: &str,
        new_refresh_token: &str,
        expire_at: Timestamp,
    ) -> StoreResult<bool>;

    /// Delete one session.
    async fn delete_session(&self, id: Uuid) -> StoreResult<()>;

    /// Delete every session of a user (password change).
    async fn delete_sessions_for_user(&self, user_id: Uuid) -> StoreResult<u64>;

    /// Delete every session of a user except the given one.
    async fn delete_other_sessions(&self, user_id: Uuid, keep: Uuid) -> StoreResult<u64>;
}
