//! User repository.

use crate::error::StoreResult;
use crate::models::User;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for user records.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Insert a user, stamping `created_at`/`updated_at`.
    async fn create_user(&self, user: &mut User) -> StoreResult<()>;

    /// Persist the mutable fields of an existing user, stamping `updated_at`.
    async fn update_user(&self, user: &mut User) -> StoreResult<()>;

    /// Get a user by id.
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Get a user by email.
    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
}
