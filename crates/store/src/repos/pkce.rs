//! PKCE challenge repository.

use crate::error::StoreResult;
use crate::models::Pkce;
use async_trait::async_trait;
use satchel_core::Timestamp;

/// Repository for short-lived PKCE code challenges.
#[async_trait]
pub trait PkceRepo: Send + Sync {
    /// Insert a challenge, stamping `created_at`/`updated_at`.
    async fn store_challenge(&self, challenge: &mut Pkce) -> StoreResult<()>;

    /// Atomically consume a challenge. Returns whether it existed.
    async fn take_challenge(&self, code_challenge: &str) -> StoreResult<bool>;

    /// Delete challenges whose TTL elapsed. Returns the number removed.
    async fn sweep_expired_challenges(&self, now: Timestamp) -> StoreResult<u64>;
}
