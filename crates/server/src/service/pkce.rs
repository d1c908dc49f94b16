//! PKCE challenge service.

use crate::error::{ApiError, ApiResult};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use satchel_core::Timestamp;
use satchel_store::{Pkce, PkceRepo, Store};
use sha2::{Digest, Sha256};
use time::Duration;

/// Challenges outlive the login-params request by this much.
const CHALLENGE_TTL: Duration = Duration::hours(1);

/// Service managing short-lived login challenges.
pub struct PkceService<'a> {
    store: &'a dyn Store,
}

impl<'a> PkceService<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Derive the stored challenge from a login verifier:
    /// base64url (no padding) over the hex form of the SHA-256 digest.
    pub fn compute_challenge(code_verifier: &str) -> String {
        let digest = Sha256::digest(code_verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(hex::encode(digest))
    }

    /// Record a challenge for a later login.
    pub async fn store_challenge(&self, code_challenge: &str) -> ApiResult<()> {
        self.store
            .sweep_expired_challenges(Timestamp::now())
            .await?;

        let mut challenge = Pkce {
            code_challenge: code_challenge.to_string(),
            expire_at: Timestamp::now().saturating_add(CHALLENGE_TTL),
            created_at: Timestamp::EPOCH,
            updated_at: Timestamp::EPOCH,
        };
        self.store.store_challenge(&mut challenge).await?;
        Ok(())
    }

    /// Consume a challenge; absence is an authentication failure.
    pub async fn check_challenge(&self, code_challenge: &str) -> ApiResult<()> {
        self.store
            .sweep_expired_challenges(Timestamp::now())
            .await?;

        if !self.store.take_challenge(code_challenge).await? {
            return Err(ApiError::Credentials(
                "Invalid login credentials.".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_derivation_matches_known_vector() {
        let verifier = "90308e36cbb7051f2f97634f794e5e323fb8d06d6076c1ed0f7e45bb704ebce1";
        let expected =
            "MTFjYmFiZmNhODU5MTJlNWYxMzNhOGY0YWI2OWY4MzQ1ZTZhMDZlNDVjOTU5NjQ0YWQ5ZmFlOTA5NWY4MmZmNA";
        assert_eq!(PkceService::compute_challenge(verifier), expected);
    }

    #[test]
    fn challenge_is_unpadded_url_safe() {
        let challenge = PkceService::compute_challenge("some verifier");
        assert!(!challenge.contains('='));
        assert!(!challenge.contains('+'));
        assert!(!challenge.contains('/'));
    }
}
