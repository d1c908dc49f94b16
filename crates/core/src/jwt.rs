//! Legacy JWT (HS256) codec.
//!
//! Protocol-003 era clients authenticate with a stateless JWT. The claim
//! set is fixed: `user_uuid`, `iss`, `iat` (unix seconds). Revocation is
//! handled above this layer by comparing `iat` against the user's
//! `password_updated_at`.

use crate::error::{Error, Result};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// JWT claim set used by the legacy authentication model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_uuid: Uuid,
    pub iss: String,
    /// Unix timestamp in seconds.
    pub iat: i64,
}

#[derive(Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

fn mac(key: &[u8], input: &[u8]) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|_| Error::InvalidToken("invalid signing key".into()))?;
    mac.update(input);
    Ok(mac)
}

/// Sign claims into a compact JWT.
pub fn sign(claims: &Claims, key: &[u8]) -> Result<String> {
    let header = Header {
        alg: "HS256".to_string(),
        typ: "JWT".to_string(),
    };
    let header = serde_json::to_vec(&header).map_err(|e| Error::Serialization(e.to_string()))?;
    let payload = serde_json::to_vec(claims).map_err(|e| Error::Serialization(e.to_string()))?;

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header),
        URL_SAFE_NO_PAD.encode(payload)
    );
    let signature = mac(key, signing_input.as_bytes())?.finalize().into_bytes();

    Ok(format!(
        "{signing_input}.{}",
        URL_SAFE_NO_PAD.encode(signature)
    ))
}

/// Verify a compact JWT and return its claims.
pub fn verify(token: &str, key: &[u8]) -> Result<Claims> {
    let mut parts = token.split('.');
    let (header, payload, signature) = match (parts.next(), parts.next(), parts.next(), parts.next())
    {
        (Some(h), Some(p), Some(s), None) => (h, p, s),
        _ => return Err(Error::InvalidToken("malformed JWT".into())),
    };

    let header_bytes = URL_SAFE_NO_PAD
        .decode(header)
        .map_err(|_| Error::InvalidToken("malformed JWT header".into()))?;
    let parsed: Header = serde_json::from_slice(&header_bytes)
        .map_err(|_| Error::InvalidToken("malformed JWT header".into()))?;
    if parsed.alg != "HS256" {
        return Err(Error::InvalidToken(format!(
            "unexpected JWT algorithm: {}",
            parsed.alg
        )));
    }

    let signature = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| Error::InvalidToken("malformed JWT signature".into()))?;
    let signing_input = format!("{header}.{payload}");
    // verify_slice is constant-time.
    mac(key, signing_input.as_bytes())?
        .verify_slice(&signature)
        .map_err(|_| Error::InvalidToken("JWT signature mismatch".into()))?;

    let payload = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| Error::InvalidToken("malformed JWT payload".into()))?;
    serde_json::from_slice(&payload).map_err(|_| Error::InvalidToken("malformed JWT claims".into()))
}
