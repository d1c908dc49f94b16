//! PASETO v2 local envelope for session tokens.
//!
//! Wire format: `"v2.local." ‖ base64url_nopad(nonce24 ‖ ciphertext+tag)`
//! where the ciphertext is XChaCha20-Poly1305 over the JSON claim set and
//! the PASETO pre-authentication encoding of `[header, nonce]` is bound as
//! associated data. Expiration claims are carried but deliberately not
//! enforced here: the session store decides between `expired-access-token`
//! and `invalid-auth`, which decryption alone cannot distinguish.

use crate::error::{Error, Result};
use crate::timestamp::Timestamp;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Token prefix, also the discriminator used by the auth middleware.
pub const HEADER: &str = "v2.local.";

const NONCE_LEN: usize = 24;

/// Claim set carried by access and refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    /// `"access_token"` or `"refresh_token"`.
    pub aud: String,
    /// Session id.
    pub sub: Uuid,
    /// The session's raw access or refresh token.
    pub jti: String,
    /// Session creation time.
    pub iat: Timestamp,
    /// Token expiration; informational at this layer.
    pub exp: Timestamp,
}

/// PASETO pre-authentication encoding: little-endian count and lengths
/// interleaved with the pieces, so the AAD is unambiguous.
fn pae(pieces: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + pieces.iter().map(|p| 8 + p.len()).sum::<usize>());
    out.extend_from_slice(&(pieces.len() as u64).to_le_bytes());
    for piece in pieces {
        out.extend_from_slice(&(piece.len() as u64).to_le_bytes());
        out.extend_from_slice(piece);
    }
    out
}

/// Encrypt claims into a `v2.local.` token.
pub fn encrypt(claims: &Claims, key: &[u8; 32]) -> Result<String> {
    let message = serde_json::to_vec(claims).map_err(|e| Error::Serialization(e.to_string()))?;

    let cipher = XChaCha20Poly1305::new_from_slice(key)
        .map_err(|_| Error::InvalidToken("invalid session secret".into()))?;
    let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);

    let aad = pae(&[HEADER.as_bytes(), nonce.as_slice()]);
    let ciphertext = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: &message,
                aad: &aad,
            },
        )
        .map_err(|_| Error::InvalidToken("session token encryption failed".into()))?;

    let mut body = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    body.extend_from_slice(nonce.as_slice());
    body.extend_from_slice(&ciphertext);

    Ok(format!("{HEADER}{}", URL_SAFE_NO_PAD.encode(body)))
}

/// Decrypt a `v2.local.` token back to its claims.
pub fn decrypt(token: &str, key: &[u8; 32]) -> Result<Claims> {
    let body = token
        .strip_prefix(HEADER)
        .ok_or_else(|| Error::InvalidToken("missing v2.local header".into()))?;
    let body = URL_SAFE_NO_PAD
        .decode(body)
        .map_err(|_| Error::InvalidToken("malformed session token".into()))?;
    if body.len() <= NONCE_LEN {
        return Err(Error::InvalidToken("truncated session token".into()));
    }

    let (nonce, ciphertext) = body.split_at(NONCE_LEN);
    let cipher = XChaCha20Poly1305::new_from_slice(key)
        .map_err(|_| Error::InvalidToken("invalid session secret".into()))?;

    let aad = pae(&[HEADER.as_bytes(), nonce]);
    let message = cipher
        .decrypt(
            XNonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad: &aad,
            },
        )
        .map_err(|_| Error::InvalidToken("session token decryption failed".into()))?;

    serde_json::from_slice(&message)
        .map_err(|_| Error::InvalidToken("malformed session token claims".into()))
}
