//! Database models.

use satchel_core::Timestamp;
use satchel_core::version::PROTOCOL_VERSION_2;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A registered account.
///
/// `password` holds the Argon2id PHC string, never the plaintext.
/// `password_updated_at` (unix seconds) revokes every JWT minted before
/// the last credential change.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password: String,
    pub pw_cost: i64,
    pub pw_nonce: String,
    /// Protocol 002 only.
    pub pw_salt: String,
    /// Protocol 002 payload compatibility.
    pub pw_auth: String,
    pub version: String,
    pub password_updated_at: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    /// A user with default params; the version is overridden by the
    /// client-provided value before the record is inserted.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            email: String::new(),
            password: String::new(),
            pw_cost: 0,
            pw_nonce: String::new(),
            pw_salt: String::new(),
            pw_auth: String::new(),
            version: PROTOCOL_VERSION_2.to_string(),
            password_updated_at: 0,
            created_at: Timestamp::EPOCH,
            updated_at: Timestamp::EPOCH,
        }
    }
}

impl Default for User {
    fn default() -> Self {
        Self::new()
    }
}

/// A session for a protocol-004 account.
///
/// `access_token` and `refresh_token` are the raw random values; the wire
/// carries them wrapped in the PASETO envelope. `expire_at` is the
/// refresh-token expiration; the access window is derived from it.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_agent: String,
    pub api_version: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expire_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// An opaque encrypted item; also the sync wire shape.
///
/// When `deleted` is set the ciphertext fields are cleared so peers only
/// ever observe the tombstone.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "uuid")]
    pub id: Uuid,
    #[serde(rename = "user_uuid", default)]
    pub user_id: Uuid,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub enc_item_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items_key_id: Option<String>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub created_at: Timestamp,
    #[serde(default)]
    pub updated_at: Timestamp,
}

impl Item {
    /// Clear the ciphertext so only the tombstone remains.
    pub fn prepare_delete(&mut self) {
        self.content.clear();
        self.enc_item_key.clear();
        self.items_key_id = None;
    }
}

/// A stored PKCE code challenge.
#[derive(Debug, Clone, FromRow)]
pub struct Pkce {
    pub code_challenge: String,
    pub expire_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_deserializes_from_minimal_wire_shape() {
        let item: Item = serde_json::from_str(
            r#"{"uuid":"d989ccc9-15c6-475e-839b-1690bd07d073","content":"c","content_type":"Note"}"#,
        )
        .unwrap();
        assert_eq!(item.content_type.as_deref(), Some("Note"));
        assert!(!item.deleted);
        assert!(item.updated_at.is_epoch());
        assert!(item.user_id.is_nil());
    }

    #[test]
    fn item_tolerates_null_timestamps() {
        let item: Item = serde_json::from_str(
            r#"{"uuid":"d989ccc9-15c6-475e-839b-1690bd07d073","created_at":null,"updated_at":null}"#,
        )
        .unwrap();
        assert!(item.created_at.is_epoch());
    }

    #[test]
    fn prepare_delete_clears_ciphertext() {
        let mut item = Item {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            content: "ciphertext".into(),
            content_type: Some("Note".into()),
            enc_item_key: "key".into(),
            items_key_id: Some("ik".into()),
            deleted: true,
            created_at: Timestamp::now(),
            updated_at: Timestamp::now(),
        };
        item.prepare_delete();
        assert!(item.content.is_empty());
        assert!(item.enc_item_key.is_empty());
        assert!(item.items_key_id.is_none());
        assert_eq!(item.content_type.as_deref(), Some("Note"));
    }
}
