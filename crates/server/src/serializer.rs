//! Render helpers translating models into API payloads.

use crate::error::ApiResult;
use crate::session::{Manager, TokenKind};
use satchel_core::version::{PROTOCOL_VERSION_2, PROTOCOL_VERSION_3, PROTOCOL_VERSION_4};
use satchel_store::{Session, User};
use serde_json::{Value, json};
use uuid::Uuid;

/// Serialize the render of a user.
pub fn user(user: &User) -> Value {
    let mut payload = json!({
        "uuid": user.id,
        "created_at": user.created_at,
        "updated_at": user.updated_at,
        "email": user.email,
        "version": user.version,
        "pw_cost": user.pw_cost,
    });

    match user.version.as_str() {
        PROTOCOL_VERSION_2 => {
            payload["pw_salt"] = json!(user.pw_salt);
            payload["pw_auth"] = json!(user.pw_auth);
        }
        PROTOCOL_VERSION_3 => {
            payload["pw_nonce"] = json!(user.pw_nonce);
        }
        _ => {}
    }

    payload
}

/// Serialize the password-derivation params returned by `auth/params`
/// (and embedded as `key_params` in change-password responses).
pub fn auth_params(user: &User) -> Value {
    let mut payload = json!({
        "identifier": user.email,
        "version": user.version,
    });

    match user.version.as_str() {
        PROTOCOL_VERSION_2 => {
            payload["pw_cost"] = json!(user.pw_cost);
            payload["pw_salt"] = json!(user.pw_salt);
        }
        PROTOCOL_VERSION_3 => {
            payload["pw_cost"] = json!(user.pw_cost);
            payload["pw_nonce"] = json!(user.pw_nonce);
        }
        PROTOCOL_VERSION_4 => {
            // Argon2id cost is baked into the protocol.
            payload["pw_nonce"] = json!(user.pw_nonce);
        }
        _ => {}
    }

    payload
}

/// Serialize the session part of an authentication response: wrapped
/// token pair plus expirations in unix milliseconds.
pub fn session_tokens(sessions: &Manager, session: &Session) -> ApiResult<Value> {
    let access = sessions.token(session, TokenKind::Access)?;
    let refresh = sessions.token(session, TokenKind::Refresh)?;

    Ok(json!({
        "access_token": access,
        "refresh_token": refresh,
        "access_expiration": sessions.access_token_expire_at(session).unix_millis(),
        "refresh_expiration": session.expire_at.unix_millis(),
    }))
}

/// Serialize the render of a session list, marking the current one.
pub fn sessions(list: &[Session], current_id: Option<Uuid>) -> Value {
    Value::Array(
        list.iter()
            .map(|s| {
                json!({
                    "uuid": s.id,
                    "created_at": s.created_at,
                    "updated_at": s.updated_at,
                    "api_version": s.api_version,
                    "user_agent": s.user_agent,
                    "current": Some(s.id) == current_id,
                })
            })
            .collect(),
    )
}
