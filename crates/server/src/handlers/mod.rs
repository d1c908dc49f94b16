//! HTTP handlers: thin adapters between the wire and the services.

pub mod auth;
pub mod items;
pub mod sessions;

pub use auth::{
    auth_params, auth_params_pkce, change_password, login, login_pkce, logout, register,
    update_user,
};
pub use items::{backup_items, delete_items, sync};
pub use sessions::{
    delete_all_sessions, delete_session, delete_session_by_id, list_sessions, refresh_session,
};

use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

/// Server version banner.
pub async fn version(State(state): State<AppState>) -> Json<Value> {
    let version = if state.config.show_real_version {
        env!("CARGO_PKG_VERSION")
    } else {
        "n/a"
    };
    Json(json!({ "version": version }))
}
