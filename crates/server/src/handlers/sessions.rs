//! Session lifecycle handlers.

use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::serializer;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use satchel_core::Timestamp;
use satchel_store::SessionRepo;
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

/// List active sessions of the current user, marking the current one.
pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    let sessions = state
        .store
        .list_active_sessions(current.user.id, Timestamp::now())
        .await?;
    let current_id = current.session.map(|s| s.id);
    Ok(Json(serializer::sessions(&sessions, current_id)))
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshSessionParams {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
}

/// Obtain a new pair of access and refresh tokens.
pub async fn refresh_session(
    State(state): State<AppState>,
    Json(params): Json<RefreshSessionParams>,
) -> ApiResult<Json<Value>> {
    if params.access_token.is_empty() || params.refresh_token.is_empty() {
        return Err(ApiError::InvalidParameters(
            "Please provide all required parameters.".to_string(),
        ));
    }

    let invalid =
        || ApiError::InvalidParameters("The provided parameters are not valid.".to_string());

    let access = state.sessions.parse_token(&params.access_token);
    let refresh = state.sessions.parse_token(&params.refresh_token);
    let ((access_sid, access_jti), (refresh_sid, refresh_jti)) = match (access, refresh) {
        (Ok(a), Ok(r)) => (a, r),
        _ => return Err(invalid()),
    };
    if access_sid != refresh_sid {
        return Err(invalid());
    }

    let mut session = state
        .store
        .get_session_by_tokens(access_sid, &access_jti, &refresh_jti)
        .await?
        .ok_or_else(invalid)?;

    state.sessions.regenerate(&mut session).await?;

    Ok(Json(json!({
        "session": serializer::session_tokens(&state.sessions, &session)?,
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteSessionParams {
    #[serde(default)]
    pub uuid: Option<Uuid>,
}

/// Terminate the session named in the request body.
pub async fn delete_session(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    // The body is optional on the wire; an absent or unreadable one gets
    // its own message.
    let params: DeleteSessionParams = if body.is_empty() {
        DeleteSessionParams::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|_| ApiError::BadRequest("Could not get session UUID.".to_string()))?
    };

    let id = params
        .uuid
        .ok_or_else(|| ApiError::BadRequest("Please provide the session identifier.".to_string()))?;
    terminate_session(&state, &current, id).await
}

/// Terminate the session named in the path.
pub async fn delete_session_by_id(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    terminate_session(&state, &current, id).await
}

async fn terminate_session(
    state: &AppState,
    current: &CurrentUser,
    id: Uuid,
) -> ApiResult<StatusCode> {
    if current.session.as_ref().map(|s| s.id) == Some(id) {
        return Err(ApiError::BadRequest(
            "You can not delete your current session.".to_string(),
        ));
    }

    let session = state
        .store
        .get_user_session(id, current.user.id)
        .await?
        .ok_or_else(|| {
            ApiError::BadRequest("No session exists with the provided identifier.".to_string())
        })?;

    state.store.delete_session(session.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Terminate all sessions of the current user except the current one.
pub async fn delete_all_sessions(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<StatusCode> {
    match &current.session {
        Some(session) => {
            state
                .store
                .delete_other_sessions(current.user.id, session.id)
                .await?;
        }
        None => {
            // JWT-authenticated requests have no session to spare.
            state
                .store
                .delete_sessions_for_user(current.user.id)
                .await?;
        }
    }
    Ok(StatusCode::NO_CONTENT)
}
