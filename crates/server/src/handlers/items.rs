//! Item handlers.

use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::service::{SyncParams, SyncResponse, SyncService};
use crate::state::AppState;
use axum::http::StatusCode;
use axum::{Extension, Json};
use axum::extract::State;

/// Save local changes and retrieve remote ones.
pub async fn sync(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(params): Json<SyncParams>,
) -> ApiResult<Json<SyncResponse>> {
    let service = SyncService::new(state.store.as_ref(), &current.user, params);
    let response = service.execute().await?;
    Ok(Json(response))
}

/// Write all user data to a backup extension.
///
/// Extension fan-out is not implemented; acknowledging the call keeps
/// clients that register backup extensions happy.
pub async fn backup_items() -> StatusCode {
    StatusCode::OK
}

/// Remove all defined items.
///
/// Undocumented endpoint not used by official clients; kept as a no-op.
pub async fn delete_items() -> StatusCode {
    StatusCode::NO_CONTENT
}
