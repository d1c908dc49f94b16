//! Authentication handlers.

use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::serializer;
use crate::service::user::{LoginParams, RegisterParams, UpdatePasswordParams, UpdateUserParams};
use crate::service::{PkceService, RequestContext, UserService};
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::http::header::USER_AGENT;
use axum::{Extension, Json};
use satchel_core::version::{self, ApiVersion, PROTOCOL_VERSION_2, PROTOCOL_VERSION_4};
use satchel_store::{Session, SessionRepo, UserRepo};
use serde::Deserialize;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

fn request_context(
    api: Option<&str>,
    headers: &HeaderMap,
    session: Option<Session>,
) -> RequestContext {
    RequestContext {
        api: ApiVersion::from_param(api),
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string(),
        session,
    }
}

/// Register a new user.
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(params): Json<RegisterParams>,
) -> ApiResult<Json<Value>> {
    if params.email.is_empty() {
        return Err(ApiError::Credentials("No email provided.".to_string()));
    }
    if params.registration_password.is_empty() {
        return Err(ApiError::Credentials("No password provided.".to_string()));
    }
    if params.password_nonce.is_empty() {
        return Err(ApiError::Credentials("No nonce provided.".to_string()));
    }
    // Protocols before 004 derive keys from an explicit KDF cost.
    let effective_version = if params.version.is_empty() {
        PROTOCOL_VERSION_2
    } else {
        params.version.as_str()
    };
    if version::version_lt(PROTOCOL_VERSION_4, effective_version)
        && params.password_cost.unwrap_or(0) <= 0
    {
        return Err(ApiError::Credentials(
            "No password cost provided.".to_string(),
        ));
    }

    let ctx = request_context(params.api.as_deref(), &headers, None);
    let service = UserService::new(state.store.as_ref(), &state.sessions, ctx.api);
    let response = service.register(params, &ctx).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct AuthParamsQuery {
    #[serde(default)]
    pub email: String,
}

/// Auth params for an email (query form, used for sign-in).
pub async fn auth_params(
    State(state): State<AppState>,
    Query(query): Query<AuthParamsQuery>,
) -> ApiResult<Json<Value>> {
    if query.email.is_empty() {
        return Err(ApiError::Credentials("No email provided.".to_string()));
    }
    params_payload(&state, &query.email).await
}

/// Auth params with PKCE challenge storage (API 20200115).
pub async fn auth_params_pkce(
    State(state): State<AppState>,
    Json(params): Json<LoginParams>,
) -> ApiResult<Json<Value>> {
    if params.email.is_empty() {
        return Err(ApiError::BadRequest(
            "Please provide an email address.".to_string(),
        ));
    }
    if params.code_challenge.is_empty() {
        return Err(ApiError::BadRequest(
            "Please provide the code challenge parameter.".to_string(),
        ));
    }

    PkceService::new(state.store.as_ref())
        .store_challenge(&params.code_challenge)
        .await?;

    params_payload(&state, &params.email).await
}

async fn params_payload(state: &AppState, email: &str) -> ApiResult<Json<Value>> {
    match state.store.get_user_by_email(email).await? {
        Some(user) => Ok(Json(serializer::auth_params(&user))),
        None => {
            // Unknown emails must be indistinguishable from known ones to
            // a passive observer: answer deterministically with
            // latest-protocol pseudo-params.
            let hostname = gethostname::gethostname().to_string_lossy().into_owned();
            let nonce = hex::encode(Sha256::digest(format!("{email}{hostname}").as_bytes()));
            Ok(Json(json!({
                "identifier": email,
                "nonce": nonce,
                "version": PROTOCOL_VERSION_4,
            })))
        }
    }
}

/// Authenticate a user with email and password.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(params): Json<LoginParams>,
) -> ApiResult<Json<Value>> {
    if params.email.is_empty() || params.password.is_empty() {
        return Err(ApiError::BadRequest(
            "No email or password provided.".to_string(),
        ));
    }

    let ctx = request_context(params.api.as_deref(), &headers, None);
    let service = UserService::new(state.store.as_ref(), &state.sessions, ctx.api);
    let response = service.login(params, &ctx).await?;
    Ok(Json(response))
}

/// Authenticate a user, verifying the PKCE code verifier against the
/// challenge stored by `auth_params_pkce`.
pub async fn login_pkce(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(params): Json<LoginParams>,
) -> ApiResult<Json<Value>> {
    if params.email.is_empty() || params.password.is_empty() || params.code_verifier.is_empty() {
        return Err(ApiError::Credentials(
            "Invalid login credentials.".to_string(),
        ));
    }

    let challenge = PkceService::compute_challenge(&params.code_verifier);
    PkceService::new(state.store.as_ref())
        .check_challenge(&challenge)
        .await?;

    let ctx = request_context(params.api.as_deref(), &headers, None);
    let service = UserService::new(state.store.as_ref(), &state.sessions, ctx.api);
    let response = service.login(params, &ctx).await?;
    Ok(Json(response))
}

/// Terminate the current session.
pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<axum::http::StatusCode> {
    if let Some(session) = current.session {
        state.store.delete_session(session.id).await?;
    }
    Ok(axum::http::StatusCode::NO_CONTENT)
}

/// Update the current user's auth params.
pub async fn update_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    headers: HeaderMap,
    Json(params): Json<UpdateUserParams>,
) -> ApiResult<Json<Value>> {
    let ctx = request_context(params.api.as_deref(), &headers, current.session);
    let service = UserService::new(state.store.as_ref(), &state.sessions, ctx.api);

    let mut user = current.user;
    let response = service.update(&mut user, params, &ctx).await?;
    Ok(Json(response))
}

/// Change the current user's password (and optionally email).
pub async fn change_password(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    headers: HeaderMap,
    Json(params): Json<UpdatePasswordParams>,
) -> ApiResult<Json<Value>> {
    if params.current_password.is_empty() {
        return Err(ApiError::Credentials(
            "Your current password is required to change your password. \
             Please update your application if you do not see this option."
                .to_string(),
        ));
    }
    if params.new_password.is_empty() {
        return Err(ApiError::Credentials(
            "Your new password is required to change your password. \
             Please update your application if you do not see this option."
                .to_string(),
        ));
    }

    let ctx = request_context(params.update.api.as_deref(), &headers, current.session);
    let service = UserService::new(state.store.as_ref(), &state.sessions, ctx.api);

    let mut user = current.user;
    let response = service.change_password(&mut user, params, &ctx).await?;
    Ok(Json(response))
}
