//! Route configuration.

use crate::auth::session_middleware;
use crate::handlers;
use crate::state::AppState;
use axum::Router;
use axum::middleware;
use axum::routing::{delete, get, post, put};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let mut public = Router::new()
        .route("/", get(handlers::version))
        .route("/version", get(handlers::version))
        // Auth params, used for sign-in
        .route("/auth/params", get(handlers::auth_params))
        .route("/v1/login-params", get(handlers::auth_params))
        .route("/v2/login-params", post(handlers::auth_params_pkce))
        // Login
        .route("/auth/sign_in", post(handlers::login))
        .route("/v1/login", post(handlers::login))
        .route("/v2/login", post(handlers::login_pkce))
        // Token refresh authenticates through the request body
        .route("/session/refresh", post(handlers::refresh_session))
        .route("/v1/sessions/refresh", post(handlers::refresh_session));

    if !state.config.no_registration {
        public = public
            .route("/auth", post(handlers::register))
            .route("/v1/users", post(handlers::register));
    }

    let restricted = Router::new()
        .route("/auth/sign_out", post(handlers::logout))
        .route("/auth/update", post(handlers::update_user))
        .route("/auth/change_pw", post(handlers::change_password))
        .route("/v1/logout", post(handlers::logout))
        .route(
            "/v1/users/{id}/attributes/credentials",
            put(handlers::change_password),
        )
        .route("/sessions", get(handlers::list_sessions))
        .route("/session", delete(handlers::delete_session))
        .route("/session/all", delete(handlers::delete_all_sessions))
        .route(
            "/v1/sessions",
            get(handlers::list_sessions).delete(handlers::delete_all_sessions),
        )
        .route("/v1/sessions/{id}", delete(handlers::delete_session_by_id))
        .route("/items/sync", post(handlers::sync))
        .route("/items/backup", post(handlers::backup_items))
        .route("/items", delete(handlers::delete_items))
        .route("/v1/items", post(handlers::sync))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session_middleware,
        ));

    Router::new()
        .merge(public)
        .merge(restricted)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
