//! Authentication middleware.
//!
//! The bearer credential's shape picks the verification path: two `.`
//! separators mean a legacy JWT, the `v2.local.` prefix means a wrapped
//! session access token. Success populates the request-scoped
//! [`CurrentUser`]; failures surface as 401 or, for an elapsed access
//! window, 498.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use satchel_core::paseto;
use satchel_store::{Session, User};

/// Authenticated request context.
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub user: User,
    /// Present only for the session token model; JWT requests ride
    /// without one.
    pub session: Option<Session>,
}

/// Extract the bearer token from the Authorization header.
/// Per RFC 6750, the "Bearer" scheme is case-insensitive.
fn extract_bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            if v.len() >= 7 && v[..7].eq_ignore_ascii_case("bearer ") {
                Some(v[7..].trim())
            } else {
                None
            }
        })
        .filter(|token| !token.is_empty())
}

/// Middleware guarding the restricted routes.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(&req).ok_or_else(ApiError::invalid_auth)?;

    let current = if token.matches('.').count() == 2 && !token.starts_with(paseto::HEADER) {
        let user = state.sessions.user_from_jwt(token).await?;
        CurrentUser {
            user,
            session: None,
        }
    } else if token.starts_with(paseto::HEADER) {
        let (user, session) = state.sessions.user_from_session_token(token).await?;
        CurrentUser {
            user,
            session: Some(session),
        }
    } else {
        return Err(ApiError::invalid_auth());
    };

    req.extensions_mut().insert(current);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with_auth(value: &str) -> Request {
        Request::builder()
            .header(AUTHORIZATION, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn bearer_extraction() {
        assert_eq!(
            extract_bearer_token(&request_with_auth("Bearer abc")),
            Some("abc")
        );
        assert_eq!(
            extract_bearer_token(&request_with_auth("bEaReR abc")),
            Some("abc")
        );
        assert_eq!(extract_bearer_token(&request_with_auth("Basic abc")), None);
        assert_eq!(extract_bearer_token(&request_with_auth("Bearer ")), None);
        assert_eq!(
            extract_bearer_token(&Request::builder().body(Body::empty()).unwrap()),
            None
        );
    }
}
