//! Session management: token generation, validation and rotation.
//!
//! A session owns two raw random tokens. The wire never carries them
//! bare: they ride inside a PASETO v2 local envelope whose `sub` names
//! the session and whose `jti` is the raw token. Legacy JWTs from the
//! pre-session era are still honored and are revoked wholesale by
//! `password_updated_at`.

pub mod secure_token;

pub use secure_token::secure_token;

use crate::error::{ApiError, ApiResult};
use satchel_core::{TOKEN_ISSUER, Timestamp, jwt, paseto};
use satchel_store::{Session, SessionRepo, Store, User, UserRepo};
use std::sync::Arc;
use time::Duration;
use uuid::Uuid;

/// Length of the raw access/refresh tokens.
const TOKEN_LENGTH: usize = 24;

/// Which of the session's tokens an envelope wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access_token",
            Self::Refresh => "refresh_token",
        }
    }
}

/// Manages sessions and both token models.
#[derive(Clone)]
pub struct Manager {
    store: Arc<dyn Store>,
    signing_key: Vec<u8>,
    session_secret: [u8; 32],
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl Manager {
    pub fn new(
        store: Arc<dyn Store>,
        signing_key: Vec<u8>,
        session_secret: [u8; 32],
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            store,
            signing_key,
            session_secret,
            access_ttl,
            refresh_ttl,
        }
    }

    /// HS256 key for the legacy JWT model.
    pub fn jwt_signing_key(&self) -> &[u8] {
        &self.signing_key
    }

    /// Create a new session without user information. Not persisted.
    pub fn generate(&self) -> Session {
        Session {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            user_agent: String::new(),
            api_version: String::new(),
            access_token: secure_token(TOKEN_LENGTH),
            refresh_token: secure_token(TOKEN_LENGTH),
            expire_at: Timestamp::now().saturating_add(self.refresh_ttl),
            created_at: Timestamp::EPOCH,
            updated_at: Timestamp::EPOCH,
        }
    }

    /// Expiration of the session's access window, derived from the
    /// refresh expiration.
    pub fn access_token_expire_at(&self, session: &Session) -> Timestamp {
        session
            .expire_at
            .saturating_sub(self.refresh_ttl)
            .saturating_add(self.access_ttl)
    }

    /// Wrap one of the session's raw tokens in its signed envelope.
    pub fn token(&self, session: &Session, kind: TokenKind) -> ApiResult<String> {
        let issued_at = session.expire_at.saturating_sub(self.refresh_ttl);
        let (jti, exp) = match kind {
            TokenKind::Access => (
                session.access_token.clone(),
                self.access_token_expire_at(session),
            ),
            TokenKind::Refresh => (session.refresh_token.clone(), session.expire_at),
        };

        let claims = paseto::Claims {
            iss: TOKEN_ISSUER.to_string(),
            aud: kind.as_str().to_string(),
            sub: session.id,
            jti,
            iat: issued_at,
            exp,
        };
        Ok(paseto::encrypt(&claims, &self.session_secret)?)
    }

    /// Unwrap a session token envelope to `(session_id, raw_token)`.
    ///
    /// Deliberately does not distinguish expiration from invalidity; the
    /// store lookup makes that call.
    pub fn parse_token(&self, token: &str) -> satchel_core::Result<(Uuid, String)> {
        let claims = paseto::decrypt(token, &self.session_secret)?;
        if claims.iss != TOKEN_ISSUER {
            return Err(satchel_core::Error::InvalidToken(
                "unexpected issuer".to_string(),
            ));
        }
        Ok((claims.sub, claims.jti))
    }

    /// Load and validate the session behind an unwrapped access token.
    pub async fn validate(&self, session_id: Uuid, jti: &str) -> ApiResult<Session> {
        let session = self
            .store
            .get_session_by_access_token(session_id, jti)
            .await?
            .ok_or_else(ApiError::invalid_auth)?;

        let now = Timestamp::now();
        if session.expire_at < now {
            return Err(ApiError::invalid_auth());
        }
        if self.access_token_expire_at(&session) < now {
            return Err(ApiError::ExpiredAccessToken);
        }
        Ok(session)
    }

    /// Rotate the session's tokens and reset its refresh window.
    pub async fn regenerate(&self, session: &mut Session) -> ApiResult<()> {
        if session.expire_at < Timestamp::now() {
            return Err(ApiError::ExpiredRefreshToken);
        }

        let access_token = secure_token(TOKEN_LENGTH);
        let refresh_token = secure_token(TOKEN_LENGTH);
        let expire_at = Timestamp::now().saturating_add(self.refresh_ttl);

        let rotated = self
            .store
            .rotate_session_tokens(
                session.id,
                &session.access_token,
                &session.refresh_token,
                &access_token,
                &refresh_token,
                expire_at,
            )
            .await?;
        if !rotated {
            // A concurrent refresh won the race; this token pair is gone.
            return Err(ApiError::InvalidParameters(
                "The provided parameters are not valid.".to_string(),
            ));
        }

        session.access_token = access_token;
        session.refresh_token = refresh_token;
        session.expire_at = expire_at;
        Ok(())
    }

    /// Resolve a legacy JWT to its user.
    pub async fn user_from_jwt(&self, token: &str) -> ApiResult<User> {
        let claims = jwt::verify(token, &self.signing_key)
            .map_err(|_| ApiError::invalid_auth())?;

        let user = self
            .store
            .get_user(claims.user_uuid)
            .await?
            .ok_or_else(|| ApiError::InvalidAuth("No such user for given token.".to_string()))?;

        // A JWT minted before the last password change is revoked.
        if claims.iat < user.password_updated_at {
            return Err(ApiError::InvalidAuth("Revoked token.".to_string()));
        }
        Ok(user)
    }

    /// Resolve a wrapped access token to its user and session.
    pub async fn user_from_session_token(&self, token: &str) -> ApiResult<(User, Session)> {
        let claims = paseto::decrypt(token, &self.session_secret)
            .map_err(|_| ApiError::invalid_auth())?;
        if claims.iss != TOKEN_ISSUER || claims.aud != TokenKind::Access.as_str() {
            return Err(ApiError::invalid_auth());
        }

        let session = self.validate(claims.sub, &claims.jti).await?;
        let user = self
            .store
            .get_user(session.user_id)
            .await?
            .ok_or_else(ApiError::invalid_auth)?;
        Ok((user, session))
    }
}
