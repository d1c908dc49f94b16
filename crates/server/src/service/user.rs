//! Versioned user service: register, login, auth-params update and
//! password change.
//!
//! The response shape dispatches twice: on the request's API version and
//! on the user's protocol version. Only a 20200115 request for a
//! protocol-004 account gets the session model; everything else receives
//! the legacy `{user, token}` JWT shape.

use crate::error::{ApiError, ApiResult};
use crate::serializer;
use crate::service::RequestContext;
use crate::session::Manager;
use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core};
use satchel_core::version::{self, ApiVersion};
use satchel_core::{TOKEN_ISSUER, Timestamp, jwt};
use satchel_store::{Session, SessionRepo, Store, User, UserRepo};
use serde::Deserialize;
use serde_json::{Value, json};

/// Parameters used to register a user.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterParams {
    #[serde(default)]
    pub api: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default, rename = "password")]
    pub registration_password: String,
    #[serde(default, rename = "pw_nonce")]
    pub password_nonce: String,
    /// Required before protocol 004.
    #[serde(default, rename = "pw_cost")]
    pub password_cost: Option<i64>,
    #[serde(default)]
    pub version: String,
}

/// Parameters used to log a user in.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginParams {
    #[serde(default)]
    pub api: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub code_challenge: String,
    #[serde(default)]
    pub code_verifier: String,
}

/// Parameters used to update a user's auth params.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserParams {
    #[serde(default)]
    pub api: Option<String>,
    #[serde(default, rename = "pw_cost")]
    pub password_cost: Option<i64>,
    #[serde(default, rename = "pw_nonce")]
    pub password_nonce: String,
    #[serde(default, rename = "pw_salt")]
    pub password_salt: String,
    #[serde(default)]
    pub version: String,
}

/// Parameters used to change a user's password (and optionally email).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePasswordParams {
    #[serde(flatten)]
    pub update: UpdateUserParams,
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub new_email: String,
}

/// Hash a password with Argon2id into a PHC string.
pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut rand_core::OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("could not hash password: {e}")))
}

/// Verify a password against its stored PHC string (constant-time).
pub fn verify_password(password: &str, phc: &str) -> ApiResult<bool> {
    let parsed = PasswordHash::new(phc)
        .map_err(|e| ApiError::Internal(format!("corrupt password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Service handling API versioning of the user operations.
pub struct UserService<'a> {
    store: &'a dyn Store,
    sessions: &'a Manager,
    api: ApiVersion,
}

impl<'a> UserService<'a> {
    pub fn new(store: &'a dyn Store, sessions: &'a Manager, api: ApiVersion) -> Self {
        Self {
            store,
            sessions,
            api,
        }
    }

    /// Register a new account and authenticate it.
    pub async fn register(
        &self,
        params: RegisterParams,
        ctx: &RequestContext,
    ) -> ApiResult<Value> {
        if self
            .store
            .get_user_by_email(&params.email)
            .await?
            .is_some()
        {
            // Protocol-mandated 401, even though no authentication is
            // involved here.
            return Err(ApiError::Credentials(
                "This email is already registered.".to_string(),
            ));
        }

        let mut user = User::new();
        user.email = params.email;
        user.pw_nonce = params.password_nonce;
        user.pw_cost = params.password_cost.unwrap_or(0);
        if !params.version.is_empty() {
            user.version = params.version;
        }
        user.password = hash_password(&params.registration_password)?;
        user.password_updated_at = Timestamp::now().unix_seconds();

        self.store.create_user(&mut user).await?;

        self.successful_authentication(&user, ctx, ctx.session.clone())
            .await
    }

    /// Authenticate an existing account.
    pub async fn login(&self, params: LoginParams, ctx: &RequestContext) -> ApiResult<Value> {
        let user = self
            .store
            .get_user_by_email(&params.email)
            .await?
            .ok_or_else(|| ApiError::Credentials("Invalid email or password.".to_string()))?;

        if !verify_password(&params.password, &user.password)? {
            return Err(ApiError::Credentials(
                "Invalid email or password.".to_string(),
            ));
        }

        self.successful_authentication(&user, ctx, ctx.session.clone())
            .await
    }

    /// Update the user's auth params.
    pub async fn update(
        &self,
        user: &mut User,
        params: UpdateUserParams,
        ctx: &RequestContext,
    ) -> ApiResult<Value> {
        apply(user, &params);
        self.store.update_user(user).await?;
        self.successful_authentication(user, ctx, ctx.session.clone())
            .await
    }

    /// Change the user's password (and optionally email).
    ///
    /// Every session of the user is terminated; the response rides a
    /// fresh one. JWTs die via `password_updated_at`.
    pub async fn change_password(
        &self,
        user: &mut User,
        params: UpdatePasswordParams,
        ctx: &RequestContext,
    ) -> ApiResult<Value> {
        if !verify_password(&params.current_password, &user.password)? {
            return Err(ApiError::Credentials(
                "The current password you entered is incorrect. Please try again.".to_string(),
            ));
        }

        user.password = hash_password(&params.new_password)?;
        user.password_updated_at = Timestamp::now().unix_seconds();

        if !params.new_email.is_empty() && params.new_email != user.email {
            if self
                .store
                .get_user_by_email(&params.new_email)
                .await?
                .is_some()
            {
                return Err(ApiError::Credentials(
                    "This email is already registered.".to_string(),
                ));
            }
            user.email = params.new_email.clone();
        }

        apply(user, &params.update);
        self.store.update_user(user).await?;

        let terminated = self.store.delete_sessions_for_user(user.id).await?;
        tracing::info!(user_id = %user.id, sessions = terminated, "password changed, sessions terminated");

        let mut response = self.successful_authentication(user, ctx, None).await?;
        response["key_params"] = serializer::auth_params(user);
        Ok(response)
    }

    /// Build the dispatched authentication response.
    async fn successful_authentication(
        &self,
        user: &User,
        ctx: &RequestContext,
        session: Option<Session>,
    ) -> ApiResult<Value> {
        if self.api.supports_sessions() && version::supports_sessions(&user.version) {
            let session = match session {
                Some(session) => session,
                None => self.create_session(user, ctx).await?,
            };
            return Ok(json!({
                "user": serializer::user(user),
                "session": serializer::session_tokens(self.sessions, &session)?,
            }));
        }

        Ok(json!({
            "user": serializer::user(user),
            "token": self.create_jwt(user)?,
        }))
    }

    async fn create_session(&self, user: &User, ctx: &RequestContext) -> ApiResult<Session> {
        let mut session = self.sessions.generate();
        session.user_id = user.id;
        session.api_version = ctx.api.as_str().to_string();
        session.user_agent = ctx.user_agent.clone();

        self.store
            .create_session(&mut session)
            .await
            .map_err(|_| ApiError::BadRequest("Could not create a session.".to_string()))?;
        Ok(session)
    }

    fn create_jwt(&self, user: &User) -> ApiResult<String> {
        let claims = jwt::Claims {
            user_uuid: user.id,
            iss: TOKEN_ISSUER.to_string(),
            iat: Timestamp::now().unix_seconds(),
        };
        Ok(jwt::sign(&claims, self.sessions.jwt_signing_key())?)
    }
}

/// Update the given user with the given params, strong-parameter style:
/// only meaningful values are applied.
fn apply(user: &mut User, params: &UpdateUserParams) {
    if let Some(cost) = params.password_cost {
        if cost > 0 {
            user.pw_cost = cost;
        }
    }
    if !params.password_nonce.is_empty() {
        user.pw_nonce = params.password_nonce.clone();
    }
    if !params.password_salt.is_empty() {
        user.pw_salt = params.password_salt.clone();
    }
    if !params.version.is_empty() {
        user.version = params.version.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_and_verify() {
        let phc = hash_password("password42").unwrap();
        assert!(phc.starts_with("$argon2id$"));
        assert!(verify_password("password42", &phc).unwrap());
        assert!(!verify_password("password43", &phc).unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("password42").unwrap();
        let b = hash_password("password42").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn apply_ignores_empty_values() {
        let mut user = User {
            pw_cost: 110_000,
            pw_nonce: "nonce".to_string(),
            version: "003".to_string(),
            ..User::new()
        };

        apply(&mut user, &UpdateUserParams::default());
        assert_eq!(user.pw_cost, 110_000);
        assert_eq!(user.pw_nonce, "nonce");
        assert_eq!(user.version, "003");

        apply(
            &mut user,
            &UpdateUserParams {
                api: None,
                password_cost: Some(0),
                password_nonce: "new-nonce".to_string(),
                password_salt: String::new(),
                version: "004".to_string(),
            },
        );
        assert_eq!(user.pw_cost, 110_000);
        assert_eq!(user.pw_nonce, "new-nonce");
        assert_eq!(user.version, "004");
    }

    #[test]
    fn update_password_params_flatten() {
        let params: UpdatePasswordParams = serde_json::from_str(
            r#"{"api":"20200115","current_password":"a","new_password":"b","pw_nonce":"n","version":"004"}"#,
        )
        .unwrap();
        assert_eq!(params.current_password, "a");
        assert_eq!(params.update.password_nonce, "n");
        assert_eq!(params.update.version, "004");
    }
}
