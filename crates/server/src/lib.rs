//! HTTP server for the Satchel encrypted-note sync protocol.
//!
//! This crate provides the protocol surface:
//! - Registration, login (plain and PKCE), auth-params
//! - Session lifecycle: refresh, listing, termination
//! - The item sync engine with both conflict-reporting wire formats
//! - Legacy JWT and session-token authentication middleware

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod serializer;
pub mod service;
pub mod session;
pub mod state;

pub use auth::CurrentUser;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
