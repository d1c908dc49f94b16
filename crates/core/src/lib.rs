//! Core protocol types and shared logic for the Satchel sync server.
//!
//! This crate defines the primitives every other crate builds on:
//! - API and protocol version dispatch
//! - Nanosecond-resolution timestamps used across the wire formats
//! - Sync/cursor token codec
//! - Legacy JWT (HS256) codec
//! - PASETO v2 local envelope for session tokens
//! - Configuration types

pub mod config;
pub mod cursor;
pub mod error;
pub mod jwt;
pub mod paseto;
pub mod timestamp;
pub mod version;

pub use config::{AppConfig, SessionConfig};
pub use error::{Error, Result};
pub use timestamp::Timestamp;
pub use version::ApiVersion;

/// Issuer claim carried by both JWT and PASETO tokens.
pub const TOKEN_ISSUER: &str = "standardfile";
