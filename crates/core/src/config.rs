//! Configuration types shared across crates.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::Duration;

/// Top-level application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Bind address, or a socket path when `socket_mode` is set.
    #[serde(default = "default_address")]
    pub address: String,
    /// Path of the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Disable the registration endpoints.
    #[serde(default)]
    pub no_registration: bool,
    /// Report the real version on `/version` instead of "n/a".
    #[serde(default)]
    pub show_real_version: bool,
    /// Listen on a Unix domain socket at `address`.
    #[serde(default)]
    pub socket_mode: bool,
    /// HS256 signing key for legacy JWTs.
    pub secret_key: String,
    /// Session token parameters.
    pub session: SessionConfig,
}

/// Session token configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// 32-byte session-token encryption key, hex encoded (64 characters).
    pub secret: String,
    /// Access token lifetime in seconds.
    #[serde(default = "default_access_token_ttl")]
    pub access_token_ttl: u64,
    /// Refresh token lifetime in seconds.
    #[serde(default = "default_refresh_token_ttl")]
    pub refresh_token_ttl: u64,
}

fn default_address() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("satchel.db")
}

fn default_access_token_ttl() -> u64 {
    3 * 24 * 60 * 60 // 3 days
}

fn default_refresh_token_ttl() -> u64 {
    365 * 24 * 60 * 60 // 1 year
}

impl SessionConfig {
    /// Access token lifetime as a Duration, saturating on overflow.
    pub fn access_ttl(&self) -> Duration {
        Duration::seconds(i64::try_from(self.access_token_ttl).unwrap_or(i64::MAX))
    }

    /// Refresh token lifetime as a Duration, saturating on overflow.
    pub fn refresh_ttl(&self) -> Duration {
        Duration::seconds(i64::try_from(self.refresh_token_ttl).unwrap_or(i64::MAX))
    }

    /// Decode the hex session secret into the 32-byte token key.
    pub fn secret_bytes(&self) -> Result<[u8; 32]> {
        let bytes = hex::decode(&self.secret)
            .map_err(|_| Error::Config("session.secret is not valid hex".to_string()))?;
        bytes.try_into().map_err(|_| {
            Error::Config("session.secret must be 32 bytes (64 hex characters)".to_string())
        })
    }
}

impl AppConfig {
    /// Create a test configuration with throwaway secrets.
    ///
    /// **For testing only.**
    pub fn for_testing() -> Self {
        Self {
            address: "127.0.0.1:0".to_string(),
            database_path: PathBuf::from("satchel-test.db"),
            no_registration: false,
            show_real_version: true,
            socket_mode: false,
            secret_key: "jwt-test-signing-key".to_string(),
            session: SessionConfig {
                // 32 bytes of 0xAB.
                secret: "ab".repeat(32),
                access_token_ttl: default_access_token_ttl(),
                refresh_token_ttl: default_refresh_token_ttl(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_bytes_round_trip() {
        let config = AppConfig::for_testing();
        let key = config.session.secret_bytes().unwrap();
        assert_eq!(key, [0xAB; 32]);
    }

    #[test]
    fn secret_bytes_rejects_bad_lengths() {
        let session = SessionConfig {
            secret: "abcd".to_string(),
            access_token_ttl: 1,
            refresh_token_ttl: 2,
        };
        assert!(session.secret_bytes().is_err());
    }

    #[test]
    fn ttl_accessors() {
        let session = SessionConfig {
            secret: String::new(),
            access_token_ttl: 60,
            refresh_token_ttl: 120,
        };
        assert_eq!(session.access_ttl(), Duration::seconds(60));
        assert_eq!(session.refresh_ttl(), Duration::seconds(120));
    }

    #[test]
    fn defaults_deserialize() {
        let config: AppConfig = serde_json::from_str(
            r#"{"secret_key":"k","session":{"secret":"00"}}"#,
        )
        .unwrap();
        assert_eq!(config.address, "127.0.0.1:5000");
        assert!(!config.no_registration);
        assert_eq!(config.session.access_token_ttl, 259_200);
    }
}
