//! Application state shared across handlers.

use crate::session;
use satchel_core::{AppConfig, Result};
use satchel_store::Store;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Persistence handle.
    pub store: Arc<dyn Store>,
    /// Session manager.
    pub sessions: session::Manager,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Fails when the session secret is not a 32-byte hex string.
    pub fn new(config: AppConfig, store: Arc<dyn Store>) -> Result<Self> {
        let sessions = session::Manager::new(
            store.clone(),
            config.secret_key.as_bytes().to_vec(),
            config.session.secret_bytes()?,
            config.session.access_ttl(),
            config.session.refresh_ttl(),
        );

        Ok(Self {
            config: Arc::new(config),
            store,
            sessions,
        })
    }
}
