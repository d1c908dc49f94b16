//! Protocol services: versioned user operations, PKCE, and the sync engine.

pub mod pkce;
pub mod sync;
pub mod user;

pub use pkce::PkceService;
pub use sync::{SyncParams, SyncResponse, SyncService};
pub use user::UserService;

use satchel_core::ApiVersion;
use satchel_store::Session;

/// Request-scoped facts the services need besides their own parameters.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub api: ApiVersion,
    pub user_agent: String,
    /// The session the request rode in on, if any.
    pub session: Option<Session>,
}
