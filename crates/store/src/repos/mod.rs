//! Repository traits for store operations.

pub mod items;
pub mod pkce;
pub mod sessions;
pub mod users;

pub use items::{ItemQuery, ItemRepo};
pub use pkce::PkceRepo;
pub use sessions::SessionRepo;
pub use users::UserRepo;
