//! Domain types and models

pub mod session;
pub mod user;

pub use session::{LoginGrant, LogoutReason, PersistedSession, Session, TokenGrant};
pub use user::{Role, User};
