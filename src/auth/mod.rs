//! Authentication session management.
//!
//! - [`SessionManager`]: restore, login, register, verify, refresh, logout
//! - [`SessionHandle`]: the single owner of the [`Session`] value
//! - [`SessionMirror`]: bus-driven copy for code that cannot hold the manager
//! - [`CredentialStore`]: the durable credential slots

pub mod api;
pub mod credentials;
mod handle;
pub mod mirror;
mod session;

pub use api::UserProfile;
pub use credentials::{Claims, Credential, CredentialStore};
pub use handle::{LifecycleState, Session, SessionHandle};
pub use mirror::SessionMirror;
pub use session::SessionManager;
