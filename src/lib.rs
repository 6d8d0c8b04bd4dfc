//! Session and admin-authorization synchronization for an authenticated
//! dashboard shell.
//!
//! SYSTEM CONTEXT
//! ==============
//! `store` keeps the one `{identity, session, is_admin, loading}` snapshot
//! that pages read, `authz` answers "is this identity an administrator",
//! `redirect` strips the one-time OAuth code from the address bar, and
//! `routes` hosts the server-side callback that exchanges that code.
//! Everything talks to the identity provider through `provider`.

pub mod authz;
#[cfg(feature = "hydrate")]
pub mod browser;
pub mod config;
pub mod error;
pub mod provider;
pub mod redirect;
pub mod routes;
pub mod state;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use authz::AuthorizationResolver;
pub use config::SyncConfig;
pub use error::{AuthError, ProviderError};
pub use provider::{IdentityProvider, Subscription, SubscriptionId};
pub use redirect::{Navigator, RedirectReconciler};
pub use store::{SessionHandle, SessionStore};
pub use types::{AuthChange, AuthEvent, AuthorizationFact, Identity, Session, Snapshot};
