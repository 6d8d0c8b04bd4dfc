//! Identity-provider capabilities consumed by the session core.
//!
//! SYSTEM CONTEXT
//! ==============
//! Transport to the real provider belongs to the environment. The core only
//! sees this trait: fetch the current session, exchange a one-time code,
//! subscribe to change notifications, sign out, and the privileged admin
//! predicate. `memory` is an in-process implementation for local
//! development and end-to-end tests.

pub mod memory;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::ProviderError;
use crate::types::{AuthChange, Session};

/// Opaque handle for one change-notification listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// A live change-notification stream. Dropping the receiver stops delivery;
/// [`IdentityProvider::unsubscribe`] releases the provider-side listener.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub events: mpsc::UnboundedReceiver<AuthChange>,
}

#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Current session state, `None` when logged out.
    async fn get_current_session(&self) -> Result<Option<Session>, ProviderError>;

    /// Consume a one-time authorization code.
    async fn exchange_code_for_session(&self, code: &str) -> Result<Session, ProviderError>;

    /// Register a listener for sign-in, sign-out, token-refresh and
    /// identity-switch notifications.
    fn subscribe(&self) -> Subscription;

    fn unsubscribe(&self, id: SubscriptionId);

    async fn sign_out(&self) -> Result<(), ProviderError>;

    /// Server-trusted "is administrator" predicate.
    async fn check_is_administrator(&self, identity_id: Uuid) -> Result<bool, ProviderError>;
}
