//! Authorization resolver — privileged "is administrator" lookup.
//!
//! ERROR HANDLING
//! ==============
//! Fail-closed: any provider error, malformed answer, or timeout yields a
//! denied fact. Nothing is cached; every session change or refresh goes back
//! to the source of truth because admin status can change out of band.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AuthError;
use crate::provider::IdentityProvider;
use crate::types::AuthorizationFact;

pub struct AuthorizationResolver<P: ?Sized> {
    provider: Arc<P>,
    timeout: Duration,
}

impl<P: IdentityProvider + ?Sized> AuthorizationResolver<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Resolve administrator status for `identity_id`. Never fails: errors
    /// are logged and produce a denied fact.
    pub async fn resolve(&self, identity_id: Uuid) -> AuthorizationFact {
        match self.try_resolve(identity_id).await {
            Ok(is_admin) => {
                debug!(%identity_id, is_admin, "admin status resolved");
                AuthorizationFact { identity_id, is_admin }
            }
            Err(e) => {
                warn!(%identity_id, error = %e, code = e.error_code(), "admin resolution failed; denying");
                AuthorizationFact::denied(identity_id)
            }
        }
    }

    async fn try_resolve(&self, identity_id: Uuid) -> Result<bool, AuthError> {
        match tokio::time::timeout(self.timeout, self.provider.check_is_administrator(identity_id)).await {
            Ok(Ok(is_admin)) => Ok(is_admin),
            Ok(Err(e)) => Err(AuthError::AuthorizationDenied(e.to_string())),
            Err(_) => Err(AuthError::AuthorizationDenied(format!("no answer within {}ms", self.timeout.as_millis()))),
        }
    }
}

#[cfg(test)]
#[path = "authz_test.rs"]
mod tests;
