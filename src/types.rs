//! Session data model — identity, session, authorization fact, snapshot.
//!
//! DESIGN
//! ======
//! Identities and sessions are issued by the provider and replaced
//! wholesale, never patched. `Snapshot` is the one value consumers observe;
//! its constructors are the only way to pair a session with an
//! authorization fact, so a fact derived for one identity can never be
//! attached to another.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// IDENTITY + SESSION
// =============================================================================

/// The authenticated subject as issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_sign_in_at: Option<OffsetDateTime>,
}

/// A bounded-lifetime credential bound to an [`Identity`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub identity: Identity,
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl Session {
    #[must_use]
    pub fn identity_id(&self) -> Uuid {
        self.identity.id
    }

    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }
}

// Credentials stay out of log output.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

// =============================================================================
// AUTH EVENTS
// =============================================================================

/// Kind of authentication-state change pushed by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// One change notification: the event plus the session now current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChange {
    pub event: AuthEvent,
    pub session: Option<Session>,
}

// =============================================================================
// AUTHORIZATION FACT
// =============================================================================

/// "Is administrator", keyed by the identity it was derived for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizationFact {
    pub identity_id: Uuid,
    pub is_admin: bool,
}

impl AuthorizationFact {
    /// Fail-closed fact for an identity whose status could not be proven.
    #[must_use]
    pub fn denied(identity_id: Uuid) -> Self {
        Self { identity_id, is_admin: false }
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// The single consistent state tuple published to consumers.
///
/// While `loading` is true, `identity` and `is_admin` are not final.
/// Serialized form omits the session so credentials never leave the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub identity: Option<Identity>,
    #[serde(skip_serializing)]
    pub session: Option<Session>,
    pub is_admin: bool,
    pub loading: bool,
}

impl Snapshot {
    /// State before the first activation sequence completes.
    #[must_use]
    pub fn loading() -> Self {
        Self { identity: None, session: None, is_admin: false, loading: true }
    }

    /// Terminal logged-out state.
    #[must_use]
    pub fn signed_out() -> Self {
        Self { identity: None, session: None, is_admin: false, loading: false }
    }

    /// Authenticated state. A fact derived for a different identity is
    /// treated as not proven.
    #[must_use]
    pub fn authenticated(session: Session, fact: AuthorizationFact) -> Self {
        let is_admin = fact.is_admin && fact.identity_id == session.identity_id();
        Self { identity: Some(session.identity.clone()), session: Some(session), is_admin, loading: false }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// Logged out and no longer loading.
    #[must_use]
    pub fn is_signed_out(&self) -> bool {
        !self.loading && self.session.is_none()
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::loading()
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
