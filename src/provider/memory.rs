//! In-process identity provider — password accounts, sessions, one-time codes.
//!
//! DESIGN
//! ======
//! A single mutex guards all provider state. Every mutation that changes
//! the current session broadcasts an `AuthChange` to live subscribers while
//! the lock is held, so listeners observe changes in the order they happen.
//!
//! Accounts are keyed by normalized email. Passwords are stored only as a
//! salted SHA-256 digest.
//!
//! TRADE-OFFS
//! ==========
//! Code consumption is destructive (removed on first use, valid or expired)
//! to guarantee single use; a retried redirect must start a new login.
//! Expired codes that were never exchanged are pruned whenever a code is
//! issued or exchanged.

use std::collections::{HashMap, HashSet};
use std::fmt::Write;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use rand::Rng;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use super::{IdentityProvider, Subscription, SubscriptionId};
use crate::error::ProviderError;
use crate::types::{AuthChange, AuthEvent, Identity, Session};

const SESSION_TTL: time::Duration = time::Duration::hours(1);
const CODE_TTL: Duration = Duration::from_secs(5 * 60);
const MIN_PASSWORD_LEN: usize = 6;

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 32-byte hex token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// Generate a 16-byte hex one-time authorization code.
#[must_use]
pub(crate) fn generate_code() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// Lowercased, trimmed email with exactly one `@` and non-empty halves.
#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    let (local, domain) = normalized.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(normalized)
}

pub(crate) fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    bytes_to_hex(&hasher.finalize())
}

struct Credential {
    identity_id: Uuid,
    salt: String,
    password_hash: String,
}

impl Credential {
    fn verify(&self, password: &str) -> bool {
        hash_password(&self.salt, password) == self.password_hash
    }
}

struct PendingCode {
    identity_id: Uuid,
    expires_at: Instant,
}

struct MemoryState {
    reachable: bool,
    accounts: HashMap<Uuid, Identity>,
    credentials: HashMap<String, Credential>,
    admins: HashSet<Uuid>,
    current: Option<Session>,
    codes: HashMap<String, PendingCode>,
    code_ttl: Duration,
    subscribers: HashMap<SubscriptionId, mpsc::UnboundedSender<AuthChange>>,
    next_subscription: u64,
}

impl MemoryState {
    fn ensure_reachable(&self) -> Result<(), ProviderError> {
        if self.reachable { Ok(()) } else { Err(ProviderError::Unreachable) }
    }

    fn start_session(&mut self, identity_id: Uuid) -> Result<Session, ProviderError> {
        let now = OffsetDateTime::now_utc();
        let identity = self
            .accounts
            .get_mut(&identity_id)
            .ok_or_else(|| ProviderError::Other(format!("unknown identity {identity_id}")))?;
        identity.last_sign_in_at = Some(now);

        let session = Session {
            identity: identity.clone(),
            access_token: generate_token(),
            refresh_token: generate_token(),
            expires_at: now + SESSION_TTL,
        };
        self.current = Some(session.clone());
        self.broadcast(AuthEvent::SignedIn);
        Ok(session)
    }

    fn prune_expired_codes(&mut self, now: Instant) {
        self.codes.retain(|_, pending| pending.expires_at > now);
    }

    fn broadcast(&mut self, event: AuthEvent) {
        let change = AuthChange { event, session: self.current.clone() };
        // EDGE: a dropped receiver without unsubscribe is pruned here.
        self.subscribers.retain(|_, tx| tx.send(change.clone()).is_ok());
        debug!(?event, subscribers = self.subscribers.len(), "auth change broadcast");
    }
}

/// In-memory [`IdentityProvider`].
pub struct MemoryProvider {
    state: Mutex<MemoryState>,
}

impl MemoryProvider {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                reachable: true,
                accounts: HashMap::new(),
                credentials: HashMap::new(),
                admins: HashSet::new(),
                current: None,
                codes: HashMap::new(),
                code_ttl: CODE_TTL,
                subscribers: HashMap::new(),
                next_subscription: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sign up: create a password account and return its identity.
    ///
    /// No session is started; the caller signs in separately.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidEmail`] for a malformed address,
    /// [`ProviderError::InvalidCredentials`] for a password shorter than six
    /// characters, and [`ProviderError::AlreadyRegistered`] if the email is taken.
    pub fn register(&self, email: &str, password: &str) -> Result<Identity, ProviderError> {
        let email = normalize_email(email).ok_or(ProviderError::InvalidEmail)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ProviderError::InvalidCredentials);
        }
        let mut state = self.lock();
        state.ensure_reachable()?;
        if state.credentials.contains_key(&email) {
            return Err(ProviderError::AlreadyRegistered);
        }

        let identity = Identity {
            id: Uuid::new_v4(),
            email: email.clone(),
            created_at: OffsetDateTime::now_utc(),
            last_sign_in_at: None,
        };
        let salt = generate_code();
        let password_hash = hash_password(&salt, password);
        state.credentials.insert(email, Credential { identity_id: identity.id, salt, password_hash });
        state.accounts.insert(identity.id, identity.clone());
        info!(identity_id = %identity.id, "account registered");
        Ok(identity)
    }

    /// Grant or revoke administrator status.
    pub fn set_admin(&self, identity_id: Uuid, admin: bool) {
        let mut state = self.lock();
        if admin {
            state.admins.insert(identity_id);
        } else {
            state.admins.remove(&identity_id);
        }
    }

    /// Simulate an outage: while unreachable every call fails with
    /// [`ProviderError::Unreachable`].
    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    /// Credential sign-in: verify email and password, start a session and
    /// broadcast `SignedIn`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidCredentials`] for an unknown email or a
    /// wrong password, or [`ProviderError::Unreachable`] during an outage.
    pub fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, ProviderError> {
        let mut state = self.lock();
        state.ensure_reachable()?;
        let identity_id = normalize_email(email)
            .and_then(|email| state.credentials.get(&email))
            .filter(|credential| credential.verify(password))
            .map(|credential| credential.identity_id)
            .ok_or(ProviderError::InvalidCredentials)?;
        state.start_session(identity_id)
    }

    /// Issue a single-use authorization code, as an OAuth redirect would.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is unreachable or the identity is unknown.
    pub fn issue_code(&self, identity_id: Uuid) -> Result<String, ProviderError> {
        let mut state = self.lock();
        state.ensure_reachable()?;
        if !state.accounts.contains_key(&identity_id) {
            return Err(ProviderError::Other(format!("unknown identity {identity_id}")));
        }
        let now = Instant::now();
        state.prune_expired_codes(now);
        let code = generate_code();
        let expires_at = now + state.code_ttl;
        state.codes.insert(code.clone(), PendingCode { identity_id, expires_at });
        Ok(code)
    }

    /// Rotate the current session's credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is unreachable.
    pub fn refresh_session(&self) -> Result<Option<Session>, ProviderError> {
        let mut state = self.lock();
        state.ensure_reachable()?;
        let Some(current) = state.current.as_mut() else {
            return Ok(None);
        };
        current.access_token = generate_token();
        current.refresh_token = generate_token();
        current.expires_at = OffsetDateTime::now_utc() + SESSION_TTL;
        let refreshed = current.clone();
        state.broadcast(AuthEvent::TokenRefreshed);
        Ok(Some(refreshed))
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Codes issued but not yet exchanged or pruned.
    #[must_use]
    pub fn pending_code_count(&self) -> usize {
        self.lock().codes.len()
    }

    /// Override the one-time code lifetime (default five minutes).
    #[must_use]
    pub fn with_code_ttl(self, ttl: Duration) -> Self {
        self.lock().code_ttl = ttl;
        self
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl IdentityProvider for MemoryProvider {
    async fn get_current_session(&self) -> Result<Option<Session>, ProviderError> {
        let mut state = self.lock();
        state.ensure_reachable()?;
        let now = OffsetDateTime::now_utc();
        if state.current.as_ref().is_some_and(|s| s.is_expired_at(now)) {
            state.current = None;
            state.broadcast(AuthEvent::SignedOut);
        }
        Ok(state.current.clone())
    }

    async fn exchange_code_for_session(&self, code: &str) -> Result<Session, ProviderError> {
        let mut state = self.lock();
        state.ensure_reachable()?;
        let pending = state.codes.remove(code);
        let now = Instant::now();
        state.prune_expired_codes(now);
        let pending = pending.ok_or(ProviderError::InvalidCode)?;
        if pending.expires_at <= now {
            return Err(ProviderError::InvalidCode);
        }
        let session = state.start_session(pending.identity_id)?;
        info!(identity_id = %session.identity_id(), "authorization code exchanged");
        Ok(session)
    }

    fn subscribe(&self) -> Subscription {
        let (tx, events) = mpsc::unbounded_channel();
        let mut state = self.lock();
        state.next_subscription += 1;
        let id = SubscriptionId(state.next_subscription);
        state.subscribers.insert(id, tx);
        Subscription { id, events }
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.lock().subscribers.remove(&id);
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        let mut state = self.lock();
        state.ensure_reachable()?;
        // Acknowledged with a notification even when already logged out.
        state.current = None;
        state.broadcast(AuthEvent::SignedOut);
        Ok(())
    }

    async fn check_is_administrator(&self, identity_id: Uuid) -> Result<bool, ProviderError> {
        let state = self.lock();
        state.ensure_reachable()?;
        Ok(state.admins.contains(&identity_id))
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
