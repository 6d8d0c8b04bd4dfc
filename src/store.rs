//! Session store — the single authoritative auth snapshot.
//!
//! SYSTEM CONTEXT
//! ==============
//! Pages and guards read `Snapshot` through a `SessionHandle`. The store
//! owns the provider subscription and is the only writer of the snapshot.
//!
//! DESIGN
//! ======
//! Every update sequence (initial fetch, change notification, refresh)
//! stamps a monotonically increasing token before its first suspension
//! point. A result is published only if its token is still the latest when
//! it completes; superseded results are discarded, never aborted, because
//! provider calls cannot be cancelled. The cursor lock is held while the
//! token is compared and the whole snapshot is replaced, and is never held
//! across an `.await`.
//!
//! ERROR HANDLING
//! ==============
//! Fetch and resolution failures degrade to a fail-closed snapshot and are
//! logged. `sign_out` is the only operation that returns an error.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::authz::AuthorizationResolver;
use crate::config::SyncConfig;
use crate::error::AuthError;
use crate::provider::{IdentityProvider, Subscription, SubscriptionId};
use crate::types::{AuthEvent, Session, Snapshot};

// =============================================================================
// SEQUENCE CURSOR
// =============================================================================

/// Latest stamped token and the session captured with it.
struct Cursor {
    token: u64,
    session: Option<Session>,
    closed: bool,
}

#[derive(Default)]
struct Lifecycle {
    started: bool,
    subscription: Option<SubscriptionId>,
    listener: Option<JoinHandle<()>>,
}

struct Inner<P: ?Sized> {
    provider: Arc<P>,
    resolver: AuthorizationResolver<P>,
    config: SyncConfig,
    cursor: Mutex<Cursor>,
    tx: watch::Sender<Snapshot>,
    lifecycle: Mutex<Lifecycle>,
}

impl<P: IdentityProvider + ?Sized> Inner<P> {
    fn cursor(&self) -> MutexGuard<'_, Cursor> {
        self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stamp a token without capturing a session yet.
    fn stamp(&self) -> Option<u64> {
        let mut cursor = self.cursor();
        if cursor.closed {
            return None;
        }
        cursor.token += 1;
        Some(cursor.token)
    }

    /// Record `session` as current if `token` has not been superseded.
    fn capture_if_latest(&self, token: u64, session: Option<Session>) -> bool {
        let mut cursor = self.cursor();
        if cursor.closed || cursor.token != token {
            return false;
        }
        cursor.session = session;
        true
    }

    /// Stamp a notification. A null session is published immediately;
    /// a non-null one is returned for resolution.
    fn begin_change(&self, event: AuthEvent, session: Option<Session>) -> Option<(u64, Session)> {
        let mut cursor = self.cursor();
        if cursor.closed {
            return None;
        }
        cursor.token += 1;
        cursor.session.clone_from(&session);
        debug!(?event, token = cursor.token, "auth change stamped");

        match session {
            Some(session) => Some((cursor.token, session)),
            None => {
                self.tx.send_replace(Snapshot::signed_out());
                info!(?event, token = cursor.token, "session cleared");
                None
            }
        }
    }

    /// Stamp a refresh for the most recently captured session.
    fn begin_refresh(&self) -> Option<(u64, Session)> {
        let mut cursor = self.cursor();
        if cursor.closed {
            return None;
        }
        let session = cursor.session.clone()?;
        cursor.token += 1;
        Some((cursor.token, session))
    }

    fn publish_if_latest(&self, token: u64, snapshot: Snapshot) -> bool {
        let cursor = self.cursor();
        if cursor.closed || cursor.token != token {
            debug!(token, latest = cursor.token, "discarding superseded snapshot");
            return false;
        }
        let identity_id = snapshot.identity.as_ref().map(|i| i.id);
        let is_admin = snapshot.is_admin;
        self.tx.send_replace(snapshot);
        info!(token, ?identity_id, is_admin, "snapshot published");
        true
    }

    /// Resolve authorization for `session` and publish if still latest.
    async fn complete(&self, token: u64, session: Session) -> bool {
        let fact = self.resolver.resolve(session.identity_id()).await;
        self.publish_if_latest(token, Snapshot::authenticated(session, fact))
    }
}

// =============================================================================
// SESSION STORE
// =============================================================================

/// Owner of the auth snapshot. Cloning shares the same store.
pub struct SessionStore<P: ?Sized> {
    inner: Arc<Inner<P>>,
}

impl<P: ?Sized> Clone for SessionStore<P> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<P: IdentityProvider + ?Sized + 'static> SessionStore<P> {
    /// Build a store in the loading state. Nothing runs until [`initialize`](Self::initialize).
    #[must_use]
    pub fn new(provider: Arc<P>, config: SyncConfig) -> Self {
        let resolver = AuthorizationResolver::new(Arc::clone(&provider), config.request_timeout);
        let (tx, _) = watch::channel(Snapshot::loading());
        Self {
            inner: Arc::new(Inner {
                provider,
                resolver,
                config,
                cursor: Mutex::new(Cursor { token: 0, session: None, closed: false }),
                tx,
                lifecycle: Mutex::new(Lifecycle::default()),
            }),
        }
    }

    /// Subscribe to change notifications, then load the current session.
    ///
    /// Runs once; later calls return immediately. A failed fetch publishes
    /// the logged-out snapshot and is not retried.
    pub async fn initialize(&self) {
        if !self.start_listener() {
            debug!("session store already initialized");
            return;
        }
        // PHASE: STAMP BEFORE FETCH
        // WHY: a notification arriving mid-fetch is newer than the fetch result.
        let Some(token) = self.inner.stamp() else {
            return;
        };

        let fetched = tokio::time::timeout(self.inner.config.request_timeout, self.inner.provider.get_current_session()).await;
        let session = match fetched {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                self.fail_initial(token, &AuthError::TransportFailure(e.to_string()));
                return;
            }
            Err(_) => {
                let reason = format!("no session answer within {}ms", self.inner.config.request_timeout.as_millis());
                self.fail_initial(token, &AuthError::TransportFailure(reason));
                return;
            }
        };

        if !self.inner.capture_if_latest(token, session.clone()) {
            debug!(token, "initial session superseded by a newer change");
            return;
        }
        info!(present = session.is_some(), "initial session loaded");
        match session {
            Some(session) => {
                self.inner.complete(token, session).await;
            }
            None => {
                self.inner.publish_if_latest(token, Snapshot::signed_out());
            }
        }
    }

    fn fail_initial(&self, token: u64, err: &AuthError) {
        warn!(error = %err, code = err.error_code(), "initial session fetch failed");
        self.inner.publish_if_latest(token, Snapshot::signed_out());
    }

    fn start_listener(&self) -> bool {
        let mut lifecycle = self.inner.lifecycle();
        if lifecycle.started || self.inner.cursor().closed {
            return false;
        }
        lifecycle.started = true;

        let Subscription { id, mut events } = self.inner.provider.subscribe();
        info!(subscription = id.0, "subscribed to auth changes");

        let inner = Arc::clone(&self.inner);
        let listener = tokio::spawn(async move {
            // Resolutions run concurrently; stamping happens in arrival order.
            let mut in_flight = JoinSet::new();
            loop {
                tokio::select! {
                    change = events.recv() => {
                        let Some(change) = change else { break };
                        if let Some((token, session)) = inner.begin_change(change.event, change.session) {
                            let inner = Arc::clone(&inner);
                            in_flight.spawn(async move {
                                inner.complete(token, session).await;
                            });
                        }
                    }
                    Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                        if let Err(e) = joined {
                            warn!(error = %e, "auth change resolution task failed");
                        }
                    }
                }
            }
            while in_flight.join_next().await.is_some() {}
            debug!("auth change stream ended");
        });

        lifecycle.subscription = Some(id);
        lifecycle.listener = Some(listener);
        true
    }

    /// Apply one change notification. Later notifications always win over
    /// earlier ones, whatever order their resolutions finish in.
    pub async fn on_change_notification(&self, event: AuthEvent, session: Option<Session>) {
        if let Some((token, session)) = self.inner.begin_change(event, session) {
            self.inner.complete(token, session).await;
        }
    }

    /// Re-resolve authorization for the current identity. No effect when
    /// logged out.
    pub async fn refresh(&self) {
        let Some((token, session)) = self.inner.begin_refresh() else {
            debug!("refresh skipped; no session");
            return;
        };
        self.inner.complete(token, session).await;
    }

    /// Ask the provider to end the session and wait for the resulting
    /// logged-out notification. State is not cleared optimistically.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::SignOutFailure`] if the provider rejects the call
    /// or the logged-out snapshot is not published within the configured bound.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let bound = self.inner.config.sign_out_timeout;
        let deadline = Instant::now() + bound;
        // Subscribed before the call so the acknowledgement cannot be missed.
        let mut rx = self.inner.tx.subscribe();
        let acknowledged = async move { rx.wait_for(Snapshot::is_signed_out).await.map(|_| ()) };

        let result = match tokio::time::timeout_at(deadline, self.inner.provider.sign_out()).await {
            Ok(Ok(())) => {
                match tokio::time::timeout_at(deadline, acknowledged).await {
                    Ok(Ok(_)) => Ok(()),
                    Ok(Err(_)) => Err(AuthError::SignOutFailure("snapshot channel closed".into())),
                    Err(_) => Err(AuthError::SignOutFailure(format!("not acknowledged within {}ms", bound.as_millis()))),
                }
            }
            Ok(Err(e)) => Err(AuthError::SignOutFailure(e.to_string())),
            Err(_) => Err(AuthError::SignOutFailure(format!("provider did not answer within {}ms", bound.as_millis()))),
        };

        match &result {
            Ok(()) => info!("sign-out acknowledged"),
            Err(e) => warn!(error = %e, code = e.error_code(), "sign-out failed"),
        }
        result
    }

    /// Unsubscribe and stop all in-flight work. Results that complete after
    /// teardown are discarded.
    pub fn teardown(&self) {
        {
            let mut cursor = self.inner.cursor();
            cursor.closed = true;
            cursor.token += 1;
        }
        let mut lifecycle = self.inner.lifecycle();
        if let Some(id) = lifecycle.subscription.take() {
            self.inner.provider.unsubscribe(id);
            info!(subscription = id.0, "unsubscribed from auth changes");
        }
        if let Some(listener) = lifecycle.listener.take() {
            listener.abort();
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.inner.tx.borrow().clone()
    }

    /// Receiver that observes every published snapshot.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.inner.tx.subscribe()
    }

    /// Consumer-facing handle: read access, `refresh`, `sign_out`.
    #[must_use]
    pub fn handle(&self) -> SessionHandle<P> {
        SessionHandle { store: self.clone() }
    }
}

// =============================================================================
// CONSUMER HANDLE
// =============================================================================

/// What pages and components get. No lifecycle control.
pub struct SessionHandle<P: ?Sized> {
    store: SessionStore<P>,
}

impl<P: ?Sized> Clone for SessionHandle<P> {
    fn clone(&self) -> Self {
        Self { store: self.store.clone() }
    }
}

impl<P: IdentityProvider + ?Sized + 'static> SessionHandle<P> {
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.store.watch()
    }

    pub async fn refresh(&self) {
        self.store.refresh().await;
    }

    /// # Errors
    ///
    /// See [`SessionStore::sign_out`].
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.store.sign_out().await
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
