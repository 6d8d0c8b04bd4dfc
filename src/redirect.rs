//! Redirect reconciler — strips the one-time OAuth code from the address.
//!
//! DESIGN
//! ======
//! `sanitize` is the pure decision (address + session existence in,
//! corrected address out). `RedirectReconciler` applies it through a
//! `Navigator`, which replaces the visible location without adding a
//! history entry. The server-side callback consumes the code before the
//! browser ever gets here; this only removes what is left in the bar.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use url::Url;

use crate::config::SyncConfig;
use crate::types::Snapshot;

/// Query parameter carrying the exchange artifact.
pub const EXCHANGE_PARAM: &str = "code";

#[must_use]
pub fn has_exchange_artifact(address: &Url) -> bool {
    address.query_pairs().any(|(key, _)| key == EXCHANGE_PARAM)
}

/// Corrected address for `address`, or `None` when nothing needs to change.
///
/// The artifact is only removed once a session exists; the result keeps the
/// origin and replaces path, query and fragment with `destination`.
#[must_use]
pub fn sanitize(address: &Url, session_present: bool, destination: &str) -> Option<Url> {
    if !session_present || !has_exchange_artifact(address) {
        return None;
    }
    let mut clean = address.clone();
    clean.set_path(destination);
    clean.set_query(None);
    clean.set_fragment(None);
    Some(clean)
}

// =============================================================================
// NAVIGATOR
// =============================================================================

/// Read and replace the visible location.
pub trait Navigator: Send + Sync {
    /// Current address, `None` if it cannot be read.
    fn current(&self) -> Option<Url>;

    /// Replace the visible address in place (no new history entry).
    fn replace(&self, address: &Url);
}

/// Navigator over an in-memory address. Records every replacement.
pub struct MemoryNavigator {
    current: Mutex<Url>,
    replaced: Mutex<Vec<Url>>,
}

impl MemoryNavigator {
    #[must_use]
    pub fn new(address: Url) -> Self {
        Self { current: Mutex::new(address), replaced: Mutex::new(Vec::new()) }
    }

    fn current_lock(&self) -> MutexGuard<'_, Url> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Simulate the user or router moving to `address`.
    pub fn navigate(&self, address: Url) {
        *self.current_lock() = address;
    }

    #[must_use]
    pub fn replacements(&self) -> Vec<Url> {
        self.replaced.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Navigator for MemoryNavigator {
    fn current(&self) -> Option<Url> {
        Some(self.current_lock().clone())
    }

    fn replace(&self, address: &Url) {
        *self.current_lock() = address.clone();
        self.replaced
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(address.clone());
    }
}

// =============================================================================
// RECONCILER
// =============================================================================

pub struct RedirectReconciler<N: ?Sized> {
    navigator: Arc<N>,
    destination: String,
}

impl<N: Navigator + ?Sized + 'static> RedirectReconciler<N> {
    #[must_use]
    pub fn new(navigator: Arc<N>, config: &SyncConfig) -> Self {
        Self { navigator, destination: config.post_login_path.clone() }
    }

    /// Check the current address once. Returns true if it was replaced.
    pub fn reconcile(&self, session_present: bool) -> bool {
        let Some(address) = self.navigator.current() else {
            debug!("current address unavailable; skipping reconcile");
            return false;
        };
        let Some(clean) = sanitize(&address, session_present, &self.destination) else {
            return false;
        };
        self.navigator.replace(&clean);
        info!(path = clean.path(), "exchange artifact removed from address");
        true
    }

    /// Reconcile now and after every published snapshot until the store
    /// goes away or the task is aborted.
    pub fn spawn(self, mut snapshots: watch::Receiver<Snapshot>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let present = snapshots.borrow_and_update().is_authenticated();
                self.reconcile(present);
                if snapshots.changed().await.is_err() {
                    break;
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "redirect_test.rs"]
mod tests;
