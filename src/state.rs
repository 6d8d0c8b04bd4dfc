//! Shared state for the OAuth callback routes.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! The provider is the same capability the browser-side store talks to;
//! the callback only ever uses its code exchange.

use std::sync::Arc;

use crate::config::SyncConfig;
use crate::provider::IdentityProvider;

/// Clone is required by Axum; all inner fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn IdentityProvider>,
    pub config: Arc<SyncConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>, config: SyncConfig) -> Self {
        Self { provider, config: Arc::new(config) }
    }
}
