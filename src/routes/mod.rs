//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The server side of the login flow: the OAuth provider redirects here with
//! a one-time code, which is exchanged before the browser reaches any page.

pub mod callback;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/auth/callback", get(callback::oauth_callback))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
