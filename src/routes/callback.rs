//! OAuth callback — exchange the one-time code, then redirect.
//!
//! ERROR HANDLING
//! ==============
//! Exchange failures happen before any snapshot exists, so they are the one
//! error shown to the user: the redirect to the error entry point carries a
//! human-readable reason in `?error=`.

use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::Redirect;
use serde::Deserialize;
use tracing::{error, info, warn};
use url::{Url, form_urlencoded};

use crate::error::{AuthError, ProviderError};
use crate::provider::IdentityProvider;
use crate::redirect::EXCHANGE_PARAM;
use crate::state::AppState;
use crate::types::Session;

pub(crate) const NO_CODE_REASON: &str = "No authorization code";
pub(crate) const EXCHANGE_FAILED_REASON: &str = "OAuth failed";

/// Exchange `code` for a session within `timeout`.
///
/// # Errors
///
/// Returns [`AuthError::ExchangeFailure`] if the code is rejected or the
/// provider does not answer in time.
pub async fn exchange_code<P>(provider: &P, code: &str, timeout: Duration) -> Result<Session, AuthError>
where
    P: IdentityProvider + ?Sized,
{
    match tokio::time::timeout(timeout, provider.exchange_code_for_session(code)).await {
        Ok(result) => result.map_err(AuthError::ExchangeFailure),
        Err(_) => Err(AuthError::ExchangeFailure(ProviderError::Unreachable)),
    }
}

/// Fixed origin `next` is resolved against; only its path and query survive.
const NEXT_BASE: &str = "https://callback.invalid/";

/// `next` as a clean same-origin path, otherwise `default`.
///
/// The exchange `code` pair is dropped from the query so the destination
/// never carries the artifact.
#[must_use]
pub fn safe_next(next: Option<&str>, default: &str) -> String {
    next.and_then(clean_next).unwrap_or_else(|| default.to_owned())
}

fn clean_next(next: &str) -> Option<String> {
    // EDGE: browsers drop tab/CR/LF when parsing Location, so "/\t/host" would become "//host".
    if !next.starts_with('/') || next.chars().any(|c| c.is_control() || c.is_whitespace() || c == '\\') {
        return None;
    }
    let base = Url::parse(NEXT_BASE).ok()?;
    let mut url = base.join(next).ok()?;
    if url.origin() != base.origin() {
        return None;
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != EXCHANGE_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    let mut path = url.path().to_owned();
    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }
    Some(path)
}

#[must_use]
pub fn error_redirect(error_path: &str, reason: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("error", reason)
        .finish();
    format!("{error_path}?{query}")
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    next: Option<String>,
}

/// `GET /auth/callback`: exchange code, redirect to `next` (default
/// post-login path) or to the error entry point.
pub async fn oauth_callback(State(state): State<AppState>, Query(params): Query<CallbackQuery>) -> Redirect {
    let config = &state.config;
    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        warn!("oauth callback without authorization code");
        return Redirect::temporary(&error_redirect(&config.error_path, NO_CODE_REASON));
    };

    match exchange_code(state.provider.as_ref(), &code, config.request_timeout).await {
        Ok(session) => {
            info!(identity_id = %session.identity_id(), "oauth callback complete");
            Redirect::temporary(&safe_next(params.next.as_deref(), &config.post_login_path))
        }
        Err(e) => {
            error!(error = %e, code = e.error_code(), "oauth code exchange failed");
            Redirect::temporary(&error_redirect(&config.error_path, EXCHANGE_FAILED_REASON))
        }
    }
}

#[cfg(test)]
#[path = "callback_test.rs"]
mod tests;
