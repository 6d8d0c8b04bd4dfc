//! Browser navigator backed by `window.location` and `window.history`.
//!
//! Only compiled with the `hydrate` feature.

use tracing::warn;
use url::Url;
use wasm_bindgen::JsValue;

use crate::redirect::Navigator;

/// [`Navigator`] for the page the code runs in.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserNavigator;

impl Navigator for BrowserNavigator {
    fn current(&self) -> Option<Url> {
        let href = web_sys::window()?.location().href().ok()?;
        Url::parse(&href).ok()
    }

    fn replace(&self, address: &Url) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let history = match window.history() {
            Ok(history) => history,
            Err(e) => {
                warn!(error = ?e, "history unavailable");
                return;
            }
        };
        if let Err(e) = history.replace_state_with_url(&JsValue::NULL, "", Some(address.as_str())) {
            warn!(error = ?e, "history.replaceState failed");
        }
    }
}
