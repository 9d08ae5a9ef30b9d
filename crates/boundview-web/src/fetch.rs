#![forbid(unsafe_code)]

//! Template retrieval over `window.fetch`.

use std::future::Future;

use boundview_core::{FetchError, TemplateSource};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::Response;

use crate::check_status;

/// Fetches templates relative to `base` (empty: relative to the page).
#[derive(Debug, Clone, Default)]
pub struct FetchSource {
    base: String,
}

impl FetchSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_base(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }
}

impl TemplateSource for FetchSource {
    fn fetch(&self, path: &str) -> impl Future<Output = Result<String, FetchError>> {
        let url = format!("{}{path}", self.base);
        let path = path.to_owned();
        async move {
            let network = |value: JsValue| FetchError::Network {
                path: path.clone(),
                message: describe(&value),
            };
            let window = web_sys::window().ok_or_else(|| network(JsValue::from_str("no window")))?;
            let response: Response = JsFuture::from(window.fetch_with_str(&url))
                .await
                .and_then(JsCast::dyn_into)
                .map_err(network)?;
            check_status(&path, response.ok(), response.status())?;
            let body = JsFuture::from(response.text().map_err(network)?)
                .await
                .map_err(network)?;
            body.as_string()
                .ok_or_else(|| network(JsValue::from_str("response body is not text")))
        }
    }
}

fn describe(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}
