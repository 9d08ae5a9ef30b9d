#![forbid(unsafe_code)]

//! Browser backend for bound views.
//!
//! On `wasm32` this crate provides:
//! - [`WebDom`]: the [`boundview_dom::Dom`] contract over `web-sys`
//! - [`FetchSource`]: templates retrieved with `window.fetch`
//! - [`mount`]: build a view on the page and start its first render
//!
//! Status mapping ([`check_status`]) is platform independent.

use boundview_core::FetchError;

#[cfg(target_arch = "wasm32")]
mod dom;
#[cfg(target_arch = "wasm32")]
mod fetch;

#[cfg(target_arch = "wasm32")]
pub use dom::WebDom;
#[cfg(target_arch = "wasm32")]
pub use fetch::FetchSource;

/// Map a response's success flag and status to a fetch result.
pub fn check_status(path: &str, ok: bool, status: u16) -> Result<(), FetchError> {
    if ok {
        Ok(())
    } else {
        Err(FetchError::Status {
            path: path.to_owned(),
            status,
        })
    }
}

/// Build `builder` against the page document and render it in the
/// background. Render failures are logged by the view.
#[cfg(target_arch = "wasm32")]
pub fn mount<S>(
    builder: boundview_core::ViewBuilder,
    source: S,
) -> Result<boundview_core::BoundView<WebDom, S>, wasm_bindgen::JsValue>
where
    S: boundview_core::TemplateSource + 'static,
{
    let dom = std::rc::Rc::new(WebDom::from_window()?);
    let view = builder.build(dom, source);
    let pending = view.clone();
    wasm_bindgen_futures::spawn_local(async move {
        match pending.render().await {
            Ok(outcome) => tracing::debug!(?outcome, "initial render"),
            Err(err) => tracing::debug!(error = %err, "initial render did not complete"),
        }
    });
    Ok(view)
}
