#![forbid(unsafe_code)]

//! `web-sys` implementation of the DOM contract.
//!
//! # Invariants
//!
//! 1. Every listener closure is owned by the region it was attached in.
//! 2. Injecting into a region retires that region's live closures and drops
//!    the ones retired by the previous injection. A listener that triggers
//!    a re-render is therefore never freed while it runs.

use std::cell::RefCell;
use std::mem;

use boundview_dom::{Dom, DomEvent, Listener};
use tracing::warn;
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen::closure::Closure;
use web_sys::{Document, Element, HtmlInputElement, HtmlSelectElement, HtmlTextAreaElement};

struct RegionListeners {
    region: Element,
    live: Vec<Closure<dyn Fn()>>,
    retired: Vec<Closure<dyn Fn()>>,
}

/// The page document.
pub struct WebDom {
    document: Document,
    regions: RefCell<Vec<RegionListeners>>,
    /// Closures attached outside any injected region; kept for the page's life.
    unowned: RefCell<Vec<Closure<dyn Fn()>>>,
}

impl WebDom {
    #[must_use]
    pub fn new(document: Document) -> Self {
        Self {
            document,
            regions: RefCell::new(Vec::new()),
            unowned: RefCell::new(Vec::new()),
        }
    }

    /// The document of the global `window`.
    pub fn from_window() -> Result<Self, JsValue> {
        let document = web_sys::window()
            .and_then(|window| window.document())
            .ok_or_else(|| JsValue::from_str("no document"))?;
        Ok(Self::new(document))
    }

    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    fn keep(&self, element: &Element, closure: Closure<dyn Fn()>) {
        let mut regions = self.regions.borrow_mut();
        match regions.iter_mut().find(|r| r.region.contains(Some(&**element))) {
            Some(owner) => owner.live.push(closure),
            None => self.unowned.borrow_mut().push(closure),
        }
    }
}

impl Dom for WebDom {
    type Element = Element;

    fn query_selector(&self, selector: &str) -> Option<Element> {
        match self.document.query_selector(selector) {
            Ok(found) => found,
            Err(err) => {
                warn!(selector, error = ?err, "selector rejected");
                None
            }
        }
    }

    fn set_inner_html(&self, region: &Element, markup: &str) {
        region.set_inner_html(markup);
        let mut regions = self.regions.borrow_mut();
        match regions.iter_mut().find(|r| r.region.is_same_node(Some(&**region))) {
            Some(entry) => entry.retired = mem::take(&mut entry.live),
            None => regions.push(RegionListeners {
                region: region.clone(),
                live: Vec::new(),
                retired: Vec::new(),
            }),
        }
    }

    fn query_by_attribute(&self, region: &Element, attribute: &str) -> Vec<Element> {
        let Ok(nodes) = region.query_selector_all(&format!("[{attribute}]")) else {
            warn!(attribute, "attribute query rejected");
            return Vec::new();
        };
        (0..nodes.length())
            .filter_map(|i| nodes.item(i))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .collect()
    }

    fn attribute(&self, element: &Element, name: &str) -> Option<String> {
        element.get_attribute(name)
    }

    fn tag_name(&self, element: &Element) -> String {
        element.tag_name()
    }

    fn value(&self, element: &Element) -> String {
        if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
            input.value()
        } else if let Some(select) = element.dyn_ref::<HtmlSelectElement>() {
            select.value()
        } else if let Some(area) = element.dyn_ref::<HtmlTextAreaElement>() {
            area.value()
        } else {
            element.text_content().unwrap_or_default()
        }
    }

    fn set_value(&self, element: &Element, value: &str) {
        if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
            input.set_value(value);
        } else if let Some(select) = element.dyn_ref::<HtmlSelectElement>() {
            select.set_value(value);
        } else if let Some(area) = element.dyn_ref::<HtmlTextAreaElement>() {
            area.set_value(value);
        } else {
            element.set_text_content(Some(value));
        }
    }

    fn set_text_content(&self, element: &Element, text: &str) {
        element.set_text_content(Some(text));
    }

    fn add_listener(&self, element: &Element, event: DomEvent, listener: Listener) {
        let closure = Closure::<dyn Fn()>::new(move || listener());
        if let Err(err) =
            element.add_event_listener_with_callback(event.name(), closure.as_ref().unchecked_ref())
        {
            warn!(%event, error = ?err, "listener not attached");
            return;
        }
        self.keep(element, closure);
    }
}

impl std::fmt::Debug for WebDom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let regions = self.regions.borrow();
        f.debug_struct("WebDom")
            .field("regions", &regions.len())
            .field("live", &regions.iter().map(|r| r.live.len()).sum::<usize>())
            .field("unowned", &self.unowned.borrow().len())
            .finish()
    }
}
