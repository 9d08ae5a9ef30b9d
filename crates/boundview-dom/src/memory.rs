#![forbid(unsafe_code)]

//! Headless document backend.
//!
//! [`MemoryDom`] parses a host page once and treats every element of it as a
//! potential render region. Markup injected into a region is parsed as an
//! HTML fragment with `scraper`; elements are addressed by their position in
//! document order inside that fragment, tagged with the region's generation
//! so handles from a replaced fragment can never reach the new one.
//!
//! Control values and text set through the [`Dom`] contract are kept in an
//! overlay keyed by element. The parsed markup itself is never mutated, so
//! [`MemoryDom::inner_html`] reports exactly what was injected.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Invalid selector | Unparseable CSS | `query_selector` logs and returns `None` |
//! | Stale element | Region replaced since the handle was taken | Reads return defaults, events fire nothing |
//! | Nested injection | `set_inner_html` on injected content | Logged, ignored |

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::{Dom, DomError, DomEvent, Listener};

/// Element handle of a [`MemoryDom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryElement {
    /// Element of the host page, by document-order position.
    Host(usize),
    /// Element of injected content.
    Content {
        /// Host element the content was injected into.
        host: usize,
        /// Injection generation the element belongs to.
        generation: u64,
        /// Document-order position inside the injected fragment.
        ordinal: usize,
    },
}

impl MemoryElement {
    fn is_content_of(&self, region: usize) -> bool {
        matches!(*self, Self::Content { host, .. } if host == region)
    }
}

struct Region {
    generation: u64,
    fragment: Html,
}

#[derive(Debug, Default)]
struct Overlay {
    value: Option<String>,
    text: Option<String>,
}

/// In-memory document with event dispatch.
pub struct MemoryDom {
    page: Html,
    regions: RefCell<HashMap<usize, Region>>,
    overlay: RefCell<HashMap<MemoryElement, Overlay>>,
    listeners: RefCell<HashMap<(MemoryElement, DomEvent), Vec<Listener>>>,
    generations: Cell<u64>,
}

impl MemoryDom {
    /// Parse `page` as the host document.
    #[must_use]
    pub fn from_page(page: &str) -> Self {
        Self {
            page: Html::parse_document(page),
            regions: RefCell::new(HashMap::new()),
            overlay: RefCell::new(HashMap::new()),
            listeners: RefCell::new(HashMap::new()),
            generations: Cell::new(0),
        }
    }

    /// Markup last injected into `region`.
    #[must_use]
    pub fn inner_html(&self, region: &MemoryElement) -> Option<String> {
        let MemoryElement::Host(host) = *region else {
            return None;
        };
        self.regions
            .borrow()
            .get(&host)
            .map(|r| r.fragment.root_element().inner_html())
    }

    /// Injected elements of `region` matching `css`, in document order.
    pub fn select(&self, region: &MemoryElement, css: &str) -> Result<Vec<MemoryElement>, DomError> {
        let selector = parse_selector(css)?;
        let MemoryElement::Host(host) = *region else {
            return Ok(Vec::new());
        };
        let regions = self.regions.borrow();
        let Some(region) = regions.get(&host) else {
            return Ok(Vec::new());
        };
        let matched: Vec<_> = region.fragment.select(&selector).map(|e| e.id()).collect();
        Ok(content_elements(&region.fragment)
            .filter(|(_, e)| matched.contains(&e.id()))
            .map(|(ordinal, _)| MemoryElement::Content {
                host,
                generation: region.generation,
                ordinal,
            })
            .collect())
    }

    /// Text content of `element`, honoring text set through the contract on
    /// the element itself or on any of its descendants.
    #[must_use]
    pub fn text(&self, element: &MemoryElement) -> String {
        let overlay = self.overlay.borrow();
        let shown = |e: &MemoryElement| overlay.get(e).and_then(|o| o.text.clone());
        if let Some(text) = shown(element) {
            return text;
        }
        match *element {
            MemoryElement::Host(ordinal) => {
                composed_text(&self.page, ordinal, &MemoryElement::Host, &shown)
            }
            MemoryElement::Content {
                host,
                generation,
                ordinal,
            } => {
                let regions = self.regions.borrow();
                let Some(region) = regions.get(&host).filter(|r| r.generation == generation) else {
                    return String::new();
                };
                let handle = |ordinal| MemoryElement::Content {
                    host,
                    generation,
                    ordinal,
                };
                composed_text(&region.fragment, ordinal, &handle, &shown)
            }
        }
    }

    /// Fire `click` on `element`. Returns the number of listeners invoked.
    pub fn click(&self, element: &MemoryElement) -> usize {
        self.dispatch(element, DomEvent::Click)
    }

    /// Set `element`'s value, then fire `change`. Returns the number of
    /// listeners invoked.
    pub fn change(&self, element: &MemoryElement, value: &str) -> usize {
        self.set_value(element, value);
        self.dispatch(element, DomEvent::Change)
    }

    /// Invoke every listener for `event` on `element`.
    ///
    /// The listener list is copied out before dispatch, so listeners may
    /// replace the region they live in.
    pub fn dispatch(&self, element: &MemoryElement, event: DomEvent) -> usize {
        let listeners = self
            .listeners
            .borrow()
            .get(&(*element, event))
            .cloned()
            .unwrap_or_default();
        if listeners.is_empty() {
            debug!(?element, %event, "no listeners");
        }
        for listener in &listeners {
            listener();
        }
        listeners.len()
    }

    /// Number of listeners attached for `event` on `element`.
    #[must_use]
    pub fn listener_count(&self, element: &MemoryElement, event: DomEvent) -> usize {
        self.listeners
            .borrow()
            .get(&(*element, event))
            .map_or(0, Vec::len)
    }

    fn with_element<R>(&self, element: &MemoryElement, f: impl FnOnce(ElementRef<'_>) -> R) -> Option<R> {
        match *element {
            MemoryElement::Host(ordinal) => all_elements(&self.page).nth(ordinal).map(f),
            MemoryElement::Content {
                host,
                generation,
                ordinal,
            } => {
                let regions = self.regions.borrow();
                let region = regions.get(&host).filter(|r| r.generation == generation)?;
                all_elements(&region.fragment).nth(ordinal).map(f)
            }
        }
    }
}

impl Dom for MemoryDom {
    type Element = MemoryElement;

    fn query_selector(&self, selector: &str) -> Option<MemoryElement> {
        let parsed = match parse_selector(selector) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(error = %err, "selector rejected");
                return None;
            }
        };
        let found = self.page.select(&parsed).next()?;
        all_elements(&self.page)
            .position(|e| e.id() == found.id())
            .map(MemoryElement::Host)
    }

    fn set_inner_html(&self, region: &MemoryElement, markup: &str) {
        let MemoryElement::Host(host) = *region else {
            warn!(?region, "injection into injected content is not supported");
            return;
        };
        let generation = self.generations.get() + 1;
        self.generations.set(generation);
        self.regions.borrow_mut().insert(
            host,
            Region {
                generation,
                fragment: Html::parse_fragment(markup),
            },
        );
        self.listeners
            .borrow_mut()
            .retain(|(element, _), _| !element.is_content_of(host));
        self.overlay
            .borrow_mut()
            .retain(|element, _| !element.is_content_of(host));
    }

    fn query_by_attribute(&self, region: &MemoryElement, attribute: &str) -> Vec<MemoryElement> {
        let MemoryElement::Host(host) = *region else {
            return Vec::new();
        };
        let regions = self.regions.borrow();
        let Some(region) = regions.get(&host) else {
            return Vec::new();
        };
        content_elements(&region.fragment)
            .filter(|(_, e)| e.value().attr(attribute).is_some())
            .map(|(ordinal, _)| MemoryElement::Content {
                host,
                generation: region.generation,
                ordinal,
            })
            .collect()
    }

    fn attribute(&self, element: &MemoryElement, name: &str) -> Option<String> {
        self.with_element(element, |e| e.value().attr(name).map(str::to_owned))
            .flatten()
    }

    fn tag_name(&self, element: &MemoryElement) -> String {
        self.with_element(element, |e| e.value().name().to_ascii_uppercase())
            .unwrap_or_default()
    }

    fn value(&self, element: &MemoryElement) -> String {
        if let Some(value) = self.overlay.borrow().get(element).and_then(|o| o.value.clone()) {
            return value;
        }
        self.with_element(element, initial_value).unwrap_or_default()
    }

    fn set_value(&self, element: &MemoryElement, value: &str) {
        self.overlay.borrow_mut().entry(*element).or_default().value = Some(value.to_owned());
    }

    fn set_text_content(&self, element: &MemoryElement, text: &str) {
        self.overlay.borrow_mut().entry(*element).or_default().text = Some(text.to_owned());
    }

    fn add_listener(&self, element: &MemoryElement, event: DomEvent, listener: Listener) {
        self.listeners
            .borrow_mut()
            .entry((*element, event))
            .or_default()
            .push(listener);
    }
}

impl fmt::Debug for MemoryDom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDom")
            .field("regions", &self.regions.borrow().len())
            .field("listeners", &self.listeners.borrow().len())
            .field("generation", &self.generations.get())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_selector(css: &str) -> Result<Selector, DomError> {
    Selector::parse(css).map_err(|err| DomError::InvalidSelector {
        selector: css.to_owned(),
        reason: format!("{err:?}"),
    })
}

/// Every element of `html` in document order, root included.
fn all_elements(html: &Html) -> impl Iterator<Item = ElementRef<'_>> {
    html.root_element().descendants().filter_map(ElementRef::wrap)
}

/// Elements of an injected fragment with their ordinals, skipping the
/// synthetic root the fragment parser wraps content in.
fn content_elements(html: &Html) -> impl Iterator<Item = (usize, ElementRef<'_>)> {
    all_elements(html).enumerate().skip(1)
}

/// Text of the element at `ordinal`, with overlaid descendants substituted.
fn composed_text(
    html: &Html,
    ordinal: usize,
    handle: &dyn Fn(usize) -> MemoryElement,
    shown: &dyn Fn(&MemoryElement) -> Option<String>,
) -> String {
    let mut out = String::new();
    if let Some(root) = all_elements(html).nth(ordinal) {
        push_text(html, root, handle, shown, &mut out);
    }
    out
}

fn push_text(
    html: &Html,
    element: ElementRef<'_>,
    handle: &dyn Fn(usize) -> MemoryElement,
    shown: &dyn Fn(&MemoryElement) -> Option<String>,
    out: &mut String,
) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child) = ElementRef::wrap(child) {
            let overlaid = all_elements(html)
                .position(|e| e.id() == child.id())
                .and_then(|ordinal| shown(&handle(ordinal)));
            match overlaid {
                Some(text) => out.push_str(&text),
                None => push_text(html, child, handle, shown, out),
            }
        }
    }
}

fn initial_value(element: ElementRef<'_>) -> String {
    match element.value().name() {
        "textarea" => element.text().collect(),
        "select" => {
            let options: Vec<_> = element
                .descendants()
                .filter_map(ElementRef::wrap)
                .filter(|e| e.value().name() == "option")
                .collect();
            options
                .iter()
                .find(|o| o.value().attr("selected").is_some())
                .or_else(|| options.first())
                .map(|o| option_value(*o))
                .unwrap_or_default()
        }
        _ => element.value().attr("value").unwrap_or_default().to_owned(),
    }
}

fn option_value(option: ElementRef<'_>) -> String {
    option
        .value()
        .attr("value")
        .map_or_else(|| option.text().collect(), str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::rc::Rc;

    fn dom() -> (MemoryDom, MemoryElement) {
        let dom = MemoryDom::from_page("<body><main id=\"app\"></main><aside id=\"side\"></aside></body>");
        let app = dom.query_selector("#app").expect("host region");
        (dom, app)
    }

    #[test]
    fn query_selector_finds_host_elements() {
        let (dom, app) = dom();
        assert!(matches!(app, MemoryElement::Host(_)));
        assert_eq!(dom.tag_name(&app), "MAIN");
        assert!(dom.query_selector("#missing").is_none());
    }

    #[test]
    fn invalid_selector_is_none() {
        let (dom, _) = dom();
        assert!(dom.query_selector("[[[").is_none());
        assert!(matches!(
            dom.select(&MemoryElement::Host(0), "[[["),
            Err(DomError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn attribute_query_is_document_ordered() {
        let (dom, app) = dom();
        dom.set_inner_html(
            &app,
            "<p data-bind='1'>a</p><div><span data-bind='0'>b</span></div><i>c</i>",
        );
        let marked = dom.query_by_attribute(&app, "data-bind");
        let indices: Vec<_> = marked
            .iter()
            .map(|e| dom.attribute(e, "data-bind").unwrap_or_default())
            .collect();
        assert_eq!(indices, vec!["1", "0"]);
    }

    #[test]
    fn reinjection_drops_listeners_and_stales_handles() {
        let (dom, app) = dom();
        dom.set_inner_html(&app, "<button>go</button>");
        let button = dom.select(&app, "button").unwrap()[0];
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        dom.add_listener(&button, DomEvent::Click, Rc::new(move || h.set(h.get() + 1)));
        assert_eq!(dom.click(&button), 1);

        dom.set_inner_html(&app, "<button>go</button>");
        assert_eq!(dom.click(&button), 0, "stale handle fires nothing");
        assert_eq!(hits.get(), 1);
        assert_eq!(dom.tag_name(&button), "", "stale handle reads default");
        let fresh = dom.select(&app, "button").unwrap()[0];
        assert_ne!(fresh, button);
    }

    #[test]
    fn listener_may_replace_its_own_region() {
        let (dom, app) = dom();
        let dom = Rc::new(dom);
        dom.set_inner_html(&app, "<button>go</button>");
        let button = dom.select(&app, "button").unwrap()[0];
        let weak = Rc::downgrade(&dom);
        dom.add_listener(
            &button,
            DomEvent::Click,
            Rc::new(move || {
                if let Some(dom) = weak.upgrade() {
                    dom.set_inner_html(&app, "<p>done</p>");
                }
            }),
        );
        assert_eq!(dom.click(&button), 1);
        assert_eq!(dom.inner_html(&app).as_deref(), Some("<p>done</p>"));
    }

    #[test]
    fn values_and_text_overlay() {
        let (dom, app) = dom();
        dom.set_inner_html(
            &app,
            "<input value='x'><textarea>notes</textarea><select><option>a</option><option value='bee' selected>b</option></select><span>t</span>",
        );
        let input = dom.select(&app, "input").unwrap()[0];
        let area = dom.select(&app, "textarea").unwrap()[0];
        let select = dom.select(&app, "select").unwrap()[0];
        let span = dom.select(&app, "span").unwrap()[0];
        assert_eq!(dom.value(&input), "x");
        assert_eq!(dom.value(&area), "notes");
        assert_eq!(dom.value(&select), "bee");

        dom.set_value(&input, "y");
        dom.set_text_content(&span, "shown");
        assert_eq!(dom.value(&input), "y");
        assert_eq!(dom.text(&span), "shown");
        assert_eq!(dom.text(&area), "notes");
    }

    #[test]
    fn change_sets_value_before_dispatch() {
        let (dom, app) = dom();
        let dom = Rc::new(dom);
        dom.set_inner_html(&app, "<input>");
        let input = dom.select(&app, "input").unwrap()[0];
        let seen = Rc::new(RefCell::new(String::new()));
        let (s, weak) = (Rc::clone(&seen), Rc::downgrade(&dom));
        dom.add_listener(
            &input,
            DomEvent::Change,
            Rc::new(move || {
                if let Some(dom) = weak.upgrade() {
                    *s.borrow_mut() = dom.value(&input);
                }
            }),
        );
        assert_eq!(dom.change(&input, "typed"), 1);
        assert_eq!(*seen.borrow(), "typed");
        assert_eq!(dom.listener_count(&input, DomEvent::Change), 1);
        assert_eq!(dom.listener_count(&input, DomEvent::Click), 0);
    }

    #[test]
    fn regions_are_independent() {
        let (dom, app) = dom();
        let side = dom.query_selector("#side").expect("side region");
        dom.set_inner_html(&app, "<b>a</b>");
        dom.set_inner_html(&side, "<b>s</b>");
        dom.set_inner_html(&app, "<b>a2</b>");
        assert_eq!(dom.inner_html(&side).as_deref(), Some("<b>s</b>"));
        assert_eq!(dom.inner_html(&app).as_deref(), Some("<b>a2</b>"));
    }

    #[test]
    fn parent_text_includes_overlaid_descendants() {
        let (dom, app) = dom();
        dom.set_inner_html(&app, "<p>Total: <span>0</span> items</p>");
        let p = dom.select(&app, "p").unwrap()[0];
        let span = dom.select(&app, "span").unwrap()[0];
        assert_eq!(dom.text(&p), "Total: 0 items");

        dom.set_text_content(&span, "12");
        assert_eq!(dom.text(&p), "Total: 12 items");
        dom.set_text_content(&p, "replaced");
        assert_eq!(dom.text(&p), "replaced");
        assert_eq!(dom.text(&span), "12");
    }

    proptest! {
        #[test]
        fn attribute_query_follows_document_order(
            marks in proptest::collection::vec(any::<bool>(), 0..24),
        ) {
            let (dom, app) = dom();
            let markup: String = marks
                .iter()
                .enumerate()
                .map(|(i, marked)| match (*marked, i % 2) {
                    (true, 0) => format!("<p data-bind='{i}'>{i}</p>"),
                    (true, _) => format!("<div><i data-bind='{i}'>{i}</i></div>"),
                    (false, _) => format!("<b>{i}</b>"),
                })
                .collect();
            dom.set_inner_html(&app, &markup);

            let found: Vec<String> = dom
                .query_by_attribute(&app, "data-bind")
                .iter()
                .filter_map(|e| dom.attribute(e, "data-bind"))
                .collect();
            let expected: Vec<String> = marks
                .iter()
                .enumerate()
                .filter(|(_, marked)| **marked)
                .map(|(i, _)| i.to_string())
                .collect();
            prop_assert_eq!(found, expected);
        }
    }
}
