#![forbid(unsafe_code)]

//! DOM contract for the bound view engine.
//!
//! The engine never talks to a concrete document. It renders markup into a
//! region found by selector, then discovers the elements it must wire up by
//! attribute name. Everything it needs from a document is captured by the
//! [`Dom`] trait:
//!
//! - locate a region ([`Dom::query_selector`]),
//! - replace its content ([`Dom::set_inner_html`]),
//! - find marked elements inside it ([`Dom::query_by_attribute`]),
//! - read and write control values and text,
//! - attach `click` / `change` listeners.
//!
//! Two backends exist: [`memory::MemoryDom`] (headless, used by tests and the
//! demo) and the `web-sys` backend in `boundview-web`.
//!
//! # Invariants
//!
//! 1. Replacing a region's content discards its previous elements. Listeners
//!    attached to those elements never fire again.
//! 2. `query_by_attribute` returns elements in document order.
//! 3. Listeners are invoked in attachment order.

pub mod memory;

use std::fmt;
use std::rc::Rc;

pub use memory::{MemoryDom, MemoryElement};

/// Callback attached to an element. Listeners carry no event payload; they
/// read whatever they need (e.g. a control's value) back through the [`Dom`].
pub type Listener = Rc<dyn Fn()>;

/// Events the engine listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomEvent {
    /// Pointer activation of any element.
    Click,
    /// Committed value change of a form control.
    Change,
}

impl DomEvent {
    /// DOM event type name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Change => "change",
        }
    }
}

impl fmt::Display for DomEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors raised by DOM backends.
#[derive(Debug, thiserror::Error)]
pub enum DomError {
    /// A CSS selector could not be parsed.
    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },
}

/// Minimal document surface required by the engine.
pub trait Dom {
    /// Backend handle for one element.
    type Element: Clone + 'static;

    /// First element matching `selector`, if any.
    fn query_selector(&self, selector: &str) -> Option<Self::Element>;

    /// Replace the content of `region` with `markup`.
    fn set_inner_html(&self, region: &Self::Element, markup: &str);

    /// Descendants of `region` carrying `attribute`, in document order.
    fn query_by_attribute(&self, region: &Self::Element, attribute: &str) -> Vec<Self::Element>;

    /// Attribute value of `element`.
    fn attribute(&self, element: &Self::Element, name: &str) -> Option<String>;

    /// Upper-case tag name (`"INPUT"`, `"SPAN"`, ...).
    fn tag_name(&self, element: &Self::Element) -> String;

    /// Current value of a form control. Non-controls report an empty string.
    fn value(&self, element: &Self::Element) -> String;

    fn set_value(&self, element: &Self::Element, value: &str);

    fn set_text_content(&self, element: &Self::Element, text: &str);

    /// Attach `listener` for `event` on `element`.
    fn add_listener(&self, element: &Self::Element, event: DomEvent, listener: Listener);
}

/// Whether `tag` names a control whose state lives in its `value`.
#[must_use]
pub fn is_input_like(tag: &str) -> bool {
    ["INPUT", "SELECT", "TEXTAREA"]
        .iter()
        .any(|candidate| tag.eq_ignore_ascii_case(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_like_tags_ignore_case() {
        assert!(is_input_like("INPUT"));
        assert!(is_input_like("select"));
        assert!(is_input_like("TextArea"));
        assert!(!is_input_like("SPAN"));
        assert!(!is_input_like("button"));
    }

    #[test]
    fn event_names() {
        assert_eq!(DomEvent::Click.name(), "click");
        assert_eq!(DomEvent::Change.to_string(), "change");
    }
}
