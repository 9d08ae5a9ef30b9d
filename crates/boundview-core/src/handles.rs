#![forbid(unsafe_code)]

//! Per-render handle tables.
//!
//! Directive helpers cannot hand closures to markup, so they record what an
//! element should do in an arena and embed the arena index in an attribute:
//!
//! ```text
//! {{click "selectCountry"}}  →  data-onclickhandler='0'   → clicks[0]
//! {{bind "base.city"}}       →  data-bind='0'             → binds[0]
//! ```
//!
//! # Invariants
//!
//! 1. Tables are cleared at the start of every render pass; no entry survives
//!    into the next pass.
//! 2. Indices are dense, start at 0, and follow evaluation order.
//! 3. One entry per evaluated directive occurrence.

use std::fmt;

use serde_json::Value;

use crate::state::Method;

/// Attribute carrying a click-handle index.
pub const CLICK_ATTRIBUTE: &str = "data-onclickhandler";

/// Attribute carrying a bind-handle index.
pub const BIND_ATTRIBUTE: &str = "data-bind";

/// The templating evaluator's `this` at the moment a directive ran.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalContext {
    /// Snapshot of the context value.
    pub value: Value,
    /// Location of the context inside the view state, when known. `Some(vec![])`
    /// is the state root; `None` is a derived value with no home.
    pub path: Option<Vec<String>>,
}

impl EvalContext {
    /// Context rooted at the view state.
    #[must_use]
    pub fn root(value: Value) -> Self {
        Self {
            value,
            path: Some(Vec::new()),
        }
    }

    /// Context with no location in the view state.
    #[must_use]
    pub fn detached(value: Value) -> Self {
        Self { value, path: None }
    }
}

/// A pending click binding.
#[derive(Clone)]
pub struct ClickHandle {
    /// Name the directive referenced.
    pub method: String,
    /// The resolved method.
    pub invoke: Method,
    /// Whether a state change after the handler runs triggers a re-render.
    pub redraw: bool,
    pub context: EvalContext,
}

impl fmt::Debug for ClickHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClickHandle")
            .field("method", &self.method)
            .field("redraw", &self.redraw)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// A pending property binding.
#[derive(Debug, Clone, PartialEq)]
pub struct BindHandle {
    /// Raw bind path as written in the template.
    pub path: String,
    pub context: EvalContext,
}

/// Click and bind arenas for one render pass.
#[derive(Debug, Default)]
pub struct HandleTables {
    clicks: Vec<ClickHandle>,
    binds: Vec<BindHandle>,
}

impl HandleTables {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entry. Called once at the start of each render pass.
    pub fn clear(&mut self) {
        self.clicks.clear();
        self.binds.clear();
    }

    /// Append a click handle, returning its index.
    pub fn push_click(&mut self, handle: ClickHandle) -> usize {
        self.clicks.push(handle);
        self.clicks.len() - 1
    }

    /// Append a bind handle, returning its index.
    pub fn push_bind(&mut self, handle: BindHandle) -> usize {
        self.binds.push(handle);
        self.binds.len() - 1
    }

    #[must_use]
    pub fn click(&self, index: usize) -> Option<&ClickHandle> {
        self.clicks.get(index)
    }

    #[must_use]
    pub fn bind(&self, index: usize) -> Option<&BindHandle> {
        self.binds.get(index)
    }

    #[must_use]
    pub fn click_count(&self) -> usize {
        self.clicks.len()
    }

    #[must_use]
    pub fn bind_count(&self) -> usize {
        self.binds.len()
    }

    pub fn clicks(&self) -> impl Iterator<Item = &ClickHandle> {
        self.clicks.iter()
    }

    pub fn binds(&self) -> impl Iterator<Item = &BindHandle> {
        self.binds.iter()
    }
}

/// Markup attribute for click handle `index`.
#[must_use]
pub fn click_attribute(index: usize) -> String {
    format!("{CLICK_ATTRIBUTE}='{index}'")
}

/// Markup attribute for bind handle `index`.
#[must_use]
pub fn bind_attribute(index: usize) -> String {
    format!("{BIND_ATTRIBUTE}='{index}'")
}

/// Parse a handle index read back from an attribute.
///
/// Accepts surrounding whitespace and trailing junk after the leading
/// digits, like a lenient integer parse. No digits yields `None`.
#[must_use]
pub fn parse_index(raw: &str) -> Option<usize> {
    let trimmed = raw.trim_start();
    let digits = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .map_or(trimmed, |end| &trimmed[..end]);
    digits.parse().ok()
}
