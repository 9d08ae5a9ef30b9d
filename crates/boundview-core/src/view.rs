#![forbid(unsafe_code)]

//! The bound view: render cycle, DOM rebinding and change detection.
//!
//! ```text
//! Unloaded ──render──▶ Loading ──fetch+compile ok──▶ Ready ──render/rerender──▶ Ready
//!     ▲                   │
//!     └──fetch/compile err┘
//! Disabled (invalid config): every render is a no-op
//! ```
//!
//! One render pass: clear handle tables, evaluate the cached template
//! against the state (helpers fill the tables), look up the target region,
//! replace its content, then wire bind-marked elements followed by
//! click-marked elements.
//!
//! # Invariants
//!
//! 1. The template is fetched and compiled at most once per successful load.
//! 2. Handle tables hold exactly the handles of the most recent evaluation.
//! 3. A redraw-flagged click re-renders iff the state snapshot changed; a
//!    non-redraw click never re-renders.
//! 4. A bind change always writes the control's value back and re-renders.
//!
//! # Failure Modes
//!
//! | Failure | Outcome |
//! |---------|---------|
//! | Fetch / compile error | `Err`, phase back to `Unloaded`, DOM and tables untouched |
//! | Evaluation error | `Err`, DOM untouched |
//! | Target missing | `Ok(TargetMissing)`, tables orphaned, no rebinding |
//! | Bind path error while rebinding | `Err(Path)`, later elements stay unwired |
//! | Bound item moved or changed before a write-back | `StaleContext` logged, write skipped |
//! | Error inside a listener | logged at `error` |
//!
//! Overlapping renders are not coordinated: a second `render` issued while
//! the first is still fetching starts its own fetch.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use boundview_dom::{Dom, DomEvent, is_input_like};
use handlebars::Handlebars;
use serde_json::Value;
use tracing::{debug, debug_span, error, trace, warn};

use crate::change::StateSnapshot;
use crate::config::ViewConfig;
use crate::error::ViewError;
use crate::handles::{BIND_ATTRIBUTE, BindHandle, CLICK_ATTRIBUTE, ClickHandle, parse_index};
use crate::helpers::{Bindings, register_helpers};
use crate::path::{BindPath, Location, PathError, Scope, walk};
use crate::source::TemplateSource;
use crate::state::{MethodTable, ViewState};

/// Lifecycle of a view's template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Invalid configuration; nothing is ever rendered.
    Disabled,
    /// No compiled template yet.
    Unloaded,
    /// Template fetch in flight.
    Loading,
    /// Template compiled and cached.
    Ready,
}

/// What one render pass produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderReport {
    pub click_handles: usize,
    pub bind_handles: usize,
    /// Whether the markup reached the DOM.
    pub injected: bool,
}

/// Result of a successful render call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Markup injected and handles wired.
    Rendered(RenderReport),
    /// Template evaluated but the target region was not found.
    TargetMissing(RenderReport),
    /// The view is disabled.
    Disabled,
    /// `rerender` was called before any template was loaded.
    NotReady,
}

impl RenderOutcome {
    #[must_use]
    pub fn report(&self) -> Option<RenderReport> {
        match self {
            Self::Rendered(report) | Self::TargetMissing(report) => Some(*report),
            Self::Disabled | Self::NotReady => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Assembles a [`BoundView`] from configuration, state and methods.
#[derive(Debug)]
pub struct ViewBuilder {
    config: ViewConfig,
    state: ViewState,
    methods: MethodTable,
}

impl ViewBuilder {
    /// Start building a view with an empty state and no methods.
    #[must_use]
    pub fn new(config: ViewConfig) -> Self {
        Self {
            config,
            state: ViewState::new(),
            methods: MethodTable::new(),
        }
    }

    #[must_use]
    pub fn state(mut self, state: ViewState) -> Self {
        self.state = state;
        self
    }

    /// Replace the whole method table.
    #[must_use]
    pub fn methods(mut self, methods: MethodTable) -> Self {
        self.methods = methods;
        self
    }

    /// Register a value-returning method (`call` targets).
    #[must_use]
    pub fn method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&mut ViewState, &Value) -> Value + Send + Sync + 'static,
    {
        self.methods.insert(name, method);
        self
    }

    /// Register a unit-returning method (`click` targets).
    #[must_use]
    pub fn action<F>(mut self, name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&mut ViewState, &Value) + Send + Sync + 'static,
    {
        self.methods.insert_action(name, action);
        self
    }

    /// Finish the view. An invalid configuration yields a disabled view and
    /// is logged here, once.
    pub fn build<D, S>(self, dom: Rc<D>, source: S) -> BoundView<D, S>
    where
        D: Dom + 'static,
        S: TemplateSource + 'static,
    {
        let bindings = Arc::new(Bindings::new(self.methods, self.state));
        let mut registry = Handlebars::new();
        let phase = match self.config.validate() {
            Ok(()) => {
                register_helpers(&mut registry, &bindings);
                Phase::Unloaded
            }
            Err(err) => {
                let err = ViewError::from(err);
                error!(error = %err, "view disabled");
                Phase::Disabled
            }
        };
        BoundView {
            inner: Rc::new(ViewInner {
                config: self.config,
                dom,
                source,
                bindings,
                registry: RefCell::new(registry),
                phase: Cell::new(phase),
                renders: Cell::new(0),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// BoundView
// ---------------------------------------------------------------------------

/// A template bound to a DOM region and a view state.
///
/// Cloning is cheap and yields another handle to the same view.
pub struct BoundView<D: Dom + 'static, S: TemplateSource + 'static> {
    inner: Rc<ViewInner<D, S>>,
}

impl<D: Dom + 'static, S: TemplateSource + 'static> Clone for BoundView<D, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<D: Dom + 'static, S: TemplateSource + 'static> fmt::Debug for BoundView<D, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundView")
            .field("config", &self.inner.config)
            .field("phase", &self.inner.phase.get())
            .field("renders", &self.inner.renders.get())
            .field("methods", &self.inner.bindings.methods)
            .finish_non_exhaustive()
    }
}

impl<D: Dom + 'static, S: TemplateSource + 'static> BoundView<D, S> {
    /// Full render cycle: load and compile the template if needed, then
    /// evaluate, inject and rebind.
    pub async fn render(&self) -> Result<RenderOutcome, ViewError> {
        match self.inner.phase.get() {
            Phase::Disabled => return Ok(RenderOutcome::Disabled),
            Phase::Ready => {}
            Phase::Unloaded | Phase::Loading => self.inner.load().await?,
        }
        self.inner.render_ready()
    }

    /// Synchronous render against the cached template.
    pub fn rerender(&self) -> Result<RenderOutcome, ViewError> {
        self.inner.rerender()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.inner.phase.get()
    }

    /// Completed evaluation passes.
    #[must_use]
    pub fn render_count(&self) -> u64 {
        self.inner.renders.get()
    }

    /// `(click, bind)` handle counts of the latest pass.
    #[must_use]
    pub fn handle_counts(&self) -> (usize, usize) {
        let tables = self.inner.bindings.tables();
        (tables.click_count(), tables.bind_count())
    }

    /// Snapshot used by the change detector.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot::capture(&self.inner.bindings.state())
    }

    /// Copy of the current state.
    #[must_use]
    pub fn state(&self) -> ViewState {
        self.inner.bindings.state().clone()
    }

    /// Mutate the state without rendering.
    pub fn update_state<R>(&self, f: impl FnOnce(&mut ViewState) -> R) -> R {
        f(&mut self.inner.bindings.state())
    }

    #[must_use]
    pub fn config(&self) -> &ViewConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn dom(&self) -> &Rc<D> {
        &self.inner.dom
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

struct ViewInner<D, S> {
    config: ViewConfig,
    dom: Rc<D>,
    source: S,
    bindings: Arc<Bindings>,
    registry: RefCell<Handlebars<'static>>,
    phase: Cell<Phase>,
    renders: Cell<u64>,
}

impl<D: Dom + 'static, S: TemplateSource + 'static> ViewInner<D, S> {
    async fn load(&self) -> Result<(), ViewError> {
        let path = self.config.template_path.as_str();
        self.phase.set(Phase::Loading);
        debug!(path, "loading template");

        let text = match self.source.fetch(path).await {
            Ok(text) => text,
            Err(err) => {
                self.phase.set(Phase::Unloaded);
                error!(error = %err, "template fetch failed");
                return Err(err.into());
            }
        };
        if let Err(source) = self.registry.borrow_mut().register_template_string(path, text) {
            self.phase.set(Phase::Unloaded);
            let err = ViewError::Compile {
                path: path.to_owned(),
                source: Box::new(source),
            };
            error!(error = %err, "template compile failed");
            return Err(err);
        }

        self.phase.set(Phase::Ready);
        debug!(path, "template ready");
        Ok(())
    }

    fn rerender(self: &Rc<Self>) -> Result<RenderOutcome, ViewError> {
        match self.phase.get() {
            Phase::Disabled => Ok(RenderOutcome::Disabled),
            Phase::Ready => self.render_ready(),
            Phase::Unloaded | Phase::Loading => Ok(RenderOutcome::NotReady),
        }
    }

    fn render_ready(self: &Rc<Self>) -> Result<RenderOutcome, ViewError> {
        let _span = debug_span!("render", target = %self.config.target).entered();

        self.bindings.tables().clear();
        let data = self.bindings.state().as_value().clone();
        let rendered = self
            .registry
            .borrow()
            .render(&self.config.template_path, &data);
        let markup = match rendered {
            Ok(markup) => markup,
            Err(err) => {
                let err = ViewError::from(err);
                error!(error = %err, "template evaluation failed");
                return Err(err);
            }
        };
        self.renders.set(self.renders.get() + 1);

        let (click_handles, bind_handles) = {
            let tables = self.bindings.tables();
            (tables.click_count(), tables.bind_count())
        };
        debug!(click_handles, bind_handles, "template evaluated");
        let mut report = RenderReport {
            click_handles,
            bind_handles,
            injected: false,
        };

        let Some(region) = self.dom.query_selector(&self.config.target) else {
            let err = ViewError::TargetNotFound(self.config.target.clone());
            error!(error = %err, "markup not injected");
            return Ok(RenderOutcome::TargetMissing(report));
        };
        self.dom.set_inner_html(&region, &markup);
        report.injected = true;

        self.rebind(&region)?;
        Ok(RenderOutcome::Rendered(report))
    }

    fn rebind(self: &Rc<Self>, region: &D::Element) -> Result<(), ViewError> {
        let (clicks, binds): (Vec<ClickHandle>, Vec<BindHandle>) = {
            let tables = self.bindings.tables();
            (tables.clicks().cloned().collect(), tables.binds().cloned().collect())
        };

        for element in self.dom.query_by_attribute(region, BIND_ATTRIBUTE) {
            if let Some(handle) = self.lookup(&element, BIND_ATTRIBUTE, binds.as_slice()) {
                self.wire_bind(&element, handle.clone())?;
            }
        }
        for element in self.dom.query_by_attribute(region, CLICK_ATTRIBUTE) {
            if let Some(handle) = self.lookup(&element, CLICK_ATTRIBUTE, clicks.as_slice()) {
                self.wire_click(&element, handle.clone());
            }
        }
        Ok(())
    }

    fn lookup<'t, T>(&self, element: &D::Element, attribute: &str, table: &'t [T]) -> Option<&'t T> {
        let raw = self.dom.attribute(element, attribute)?;
        let handle = parse_index(&raw).and_then(|index| table.get(index));
        if handle.is_none() {
            warn!(attribute, value = %raw, "element references no handle of this render");
        }
        handle
    }

    fn wire_click(self: &Rc<Self>, element: &D::Element, handle: ClickHandle) {
        let view: Weak<Self> = Rc::downgrade(self);
        self.dom.add_listener(
            element,
            DomEvent::Click,
            Rc::new(move || {
                if let Some(view) = view.upgrade() {
                    view.dispatch_click(&handle);
                }
            }),
        );
    }

    fn dispatch_click(self: &Rc<Self>, handle: &ClickHandle) {
        let _span = debug_span!("click", method = %handle.method).entered();
        if !handle.redraw {
            (handle.invoke)(&mut self.bindings.state(), &handle.context.value);
            return;
        }

        let before = StateSnapshot::capture(&self.bindings.state());
        (handle.invoke)(&mut self.bindings.state(), &handle.context.value);
        let after = StateSnapshot::capture(&self.bindings.state());
        if before == after {
            trace!("state unchanged, no redraw");
            return;
        }
        trace!("state changed, redrawing");
        if let Err(err) = self.rerender() {
            error!(error = %err, "redraw after click failed");
        }
    }

    fn wire_bind(self: &Rc<Self>, element: &D::Element, handle: BindHandle) -> Result<(), ViewError> {
        let shown = match self.with_location(&handle, |location| Ok(location.display())) {
            Ok(shown) => shown,
            Err(err) => {
                error!(error = %err, "bind resolution failed");
                return Err(err.into());
            }
        };
        if is_input_like(&self.dom.tag_name(element)) {
            self.dom.set_value(element, &shown);
        } else {
            self.dom.set_text_content(element, &shown);
        }

        let view: Weak<Self> = Rc::downgrade(self);
        let control = element.clone();
        self.dom.add_listener(
            element,
            DomEvent::Change,
            Rc::new(move || {
                if let Some(view) = view.upgrade() {
                    view.write_back(&handle, &control);
                }
            }),
        );
        Ok(())
    }

    fn write_back(self: &Rc<Self>, handle: &BindHandle, control: &D::Element) {
        let value = Value::String(self.dom.value(control));
        if let Err(err) = self.with_location(handle, |location| location.set(value)) {
            error!(error = %err, "bind write-back failed");
            return;
        }
        if handle.context.path.is_none() && BindPath::parse(&handle.path).scope() == Scope::Context {
            warn!(path = %handle.path, "bound context is not part of the view state, write lost");
        }
        if let Err(err) = self.rerender() {
            error!(error = %err, "redraw after change failed");
        }
    }

    /// Resolve a bind handle's path and hand the location to `f`.
    ///
    /// `base.` paths start at the state root. Other paths start at the
    /// context's home inside the state, or at a scratch copy of the context
    /// when it has none. A home that no longer holds the rendered item is
    /// refused with [`PathError::StaleContext`].
    fn with_location<R>(
        &self,
        handle: &BindHandle,
        f: impl FnOnce(Location<'_>) -> Result<R, PathError>,
    ) -> Result<R, PathError> {
        let path = BindPath::parse(&handle.path);
        let mut state = self.bindings.state();
        match (path.scope(), &handle.context.path) {
            (Scope::View, _) => f(path.locate(state.as_value_mut())?),
            (Scope::Context, Some(home)) if home.is_empty() => {
                f(path.locate(state.as_value_mut())?)
            }
            (Scope::Context, Some(home)) => {
                let root = walk(state.as_value_mut(), home.as_slice())
                    .ok()
                    .filter(|item| **item == handle.context.value)
                    .ok_or_else(|| PathError::StaleContext {
                        path: handle.path.clone(),
                    })?;
                f(path.locate(root)?)
            }
            (Scope::Context, None) => {
                drop(state);
                let mut scratch = handle.context.value.clone();
                f(path.locate(&mut scratch)?)
            }
        }
    }
}
