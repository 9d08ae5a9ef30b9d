#![forbid(unsafe_code)]

//! Directive helpers.
//!
//! | Directive | Output | Side effect |
//! |-----------|--------|-------------|
//! | `eq a b`, `neq a b`, `gt a b`, `lt a b` | boolean | none |
//! | `click "method" [redraw]` | `data-onclickhandler='N'` | appends a click handle |
//! | `bind "path"` | `data-bind='N'` | appends a bind handle |
//! | `call "method"` | method's return value | runs the method now |
//!
//! Helpers are registered per view on that view's own registry, so two
//! views never share handle tables or methods. Registering again replaces
//! every helper; the last registration wins.
//!
//! # Failure Modes
//!
//! - `click` / `call` naming an unknown method: logged at `error`, the
//!   directive emits nothing, evaluation continues.
//! - `bind` without a path argument: evaluation error.

use std::cmp::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use handlebars::{
    Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext, RenderError,
    ScopedJson, handlebars_helper,
};
use serde_json::Value;
use tracing::error;

use crate::error::ViewError;
use crate::handles::{BindHandle, ClickHandle, EvalContext, HandleTables, bind_attribute, click_attribute};
use crate::state::{MethodTable, ViewState};

// ---------------------------------------------------------------------------
// Shared view bindings
// ---------------------------------------------------------------------------

/// State reachable from both the view and its helpers.
pub(crate) struct Bindings {
    pub(crate) methods: MethodTable,
    state: Mutex<ViewState>,
    tables: Mutex<HandleTables>,
}

impl Bindings {
    pub(crate) fn new(methods: MethodTable, state: ViewState) -> Self {
        Self {
            methods,
            state: Mutex::new(state),
            tables: Mutex::new(HandleTables::new()),
        }
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn tables(&self) -> MutexGuard<'_, HandleTables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Install every directive helper on `registry`.
pub(crate) fn register_helpers(registry: &mut Handlebars<'static>, bindings: &Arc<Bindings>) {
    registry.register_helper("eq", Box::new(eq));
    registry.register_helper("neq", Box::new(neq));
    registry.register_helper("gt", Box::new(gt));
    registry.register_helper("lt", Box::new(lt));
    registry.register_helper(
        "click",
        Box::new(ClickHelper {
            bindings: Arc::clone(bindings),
        }),
    );
    registry.register_helper(
        "bind",
        Box::new(BindHelper {
            bindings: Arc::clone(bindings),
        }),
    );
    registry.register_helper(
        "call",
        Box::new(CallHelper {
            bindings: Arc::clone(bindings),
        }),
    );
}

// ---------------------------------------------------------------------------
// Comparisons
// ---------------------------------------------------------------------------

handlebars_helper!(eq: |a: Json, b: Json| strict_eq(a, b));
handlebars_helper!(neq: |a: Json, b: Json| !strict_eq(a, b));
// `gt` / `lt` never coerce across types: `gt "10" 9` is false, as is `lt "10" 9`.
handlebars_helper!(gt: |a: Json, b: Json| compare(a, b) == Some(Ordering::Greater));
handlebars_helper!(lt: |a: Json, b: Json| compare(a, b) == Some(Ordering::Less));

/// Type-and-value equality; numbers compare by value (`1 == 1.0`).
pub fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Ordering of two numbers or two strings. Anything else is unordered,
/// including a number against a numeric string.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Handle-emitting directives
// ---------------------------------------------------------------------------

struct ClickHelper {
    bindings: Arc<Bindings>,
}

impl HelperDef for ClickHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'reg, 'rc>,
        _: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let name = method_name(h);
        let Some(invoke) = self.bindings.methods.get(&name).cloned() else {
            report_missing("click", &name);
            return Ok(());
        };
        let redraw = h.param(1).and_then(|p| p.value().as_bool()).unwrap_or(true);
        let context = capture_context(ctx, rc)?;
        let index = self.bindings.tables().push_click(ClickHandle {
            method: name,
            invoke,
            redraw,
            context,
        });
        out.write(&click_attribute(index))?;
        Ok(())
    }
}

struct BindHelper {
    bindings: Arc<Bindings>,
}

impl HelperDef for BindHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'reg, 'rc>,
        _: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let path = h
            .param(0)
            .map(|p| json_text(p.value()))
            .ok_or_else(|| RenderError::new("`bind` requires a property path"))?;
        let context = capture_context(ctx, rc)?;
        let index = self.bindings.tables().push_bind(BindHandle { path, context });
        out.write(&bind_attribute(index))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Direct invocation
// ---------------------------------------------------------------------------

struct CallHelper {
    bindings: Arc<Bindings>,
}

impl HelperDef for CallHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'reg, 'rc>,
        _: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'reg, 'rc>, RenderError> {
        let name = method_name(h);
        let Some(method) = self.bindings.methods.get(&name).cloned() else {
            report_missing("call", &name);
            return Ok(ScopedJson::Derived(Value::String(String::new())));
        };
        let this = rc.evaluate(ctx, "this")?.as_json().clone();
        let result = method(&mut self.bindings.state(), &this);
        Ok(ScopedJson::Derived(result))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn method_name(h: &Helper<'_, '_>) -> String {
    h.param(0).map(|p| json_text(p.value())).unwrap_or_default()
}

fn json_text(value: &Value) -> String {
    value.as_str().map_or_else(|| value.to_string(), str::to_owned)
}

fn report_missing(directive: &'static str, name: &str) {
    let err = ViewError::MissingMethod(name.to_owned());
    error!(directive, error = %err, "directive skipped");
}

/// The evaluator's current `this` and, when it has one, its path inside the
/// root context.
fn capture_context<'reg: 'rc, 'rc>(
    ctx: &'rc Context,
    rc: &RenderContext<'reg, 'rc>,
) -> Result<EvalContext, RenderError> {
    let value = rc.evaluate(ctx, "this")?.as_json().clone();
    let path = match rc.block() {
        Some(block) if block.base_value().is_some() => None,
        Some(block) => Some(block.base_path().clone()),
        None => Some(Vec::new()),
    };
    Ok(EvalContext { value, path })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tracing_test::traced_test;

    const NAME: &str = "view";

    fn setup(template: &str, methods: MethodTable, state: Value) -> (Handlebars<'static>, Arc<Bindings>) {
        let bindings = Arc::new(Bindings::new(methods, ViewState::try_from(state).unwrap()));
        let mut registry = Handlebars::new();
        register_helpers(&mut registry, &bindings);
        registry.register_template_string(NAME, template).unwrap();
        (registry, bindings)
    }

    fn render(registry: &Handlebars<'static>, bindings: &Bindings) -> String {
        let data = bindings.state().as_value().clone();
        registry.render(NAME, &data).unwrap()
    }

    fn selecting() -> MethodTable {
        let mut methods = MethodTable::new();
        methods.insert_action("select", |state: &mut ViewState, ctx: &Value| {
            state.set("picked", ctx.clone());
        });
        methods
    }

    #[test]
    fn comparisons() {
        let (registry, bindings) = setup(
            "{{#if (eq a 1)}}E{{/if}}{{#if (neq a b)}}N{{/if}}{{#if (gt b a)}}G{{/if}}{{#if (lt s t)}}L{{/if}}{{#if (gt s 1)}}X{{/if}}",
            MethodTable::new(),
            json!({ "a": 1.0, "b": 2, "s": "apple", "t": "banana" }),
        );
        assert_eq!(render(&registry, &bindings), "ENGL");
    }

    #[test]
    fn strict_equality_keeps_types_apart() {
        assert!(strict_eq(&json!(1), &json!(1.0)));
        assert!(!strict_eq(&json!(1), &json!("1")));
        assert!(!strict_eq(&json!(null), &json!(false)));
        assert_eq!(compare(&json!(true), &json!(false)), None);
        assert_eq!(compare(&json!("10"), &json!(9)), None);
        assert_eq!(compare(&json!(9), &json!("10")), None);
    }

    #[test]
    fn click_handles_follow_document_order() {
        let (registry, bindings) = setup(
            "{{#each items}}<b {{click \"select\"}}>{{name}}</b>{{/each}}<i {{click \"select\" false}}></i>",
            selecting(),
            json!({ "items": [{ "name": "a" }, { "name": "b" }] }),
        );
        let html = render(&registry, &bindings);
        assert_eq!(
            html,
            "<b data-onclickhandler='0'>a</b><b data-onclickhandler='1'>b</b><i data-onclickhandler='2'></i>"
        );

        let tables = bindings.tables();
        assert_eq!(tables.click_count(), 3);
        let first = tables.click(0).unwrap();
        assert!(first.redraw);
        assert_eq!(first.context.value, json!({ "name": "a" }));
        assert_eq!(first.context.path, Some(vec!["items".to_owned(), "0".to_owned()]));
        let last = tables.click(2).unwrap();
        assert!(!last.redraw);
        assert_eq!(last.context.path, Some(Vec::new()));
    }

    #[test]
    fn non_boolean_redraw_defaults_to_true() {
        let (registry, bindings) = setup("<b {{click \"select\" \"no\"}}></b>", selecting(), json!({}));
        render(&registry, &bindings);
        assert!(bindings.tables().click(0).unwrap().redraw);
    }

    #[test]
    fn bind_records_raw_path_and_context() {
        let (registry, bindings) = setup(
            "<input {{bind \"base.country\"}}>{{#each cities}}<span {{bind \"name\"}}></span>{{/each}}",
            MethodTable::new(),
            json!({ "country": "", "cities": [{ "name": "Kyoto" }] }),
        );
        assert_eq!(
            render(&registry, &bindings),
            "<input data-bind='0'><span data-bind='1'></span>"
        );
        let tables = bindings.tables();
        assert_eq!(tables.bind(0).unwrap().path, "base.country");
        let city = tables.bind(1).unwrap();
        assert_eq!(city.path, "name");
        assert_eq!(city.context.path, Some(vec!["cities".to_owned(), "0".to_owned()]));
    }

    #[test]
    fn bind_without_path_fails_evaluation() {
        let (registry, bindings) = setup("<p {{bind}}></p>", MethodTable::new(), json!({}));
        let data = bindings.state().as_value().clone();
        assert!(registry.render(NAME, &data).is_err());
    }

    #[test]
    fn call_inlines_and_escapes() {
        let mut methods = MethodTable::new();
        methods.insert("label", |state: &mut ViewState, ctx: &Value| {
            let count = state.get("calls").and_then(Value::as_u64).unwrap_or(0) + 1;
            state.set("calls", count);
            Value::String(format!("<em>{}</em>", ctx["name"].as_str().unwrap_or("?")))
        });
        let (registry, bindings) = setup(
            "{{#each items}}{{call \"label\"}}|{{{call \"label\"}}};{{/each}}",
            methods,
            json!({ "items": [{ "name": "x" }] }),
        );
        assert_eq!(
            render(&registry, &bindings),
            "&lt;em&gt;x&lt;/em&gt;|<em>x</em>;"
        );
        assert_eq!(bindings.state().get("calls"), Some(&json!(2)));
        assert_eq!(bindings.tables().click_count(), 0, "call records no handle");
    }

    #[traced_test]
    #[test]
    fn missing_methods_degrade_to_empty_output() {
        let (registry, bindings) = setup(
            "<b {{click \"nope\"}}>[{{call \"absent\"}}]</b>",
            MethodTable::new(),
            json!({}),
        );
        assert_eq!(render(&registry, &bindings), "<b >[]</b>");
        assert_eq!(bindings.tables().click_count(), 0);
        assert!(logs_contain("method `nope` does not exist on the view"));
        assert!(logs_contain("method `absent` does not exist on the view"));
    }

    #[test]
    fn registering_twice_keeps_single_effect() {
        let (mut registry, bindings) = setup("<b {{click \"select\"}}></b>", selecting(), json!({}));
        register_helpers(&mut registry, &bindings);
        assert_eq!(render(&registry, &bindings), "<b data-onclickhandler='0'></b>");
        assert_eq!(bindings.tables().click_count(), 1);
    }
}
