use std::rc::Rc;

use boundview_core::{BoundView, StaticSource, ViewBuilder, ViewConfig, ViewState};
use boundview_dom::{Dom, MemoryDom, MemoryElement};
use futures::executor::block_on;
use serde_json::{Value, json};

const TEMPLATE: &str = concat!(
    "<p>{{count}}</p>",
    "<button id=\"inc\" {{click \"increment\"}}>+</button>",
    "<button id=\"noop\" {{click \"inspect\"}}>?</button>",
    "<button id=\"quiet\" {{click \"increment\" false}}>+ quietly</button>",
    "<button id=\"reserved\" {{click \"retarget\"}}>retarget</button>",
);

fn counter() -> BoundView<MemoryDom, StaticSource> {
    let view = ViewBuilder::new(ViewConfig::for_view("Counter"))
        .state(ViewState::try_from(json!({ "count": 0 })).unwrap())
        .action("increment", |state: &mut ViewState, _: &Value| {
            let count = state.get("count").and_then(Value::as_i64).unwrap_or(0);
            state.set("count", count + 1);
        })
        .action("inspect", |_: &mut ViewState, _: &Value| {})
        .action("retarget", |state: &mut ViewState, _: &Value| {
            state.set("target", "#elsewhere");
            state.set("templatePath", "other.html");
        })
        .build(
            Rc::new(MemoryDom::from_page(
                r#"<html><body><div id="app"></div></body></html>"#,
            )),
            StaticSource::new().with("Counter.html", TEMPLATE),
        );
    block_on(view.render()).unwrap();
    view
}

fn button(view: &BoundView<MemoryDom, StaticSource>, id: &str) -> MemoryElement {
    let region = view.dom().query_selector("#app").unwrap();
    view.dom().select(&region, &format!("#{id}")).unwrap()[0]
}

fn shown(view: &BoundView<MemoryDom, StaticSource>) -> String {
    let region = view.dom().query_selector("#app").unwrap();
    let p = view.dom().select(&region, "p").unwrap()[0];
    view.dom().text(&p)
}

#[test]
fn mutating_redraw_click_renders_exactly_once() {
    let view = counter();
    assert_eq!(view.render_count(), 1);

    view.dom().click(&button(&view, "inc"));
    assert_eq!(view.render_count(), 2);
    assert_eq!(shown(&view), "1");

    view.dom().click(&button(&view, "inc"));
    assert_eq!(view.render_count(), 3);
    assert_eq!(shown(&view), "2");
}

#[test]
fn redraw_click_without_mutation_does_not_render() {
    let view = counter();
    let before = view.snapshot();
    view.dom().click(&button(&view, "noop"));
    assert_eq!(view.render_count(), 1);
    assert_eq!(view.snapshot(), before);
}

#[test]
fn non_redraw_click_never_renders() {
    let view = counter();
    let quiet = button(&view, "quiet");
    view.dom().click(&quiet);
    view.dom().click(&quiet);

    assert_eq!(view.render_count(), 1);
    assert_eq!(view.state().get("count"), Some(&json!(2)));
    assert_eq!(shown(&view), "0", "markup is stale until the next render");

    view.rerender().unwrap();
    assert_eq!(shown(&view), "2");
}

#[test]
fn reserved_field_churn_is_not_a_change() {
    let view = counter();
    view.dom().click(&button(&view, "reserved"));
    assert_eq!(view.render_count(), 1);
    assert_eq!(view.state().get_str("target"), Some("#elsewhere"));
}
