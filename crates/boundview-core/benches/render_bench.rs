//! Benchmarks for the render cycle.
//!
//! Run with: `cargo bench --package boundview-core --bench render_bench`
//!
//! Covers a full re-render (evaluate, inject, rebind) at growing list sizes
//! and the snapshot comparison a redraw-flagged click pays.

use std::rc::Rc;

use boundview_core::{BoundView, StateSnapshot, StaticSource, ViewBuilder, ViewConfig, ViewState};
use boundview_dom::MemoryDom;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use futures::executor::block_on;
use serde_json::{Value, json};
use std::hint::black_box;

const TEMPLATE: &str = concat!(
    "<ul>{{#each rows}}<li {{click \"pick\"}}><input {{bind \"label\"}}>{{label}}</li>{{/each}}</ul>",
    "<input {{bind \"base.filter\"}}>",
);

fn state(rows: usize) -> ViewState {
    let rows: Vec<Value> = (0..rows).map(|i| json!({ "label": format!("row {i}") })).collect();
    ViewState::try_from(json!({ "rows": rows, "filter": "" })).unwrap()
}

fn view(rows: usize) -> BoundView<MemoryDom, StaticSource> {
    let view = ViewBuilder::new(ViewConfig::for_view("Rows"))
        .state(state(rows))
        .action("pick", |state: &mut ViewState, ctx: &Value| state.set("picked", ctx.clone()))
        .build(
            Rc::new(MemoryDom::from_page(r#"<html><body><div id="app"></div></body></html>"#)),
            StaticSource::new().with("Rows.html", TEMPLATE),
        );
    block_on(view.render()).unwrap();
    view
}

// ============================================================================
// Render
// ============================================================================

fn bench_rerender(c: &mut Criterion) {
    let mut group = c.benchmark_group("render/rerender");
    for rows in [10usize, 100, 1_000] {
        let view = view(rows);
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &rows, |b, _| {
            b.iter(|| black_box(view.rerender().unwrap()));
        });
    }
    group.finish();
}

// ============================================================================
// Change detection
// ============================================================================

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("render/snapshot");
    for rows in [10usize, 100, 1_000] {
        let state = state(rows);
        group.bench_with_input(BenchmarkId::from_parameter(rows), &state, |b, state| {
            b.iter(|| black_box(StateSnapshot::capture(state)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_rerender, bench_snapshot);
criterion_main!(benches);
