#![forbid(unsafe_code)]

//! The travel widget: pick a country, see its cities, edit the city.
//!
//! [`run`] renders the widget into a headless page, optionally clicks a
//! country button and types into the bound city input, and reports the
//! resulting markup and state.

use std::path::PathBuf;
use std::rc::Rc;

use boundview_core::{
    BoundView, FileSource, RenderOutcome, ViewBuilder, ViewConfig, ViewError, ViewState,
};
use boundview_dom::{Dom, MemoryDom, MemoryElement};
use futures::executor::block_on;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

/// Host page the widget renders into.
pub const PAGE: &str = r#"<html><body><main id="app"></main></body></html>"#;

/// Template path handed to the source.
pub const TEMPLATE_PATH: &str = "widgets/widget1.html";

const TRAVEL_DATA: &str = include_str!("../data/travel.json");

#[derive(Debug, thiserror::Error)]
pub enum DemoError {
    #[error(transparent)]
    View(#[from] ViewError),
    #[error("travel data is malformed: {0}")]
    Data(#[from] serde_json::Error),
    #[error("no country button labelled {0:?}")]
    UnknownCountry(String),
    #[error("the widget shows no {0}")]
    MissingElement(&'static str),
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct City {
    pub name: String,
    pub blurb: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Country {
    pub country: String,
    pub cities: Vec<City>,
}

#[derive(Debug, Deserialize)]
struct TravelData {
    countries: Vec<Country>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WidgetState<'a> {
    country: &'a str,
    city: &'a str,
    cities_by_country: &'a [Country],
}

/// Bundled countries and cities.
pub fn countries() -> Result<Vec<Country>, DemoError> {
    let data: TravelData = serde_json::from_str(TRAVEL_DATA)?;
    Ok(data.countries)
}

/// Initial widget state: nothing selected.
pub fn initial_state() -> Result<ViewState, DemoError> {
    let countries = countries()?;
    let state = ViewState::from_serialize(&WidgetState {
        country: "",
        city: "",
        cities_by_country: &countries,
    })?;
    Ok(state)
}

/// `selectCountry`: the clicked country and its first city.
pub fn select_country(state: &mut ViewState, args: &Value) {
    state.set("country", args.get("country").cloned().unwrap_or_default());
    state.set("city", args.pointer("/cities/0/name").cloned().unwrap_or_default());
}

/// `cityBlurb`: the blurb of the current city, if it is a known one.
pub fn city_blurb(state: &mut ViewState, _: &Value) -> Value {
    let (Some(country), Some(city)) = (state.get_str("country"), state.get_str("city")) else {
        return Value::Null;
    };
    if city.is_empty() {
        return Value::Null;
    }
    let blurb = state
        .get("citiesByCountry")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|entry| entry["country"] == country)
        .filter_map(|entry| entry["cities"].as_array())
        .flatten()
        .find(|entry| entry["name"] == city)
        .and_then(|entry| entry["blurb"].as_str());
    Value::String(blurb.map_or_else(|| format!("No notes for {city} yet."), str::to_owned))
}

/// The widget view, unrendered.
pub fn widget(dom: Rc<MemoryDom>, templates: PathBuf) -> Result<BoundView<MemoryDom, FileSource>, DemoError> {
    Ok(ViewBuilder::new(ViewConfig::new("#app", TEMPLATE_PATH))
        .state(initial_state()?)
        .action("selectCountry", select_country)
        .method("cityBlurb", city_blurb)
        .build(dom, FileSource::new(templates)))
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// What to do after the first render.
#[derive(Debug, Clone)]
pub struct Options {
    pub templates: PathBuf,
    pub select: Option<String>,
    pub city: Option<String>,
}

/// Final widget markup and state.
#[derive(Debug)]
pub struct Report {
    pub markup: String,
    pub state: Value,
    pub renders: u64,
}

/// Render the widget and replay the requested interactions.
pub fn run(options: &Options) -> Result<Report, DemoError> {
    let dom = Rc::new(MemoryDom::from_page(PAGE));
    let view = widget(Rc::clone(&dom), options.templates.clone())?;
    let region = dom
        .query_selector("#app")
        .ok_or(DemoError::MissingElement("#app region"))?;

    let outcome = block_on(view.render())?;
    if let RenderOutcome::Rendered(report) = outcome {
        info!(clicks = report.click_handles, binds = report.bind_handles, "widget rendered");
    }

    if let Some(country) = &options.select {
        let button = find(&dom, &region, "nav button")
            .into_iter()
            .find(|b| dom.text(b).trim() == country.as_str())
            .ok_or_else(|| DemoError::UnknownCountry(country.clone()))?;
        dom.click(&button);
        info!(country = %country, "country selected");
    }
    if let Some(city) = &options.city {
        let input = find(&dom, &region, "input[name=city]")
            .into_iter()
            .next()
            .ok_or(DemoError::MissingElement("city input"))?;
        dom.change(&input, city);
        info!(city = %city, "city typed");
    }

    Ok(Report {
        markup: dom.inner_html(&region).unwrap_or_default(),
        state: view.state().into_value(),
        renders: view.render_count(),
    })
}

fn find(dom: &MemoryDom, region: &MemoryElement, css: &str) -> Vec<MemoryElement> {
    dom.select(region, css).unwrap_or_default()
}
