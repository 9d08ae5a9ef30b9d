#![forbid(unsafe_code)]

//! Bound views: a Handlebars template rendered into a DOM region, with click
//! handlers and two-way property bindings re-attached after every render.
//!
//! This crate provides:
//! - [`BoundView`] and [`ViewBuilder`] for the render cycle
//! - [`ViewState`] and [`MethodTable`] for the data and methods a template sees
//! - [`ViewConfig`] for the target region and template path
//! - [`TemplateSource`] with [`FileSource`] and [`StaticSource`] backends
//!
//! Templates use these directives on top of standard Handlebars:
//!
//! ```text
//! {{#each countries}}
//!   <button {{click "selectCountry"}} class="{{#if (eq name ../country)}}on{{/if}}">{{name}}</button>
//! {{/each}}
//! <input {{bind "base.city"}}>
//! <p>{{call "summary"}}</p>
//! ```

pub mod change;
pub mod config;
pub mod error;
pub mod handles;
pub mod helpers;
pub mod path;
pub mod source;
pub mod state;
pub mod view;

pub use change::{RESERVED_FIELDS, StateSnapshot};
pub use config::{ConfigError, DEFAULT_TARGET, ViewConfig};
pub use error::ViewError;
pub use path::{BindPath, Location, PathError, Scope, resolve};
pub use source::{FetchError, FileSource, StaticSource, TemplateSource};
pub use state::{Method, MethodTable, ViewState};
pub use view::{BoundView, Phase, RenderOutcome, RenderReport, ViewBuilder};
