#![forbid(unsafe_code)]

//! Engine errors.
//!
//! # Failure Modes
//!
//! | Failure | Variant | Behavior |
//! |---------|---------|----------|
//! | Invalid configuration | `Config` | Logged once; view disabled, renders are no-ops |
//! | Unknown directive method | `MissingMethod` | Logged; directive emits nothing; render continues |
//! | Template fetch failed | `Fetch` | Logged; render aborted; DOM and handles untouched |
//! | Template does not compile | `Compile` | Logged; render aborted; DOM and handles untouched |
//! | Target region absent | `TargetNotFound` | Logged; markup not injected; rebinding is a no-op |
//! | Intermediate bind segment absent | `Path` | Logged; rebinding stops; render returns the error |
//!
//! `MissingMethod` and `TargetNotFound` are never returned from a render;
//! they only format the logged report.

use crate::config::ConfigError;
use crate::path::PathError;
use crate::source::FetchError;

#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error("invalid view configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("could not compile template {path}: {source}")]
    Compile {
        path: String,
        #[source]
        source: Box<handlebars::TemplateError>,
    },

    #[error("template evaluation failed: {0}")]
    Evaluate(#[from] Box<handlebars::RenderError>),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error("view state must be a JSON object, got {0}")]
    StateNotObject(&'static str),

    #[error("view state could not be encoded: {0}")]
    StateEncode(String),

    #[error("method `{0}` does not exist on the view")]
    MissingMethod(String),

    #[error("the target \"{0}\" could not be found")]
    TargetNotFound(String),
}

impl From<handlebars::RenderError> for ViewError {
    fn from(err: handlebars::RenderError) -> Self {
        Self::Evaluate(Box::new(err))
    }
}
