#![forbid(unsafe_code)]

//! Template sources.
//!
//! A [`TemplateSource`] turns a template path into template text. Retrieval
//! either yields the whole body or fails; there are no partial results.

use std::collections::HashMap;
use std::future::{Future, ready};
use std::io;
use std::path::PathBuf;

/// Template retrieval failures.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The source answered with a non-success status.
    #[error("could not load template {path}: HTTP error! status: {status}")]
    Status { path: String, status: u16 },
    /// Local I/O failed.
    #[error("could not load template {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    /// The request never produced a response.
    #[error("could not load template {path}: {message}")]
    Network { path: String, message: String },
}

impl FetchError {
    /// Path whose retrieval failed.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Status { path, .. } | Self::Io { path, .. } | Self::Network { path, .. } => path,
        }
    }
}

/// Asynchronous text fetch over a template path.
pub trait TemplateSource {
    fn fetch(&self, path: &str) -> impl Future<Output = Result<String, FetchError>>;
}

/// Reads templates from a directory.
#[derive(Debug, Clone)]
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl TemplateSource for FileSource {
    fn fetch(&self, path: &str) -> impl Future<Output = Result<String, FetchError>> {
        let result = std::fs::read_to_string(self.root.join(path)).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                FetchError::Status {
                    path: path.to_owned(),
                    status: 404,
                }
            } else {
                FetchError::Io {
                    path: path.to_owned(),
                    source,
                }
            }
        });
        ready(result)
    }
}

/// In-memory `path → template` map.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    templates: HashMap<String, String>,
}

impl StaticSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, path: impl Into<String>, template: impl Into<String>) -> Self {
        self.insert(path, template);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, template: impl Into<String>) {
        self.templates.insert(path.into(), template.into());
    }
}

impl TemplateSource for StaticSource {
    fn fetch(&self, path: &str) -> impl Future<Output = Result<String, FetchError>> {
        ready(self.templates.get(path).cloned().ok_or_else(|| FetchError::Status {
            path: path.to_owned(),
            status: 404,
        }))
    }
}
