#![forbid(unsafe_code)]

//! View configuration.
//!
//! A view needs two strings: the selector of the region it renders into and
//! the path of its template. Both can be given in code or loaded as data:
//!
//! ```toml
//! target = "#sidebar"
//! templatePath = "widgets/widget1.html"
//! ```

use serde::{Deserialize, Serialize};

/// Selector used when none is configured.
pub const DEFAULT_TARGET: &str = "#app";

/// Configuration errors. A view built from an invalid configuration is
/// disabled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("target selector is empty")]
    EmptyTarget,
    #[error("template path is empty")]
    EmptyTemplatePath,
    #[error("could not parse view configuration: {0}")]
    Parse(String),
}

/// Where a view renders and which template it renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ViewConfig {
    /// CSS selector of the render region.
    #[serde(default = "default_target")]
    pub target: String,
    /// Path handed to the template source.
    pub template_path: String,
}

fn default_target() -> String {
    DEFAULT_TARGET.to_owned()
}

impl ViewConfig {
    #[must_use]
    pub fn new(target: impl Into<String>, template_path: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            template_path: template_path.into(),
        }
    }

    /// Defaults for a view type: renders into `#app` from `<name>.html`.
    #[must_use]
    pub fn for_view(name: &str) -> Self {
        Self::new(DEFAULT_TARGET, format!("{name}.html"))
    }

    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    #[must_use]
    pub fn with_template_path(mut self, path: impl Into<String>) -> Self {
        self.template_path = path.into();
        self
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Reject configurations a view cannot render with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target.trim().is_empty() {
            return Err(ConfigError::EmptyTarget);
        }
        if self.template_path.trim().is_empty() {
            return Err(ConfigError::EmptyTemplatePath);
        }
        Ok(())
    }
}
