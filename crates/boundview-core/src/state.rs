#![forbid(unsafe_code)]

//! View state and the method capability set.
//!
//! [`ViewState`] holds a view's application fields as a JSON object, which is
//! what the template evaluates against and what bind paths walk.
//! [`MethodTable`] maps directive method names to callables, so `click` and
//! `call` keep their dispatch-by-name contract without reflection.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ViewError;

/// A view method: receives the state and the evaluation context of the
/// directive that referenced it.
pub type Method = Arc<dyn Fn(&mut ViewState, &Value) -> Value + Send + Sync>;

/// Application fields of a view. Always a JSON object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ViewState(Value);

impl ViewState {
    /// An empty state.
    #[must_use]
    pub fn new() -> Self {
        Self(Value::Object(Map::new()))
    }

    /// Build a state from any serializable value that serializes to an object.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, ViewError> {
        let value = serde_json::to_value(value).map_err(|err| ViewError::StateEncode(err.to_string()))?;
        Self::try_from(value)
    }

    /// Field lookup.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String field, `None` when absent or not a string.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// JSON-pointer lookup (`/cities/0/name`).
    #[must_use]
    pub fn pointer(&self, pointer: &str) -> Option<&Value> {
        self.0.pointer(pointer)
    }

    /// Insert or replace a field.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        if let Value::Object(map) = &mut self.0 {
            map.insert(key.into(), value.into());
        }
    }

    /// Remove a field, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        match &mut self.0 {
            Value::Object(map) => map.remove(key),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Mutable root. Replacing it with a non-object breaks field access.
    pub fn as_value_mut(&mut self) -> &mut Value {
        &mut self.0
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<Value> for ViewState {
    type Error = ViewError;

    fn try_from(value: Value) -> Result<Self, ViewError> {
        match value {
            Value::Object(_) => Ok(Self(value)),
            other => Err(ViewError::StateNotObject(json_kind(&other))),
        }
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// MethodTable
// ---------------------------------------------------------------------------

/// Name → callable map consulted by the `click` and `call` directives.
#[derive(Clone, Default)]
pub struct MethodTable {
    methods: HashMap<String, Method>,
}

impl MethodTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a value-returning method. Re-registering a name replaces it.
    pub fn insert<F>(&mut self, name: impl Into<String>, method: F)
    where
        F: Fn(&mut ViewState, &Value) -> Value + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Arc::new(method));
    }

    /// Register a method whose return value is irrelevant (click handlers).
    pub fn insert_action<F>(&mut self, name: impl Into<String>, action: F)
    where
        F: Fn(&mut ViewState, &Value) + Send + Sync + 'static,
    {
        self.insert(name, move |state: &mut ViewState, ctx: &Value| {
            action(state, ctx);
            Value::Null
        });
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.methods.keys().collect();
        names.sort();
        f.debug_struct("MethodTable").field("methods", &names).finish()
    }
}
