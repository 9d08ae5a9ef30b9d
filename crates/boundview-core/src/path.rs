#![forbid(unsafe_code)]

//! Bind-path resolution.
//!
//! A bind path such as `"user.address[0].city"` names a property relative to
//! one of two roots:
//!
//! - `base.` prefix: the view state itself,
//! - `this.` prefix or no prefix: the evaluation context captured when the
//!   `bind` directive ran.
//!
//! Bracket indices are rewritten to dotted segments (`a[0]` ≡ `a.0`). All
//! segments but the last are walked; the last is returned unresolved as a
//! [`Location`], so the same resolution serves both the initial read and
//! the write-back.
//!
//! # Invariants
//!
//! 1. Resolution never creates intermediate containers.
//! 2. A missing intermediate segment is an error, never a default.
//! 3. The final key may be absent; reading it yields `None`, writing it
//!    inserts it (objects) or appends it (arrays, at `len`).

use serde_json::Value;

/// Errors from bind-path resolution and write-back.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// An intermediate segment does not exist on the current object.
    #[error("property not found: `{segment}` in bind path `{path}`")]
    NotFound { path: String, segment: String },
    /// The final location is not an object or array.
    #[error("cannot write `{key}` in bind path `{path}`: parent is not an object or array")]
    NotAContainer { path: String, key: String },
    /// The item a context path was rendered from is no longer at its
    /// recorded location in the state.
    #[error("bound item moved or changed since render, bind path `{path}` not written")]
    StaleContext { path: String },
    /// An array write past the end.
    #[error("index {index} out of bounds (len {len}) in bind path `{path}`")]
    IndexOutOfBounds {
        path: String,
        index: usize,
        len: usize,
    },
}

/// Root a bind path resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// `base.` prefix: the view state.
    View,
    /// `this.` prefix or bare path: the captured evaluation context.
    Context,
}

/// A parsed bind path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindPath {
    raw: String,
    scope: Scope,
    segments: Vec<String>,
}

impl BindPath {
    /// Parse a raw bind path. Parsing never fails; an empty remainder
    /// resolves to the empty key on the root.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let (scope, rest) = if let Some(rest) = raw.strip_prefix("base.") {
            (Scope::View, rest)
        } else if let Some(rest) = raw.strip_prefix("this.") {
            (Scope::Context, rest)
        } else {
            (Scope::Context, raw)
        };
        let mut segments: Vec<String> = normalize(rest)
            .split('.')
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();
        if segments.is_empty() {
            segments.push(String::new());
        }
        Self {
            raw: raw.to_owned(),
            scope,
            segments,
        }
    }

    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Dotted segments after prefix stripping and bracket rewriting.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Walk all but the last segment from `root`.
    pub fn locate<'a>(&self, root: &'a mut Value) -> Result<Location<'a>, PathError> {
        let (key, parents) = match self.segments.split_last() {
            Some((key, parents)) => (key.as_str(), parents),
            None => ("", &[][..]),
        };
        let container = walk(root, parents).map_err(|segment| PathError::NotFound {
            path: self.raw.clone(),
            segment,
        })?;
        Ok(Location {
            container,
            key: key.to_owned(),
            path: self.raw.clone(),
        })
    }
}

/// Resolve `path` against `view` or `context` according to its prefix.
pub fn resolve<'a>(
    view: &'a mut Value,
    context: &'a mut Value,
    path: &str,
) -> Result<Location<'a>, PathError> {
    let path = BindPath::parse(path);
    match path.scope() {
        Scope::View => path.locate(view),
        Scope::Context => path.locate(context),
    }
}

/// Rewrite bracket indices as dotted segments: `a.b[2].c` → `a.b.2.c`.
#[must_use]
pub fn normalize(path: &str) -> String {
    path.replace('[', ".").replace(']', "")
}

/// Follow `segments` from `root`. On failure returns the missing segment.
pub(crate) fn walk<'a, S: AsRef<str>>(
    root: &'a mut Value,
    segments: &[S],
) -> Result<&'a mut Value, String> {
    let mut current = root;
    for segment in segments {
        let segment = segment.as_ref();
        current = match current {
            Value::Object(map) => map.get_mut(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get_mut(i)),
            _ => None,
        }
        .ok_or_else(|| segment.to_owned())?;
    }
    Ok(current)
}

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// A resolved `(container, key)` pair.
#[derive(Debug)]
pub struct Location<'a> {
    container: &'a mut Value,
    key: String,
    path: String,
}

impl Location<'_> {
    /// The object or array holding the property.
    #[must_use]
    pub fn container(&self) -> &Value {
        self.container
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current property value, `None` when absent.
    #[must_use]
    pub fn get(&self) -> Option<&Value> {
        match &*self.container {
            Value::Object(map) => map.get(&self.key),
            Value::Array(items) => self.key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// Text shown for the property in a control or element.
    #[must_use]
    pub fn display(&self) -> String {
        match self.get() {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }

    /// Store `value` at the location.
    pub fn set(self, value: Value) -> Result<(), PathError> {
        match self.container {
            Value::Object(map) => {
                map.insert(self.key, value);
                Ok(())
            }
            Value::Array(items) => {
                let Ok(index) = self.key.parse::<usize>() else {
                    return Err(PathError::NotAContainer {
                        path: self.path,
                        key: self.key,
                    });
                };
                match index.cmp(&items.len()) {
                    std::cmp::Ordering::Less => items[index] = value,
                    std::cmp::Ordering::Equal => items.push(value),
                    std::cmp::Ordering::Greater => {
                        return Err(PathError::IndexOutOfBounds {
                            path: self.path,
                            index,
                            len: items.len(),
                        });
                    }
                }
                Ok(())
            }
            _ => Err(PathError::NotAContainer {
                path: self.path,
                key: self.key,
            }),
        }
    }
}
