#![forbid(unsafe_code)]

//! Change detection for click handlers.
//!
//! A redraw-flagged click handler runs between two [`StateSnapshot`]s; the
//! view re-renders only when they differ.
//!
//! # Invariants
//!
//! 1. Engine-reserved keys ([`RESERVED_FIELDS`]) are dropped at every depth,
//!    so their churn never triggers or suppresses a redraw.
//! 2. Object keys serialize in sorted order; structurally equal states yield
//!    byte-identical snapshots regardless of insertion order.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::state::ViewState;

/// Keys owned by the engine and excluded from state comparison.
pub const RESERVED_FIELDS: [&str; 5] = [
    "onclickHandles",
    "bindHandles",
    "target",
    "template",
    "templatePath",
];

/// Serialized externally-visible view state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateSnapshot(String);

impl StateSnapshot {
    /// Capture `state`.
    #[must_use]
    pub fn capture(state: &ViewState) -> Self {
        Self(strip_reserved(state.as_value()).to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn strip_reserved(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            // Sorted explicitly: `Map` keeps insertion order when
            // serde_json's `preserve_order` is enabled anywhere in the build.
            let sorted: BTreeMap<&String, &Value> = map
                .iter()
                .filter(|(key, _)| !RESERVED_FIELDS.contains(&key.as_str()))
                .collect();
            Value::Object(
                sorted
                    .into_iter()
                    .map(|(key, value)| (key.clone(), strip_reserved(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(strip_reserved).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{Map, json};

    fn state(value: Value) -> ViewState {
        ViewState::try_from(value).unwrap()
    }

    #[test]
    fn reserved_fields_are_ignored_at_any_depth() {
        let a = state(json!({ "city": "Oslo", "target": "#a", "nested": { "template": 1 } }));
        let b = state(json!({ "city": "Oslo", "target": "#b", "nested": { "template": 2 } }));
        assert_eq!(StateSnapshot::capture(&a), StateSnapshot::capture(&b));
        assert_eq!(
            StateSnapshot::capture(&a).as_str(),
            r#"{"city":"Oslo","nested":{}}"#
        );
    }

    #[test]
    fn application_changes_are_seen() {
        let a = state(json!({ "city": "Oslo" }));
        let b = state(json!({ "city": "Bergen" }));
        assert_ne!(StateSnapshot::capture(&a), StateSnapshot::capture(&b));
    }

    #[test]
    fn reserved_keys_inside_arrays() {
        let a = state(json!({ "items": [{ "bindHandles": [1], "name": "x" }] }));
        let b = state(json!({ "items": [{ "name": "x" }] }));
        assert_eq!(StateSnapshot::capture(&a), StateSnapshot::capture(&b));
    }

    proptest! {
        #[test]
        fn insertion_order_does_not_matter(
            entries in proptest::collection::btree_map("[a-z]{1,8}", any::<i64>(), 0..12),
        ) {
            let forward: Map<String, Value> =
                entries.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
            let backward: Map<String, Value> =
                entries.iter().rev().map(|(k, v)| (k.clone(), json!(v))).collect();
            prop_assert_eq!(
                StateSnapshot::capture(&state(Value::Object(forward))),
                StateSnapshot::capture(&state(Value::Object(backward)))
            );
        }

        #[test]
        fn reserved_churn_never_changes_snapshot(
            city in "[A-Za-z ]{0,12}",
            target in "#[a-z]{1,8}",
            path in "[a-z/]{1,16}\\.hbs",
            handles in 0usize..6,
        ) {
            let plain = state(json!({ "city": city }));
            let noisy = state(json!({
                "city": city,
                "target": target,
                "templatePath": path,
                "onclickHandles": vec![0; handles],
                "bindHandles": vec![0; handles],
            }));
            prop_assert_eq!(StateSnapshot::capture(&plain), StateSnapshot::capture(&noisy));
        }
    }
}
