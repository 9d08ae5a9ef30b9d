#![no_main]

use arbitrary::Arbitrary;
use boundview_core::{BindPath, Scope, resolve};
use libfuzzer_sys::fuzz_target;
use serde_json::{Value, json};

#[derive(Debug, Arbitrary)]
struct Input {
    path: String,
    write: Option<String>,
}

fuzz_target!(|input: Input| {
    let parsed = BindPath::parse(&input.path);
    assert!(!parsed.segments().is_empty());
    assert!(parsed.segments().iter().all(|s| !s.contains(['[', ']', '.'])));
    if input.path.starts_with("base.") {
        assert_eq!(parsed.scope(), Scope::View);
    }

    let mut view = json!({ "a": { "b": [0, { "c": "x" }] }, "list": [] });
    let mut context = json!({ "name": "n", "tags": ["t"] });
    if let Ok(location) = resolve(&mut view, &mut context, &input.path) {
        let _ = location.display();
        if let Some(text) = input.write {
            let _ = location.set(Value::String(text));
        }
    }
});
