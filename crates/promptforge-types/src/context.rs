// ABOUTME: Render context — the value tree templates are rendered against
use serde_json::Value;
use std::collections::HashMap;

/// A mapping from dotted-path key to value, used to render a template.
///
/// Backed by `serde_json::Value` so it can hold strings, numbers, booleans,
/// arrays, and nested objects uniformly; dotted-path traversal and loop
/// scope bindings (`this`, `@index`, `@first`, `@last`) are layered on top
/// by the engine, not stored here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderContext {
    root: Value,
}

impl RenderContext {
    pub fn new() -> Self {
        Self {
            root: Value::Object(serde_json::Map::new()),
        }
    }

    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    pub fn from_map(map: HashMap<String, Value>) -> Self {
        Self {
            root: Value::Object(map.into_iter().collect()),
        }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn set(&mut self, key: &str, value: Value) {
        if let Value::Object(map) = &mut self.root {
            map.insert(key.to_string(), value);
        }
    }

    /// Resolve a dotted path (`a.b.0.c`) against the root value. Numeric
    /// path segments index arrays; everything else indexes object keys.
    /// Returns `None` when any segment along the path is missing.
    pub fn resolve(&self, path: &str) -> Option<&Value> {
        resolve_path(&self.root, path)
    }
}

pub fn resolve_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    if path.is_empty() || path == "." {
        return Some(current);
    }
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(arr) => {
                let idx: usize = segment.parse().ok()?;
                arr.get(idx)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// JavaScript-flavored truthiness, per spec §3 and §8: null/undefined are
/// false; booleans pass through; strings are truthy iff non-empty; numbers
/// are truthy iff non-zero and not NaN; arrays are truthy iff non-empty;
/// objects are truthy iff they own at least one key.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_nested_dotted_paths() {
        let ctx = RenderContext::from_value(json!({"a": {"b": [1, 2, {"c": "x"}]}}));
        assert_eq!(ctx.resolve("a.b.2.c"), Some(&json!("x")));
        assert_eq!(ctx.resolve("a.b.9"), None);
        assert_eq!(ctx.resolve("missing"), None);
    }

    #[test]
    fn truthiness_matches_spec_boundary_table() {
        assert!(!is_truthy(&json!({})));
        assert!(is_truthy(&json!({"a": 0})));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!("0")));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!([])));
        assert!(is_truthy(&json!([false])));
    }
}
