// ABOUTME: Named helper functions usable inside block conditions and inline expressions
use promptforge_types::is_truthy;
use serde_json::Value;
use std::collections::HashMap;

type HelperFn = fn(&[Value]) -> Value;

/// Registry of named helpers, evaluated against already-resolved argument
/// values (path resolution happens in the renderer before a helper runs).
pub struct HelperRegistry {
    helpers: HashMap<&'static str, HelperFn>,
}

impl HelperRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            helpers: HashMap::new(),
        };
        registry.register_builtins();
        registry
    }

    pub fn register(&mut self, name: &'static str, f: HelperFn) {
        self.helpers.insert(name, f);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.helpers.contains_key(name)
    }

    pub fn call(&self, name: &str, args: &[Value]) -> Option<Value> {
        self.helpers.get(name).map(|f| f(args))
    }

    fn register_builtins(&mut self) {
        // Comparison
        self.register("eq", |a| bool_of(values_equal(get(a, 0), get(a, 1))));
        self.register("neq", |a| bool_of(!values_equal(get(a, 0), get(a, 1))));
        self.register("gt", |a| bool_of(compare(get(a, 0), get(a, 1)) == Some(std::cmp::Ordering::Greater)));
        self.register("gte", |a| {
            bool_of(matches!(
                compare(get(a, 0), get(a, 1)),
                Some(std::cmp::Ordering::Greater) | Some(std::cmp::Ordering::Equal)
            ))
        });
        self.register("lt", |a| bool_of(compare(get(a, 0), get(a, 1)) == Some(std::cmp::Ordering::Less)));
        self.register("lte", |a| {
            bool_of(matches!(
                compare(get(a, 0), get(a, 1)),
                Some(std::cmp::Ordering::Less) | Some(std::cmp::Ordering::Equal)
            ))
        });

        // Logical
        self.register("and", |a| bool_of(a.iter().all(is_truthy)));
        self.register("or", |a| bool_of(a.iter().any(is_truthy)));
        self.register("not", |a| bool_of(!get(a, 0).map(is_truthy).unwrap_or(false)));

        // Math
        self.register("add", |a| num_of(num(get(a, 0)) + num(get(a, 1))));
        self.register("subtract", |a| num_of(num(get(a, 0)) - num(get(a, 1))));
        self.register("multiply", |a| num_of(num(get(a, 0)) * num(get(a, 1))));
        self.register("divide", |a| {
            let divisor = num(get(a, 1));
            // Per spec: divide-by-zero yields 0, not an error or null.
            if divisor == 0.0 {
                num_of(0.0)
            } else {
                num_of(num(get(a, 0)) / divisor)
            }
        });
        self.register("mod", |a| {
            let divisor = num(get(a, 1));
            if divisor == 0.0 {
                num_of(0.0)
            } else {
                num_of(num(get(a, 0)) % divisor)
            }
        });
        self.register("round", |a| num_of(num(get(a, 0)).round()));
        self.register("floor", |a| num_of(num(get(a, 0)).floor()));
        self.register("ceil", |a| num_of(num(get(a, 0)).ceil()));
        self.register("abs", |a| num_of(num(get(a, 0)).abs()));
        self.register("min", |a| num_of(a.iter().filter_map(Value::as_f64).fold(f64::INFINITY, f64::min)));
        self.register("max", |a| num_of(a.iter().filter_map(Value::as_f64).fold(f64::NEG_INFINITY, f64::max)));

        // String
        self.register("concat", |a| {
            Value::String(a.iter().map(crate::engine::transforms::value_to_plain_string).collect())
        });
        self.register("uppercase", |a| str_of(get(a, 0), str::to_uppercase));
        self.register("lowercase", |a| str_of(get(a, 0), str::to_lowercase));
        self.register("capitalize", |a| {
            str_of(get(a, 0), |s| {
                let mut chars = s.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                    None => s.to_string(),
                }
            })
        });
        self.register("trim", |a| str_of(get(a, 0), |s| s.trim().to_string()));
        self.register("replace", |a| {
            match (get(a, 0), get(a, 1), get(a, 2)) {
                (Some(Value::String(s)), Some(Value::String(from)), Some(Value::String(to))) => {
                    Value::String(s.replacen(from.as_str(), to, 1))
                }
                _ => get(a, 0).cloned().unwrap_or(Value::Null),
            }
        });
        self.register("substring", |a| match get(a, 0) {
            Some(Value::String(s)) => {
                let chars: Vec<char> = s.chars().collect();
                let start = get(a, 1).and_then(Value::as_u64).unwrap_or(0) as usize;
                let end = get(a, 2).and_then(Value::as_u64).map(|e| e as usize).unwrap_or(chars.len());
                let start = start.min(chars.len());
                let end = end.clamp(start, chars.len());
                Value::String(chars[start..end].iter().collect())
            }
            other => other.cloned().unwrap_or(Value::Null),
        });
        self.register("contains", |a| {
            bool_of(match (get(a, 0), get(a, 1)) {
                (Some(Value::String(s)), Some(Value::String(needle))) => s.contains(needle.as_str()),
                (Some(Value::Array(arr)), Some(needle)) => arr.contains(needle),
                _ => false,
            })
        });
        self.register("startsWith", |a| {
            bool_of(matches!((get(a, 0), get(a, 1)), (Some(Value::String(s)), Some(Value::String(p))) if s.starts_with(p.as_str())))
        });
        self.register("endsWith", |a| {
            bool_of(matches!((get(a, 0), get(a, 1)), (Some(Value::String(s)), Some(Value::String(p))) if s.ends_with(p.as_str())))
        });
        self.register("split", |a| match (get(a, 0), get(a, 1)) {
            (Some(Value::String(s)), Some(Value::String(sep))) => {
                Value::Array(s.split(sep.as_str()).map(|p| Value::String(p.to_string())).collect())
            }
            _ => Value::Array(vec![]),
        });
        self.register("join", |a| match get(a, 0) {
            Some(Value::Array(arr)) => {
                let sep = get(a, 1).map(crate::engine::transforms::value_to_plain_string).unwrap_or_else(|| ",".to_string());
                Value::String(
                    arr.iter()
                        .map(crate::engine::transforms::value_to_plain_string)
                        .collect::<Vec<_>>()
                        .join(&sep),
                )
            }
            other => other.cloned().unwrap_or(Value::Null),
        });

        // Array
        self.register("length", |a| match get(a, 0) {
            Some(Value::Array(arr)) => num_of(arr.len() as f64),
            Some(Value::String(s)) => num_of(s.chars().count() as f64),
            Some(Value::Object(o)) => num_of(o.len() as f64),
            _ => num_of(0.0),
        });
        self.register("first", |a| match get(a, 0) {
            Some(Value::Array(arr)) => arr.first().cloned().unwrap_or(Value::Null),
            _ => Value::Null,
        });
        self.register("last", |a| match get(a, 0) {
            Some(Value::Array(arr)) => arr.last().cloned().unwrap_or(Value::Null),
            _ => Value::Null,
        });
        self.register("reverse", |a| match get(a, 0) {
            Some(Value::Array(arr)) => {
                let mut cloned = arr.clone();
                cloned.reverse();
                Value::Array(cloned)
            }
            other => other.cloned().unwrap_or(Value::Null),
        });
        self.register("sort", |a| match get(a, 0) {
            Some(Value::Array(arr)) => {
                let mut cloned = arr.clone();
                cloned.sort_by(|x, y| {
                    crate::engine::transforms::value_to_plain_string(x)
                        .partial_cmp(&crate::engine::transforms::value_to_plain_string(y))
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                Value::Array(cloned)
            }
            other => other.cloned().unwrap_or(Value::Null),
        });
        self.register("unique", |a| match get(a, 0) {
            Some(Value::Array(arr)) => {
                let mut seen = Vec::new();
                for item in arr {
                    if !seen.contains(item) {
                        seen.push(item.clone());
                    }
                }
                Value::Array(seen)
            }
            other => other.cloned().unwrap_or(Value::Null),
        });
        self.register("isEmpty", |a| {
            bool_of(match get(a, 0) {
                Some(Value::Array(arr)) => arr.is_empty(),
                Some(Value::String(s)) => s.is_empty(),
                Some(Value::Object(o)) => o.is_empty(),
                Some(Value::Null) | None => true,
                _ => false,
            })
        });

        // Type tests
        self.register("isString", |a| bool_of(matches!(get(a, 0), Some(Value::String(_)))));
        self.register("isNumber", |a| bool_of(matches!(get(a, 0), Some(Value::Number(_)))));
        self.register("isArray", |a| bool_of(matches!(get(a, 0), Some(Value::Array(_)))));
        self.register("isObject", |a| bool_of(matches!(get(a, 0), Some(Value::Object(_)))));
        self.register("isBoolean", |a| bool_of(matches!(get(a, 0), Some(Value::Bool(_)))));
        self.register("isNull", |a| bool_of(matches!(get(a, 0), Some(Value::Null))));
        self.register("isUndefined", |a| bool_of(get(a, 0).is_none()));
        self.register("isDefined", |a| bool_of(get(a, 0).is_some() && !matches!(get(a, 0), Some(Value::Null))));

        // Utility
        self.register("default", |a| match get(a, 0) {
            Some(v) if is_truthy(v) => v.clone(),
            _ => get(a, 1).cloned().unwrap_or(Value::Null),
        });
        self.register("json", |a| {
            Value::String(get(a, 0).and_then(|v| serde_json::to_string(v).ok()).unwrap_or_default())
        });
        self.register("now", |_| Value::String(chrono::Utc::now().to_rfc3339()));
        self.register("date", |a| match get(a, 0) {
            Some(Value::String(s)) => Value::String(s.clone()),
            _ => Value::String(chrono::Utc::now().to_rfc3339()),
        });
    }
}

impl Default for HelperRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn get(args: &[Value], idx: usize) -> Option<&Value> {
    args.get(idx)
}

fn bool_of(b: bool) -> Value {
    Value::Bool(b)
}

fn num_of(n: f64) -> Value {
    serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}

fn num(v: Option<&Value>) -> f64 {
    v.and_then(Value::as_f64).unwrap_or(0.0)
}

/// Apply a string transform to a string argument, passing non-strings
/// through unchanged.
fn str_of(v: Option<&Value>, f: impl FnOnce(&str) -> String) -> Value {
    match v {
        Some(Value::String(s)) => Value::String(f(s)),
        Some(other) => other.clone(),
        None => Value::Null,
    }
}

fn values_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        (None, None) => true,
        _ => false,
    }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Some(a), Some(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => match (a.as_str(), b.as_str()) {
                (Some(x), Some(y)) => Some(x.cmp(y)),
                _ => None,
            },
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn eq_and_neq_compare_by_value() {
        let registry = HelperRegistry::new();
        assert_eq!(registry.call("eq", &[json!(1), json!(1)]), Some(json!(true)));
        assert_eq!(registry.call("neq", &[json!(1), json!(2)]), Some(json!(true)));
    }

    #[test]
    fn comparisons_use_numeric_ordering() {
        let registry = HelperRegistry::new();
        assert_eq!(registry.call("gt", &[json!(3), json!(2)]), Some(json!(true)));
        assert_eq!(registry.call("lte", &[json!(2), json!(2)]), Some(json!(true)));
    }

    #[test]
    fn and_or_not_follow_js_truthiness() {
        let registry = HelperRegistry::new();
        assert_eq!(registry.call("and", &[json!(1), json!("x")]), Some(json!(true)));
        assert_eq!(registry.call("or", &[json!(0), json!("")]), Some(json!(false)));
        assert_eq!(registry.call("not", &[json!(0)]), Some(json!(true)));
    }

    #[test]
    fn divide_by_zero_returns_zero() {
        let registry = HelperRegistry::new();
        assert_eq!(registry.call("divide", &[json!(4), json!(0)]), Some(json!(0.0)));
    }

    #[test]
    fn math_helpers_cover_min_max_round() {
        let registry = HelperRegistry::new();
        assert_eq!(registry.call("min", &[json!(3), json!(1), json!(2)]), Some(json!(1.0)));
        assert_eq!(registry.call("max", &[json!(3), json!(1), json!(2)]), Some(json!(3.0)));
        assert_eq!(registry.call("round", &[json!(2.6)]), Some(json!(3.0)));
    }

    #[test]
    fn string_helpers_transform_values() {
        let registry = HelperRegistry::new();
        assert_eq!(registry.call("uppercase", &[json!("ada")]), Some(json!("ADA")));
        assert_eq!(registry.call("substring", &[json!("hello"), json!(1), json!(3)]), Some(json!("el")));
        assert_eq!(
            registry.call("split", &[json!("a,b,c"), json!(",")]),
            Some(json!(["a", "b", "c"]))
        );
    }

    #[test]
    fn array_helpers_cover_first_last_unique() {
        let registry = HelperRegistry::new();
        assert_eq!(registry.call("first", &[json!([1, 2, 3])]), Some(json!(1)));
        assert_eq!(registry.call("last", &[json!([1, 2, 3])]), Some(json!(3)));
        assert_eq!(registry.call("unique", &[json!([1, 1, 2])]), Some(json!([1, 2])));
    }

    #[test]
    fn is_defined_distinguishes_missing_from_null() {
        let registry = HelperRegistry::new();
        assert_eq!(registry.call("isDefined", &[json!(null)]), Some(json!(false)));
        assert_eq!(registry.call("isUndefined", &[]), Some(json!(true)));
        assert_eq!(registry.call("isDefined", &[json!("x")]), Some(json!(true)));
    }

    #[test]
    fn contains_handles_strings_and_arrays() {
        let registry = HelperRegistry::new();
        assert_eq!(registry.call("contains", &[json!("hello world"), json!("world")]), Some(json!(true)));
        assert_eq!(registry.call("contains", &[json!([1, 2, 3]), json!(2)]), Some(json!(true)));
    }

    #[test]
    fn unknown_helper_returns_none() {
        let registry = HelperRegistry::new();
        assert_eq!(registry.call("nope", &[]), None);
    }
}
