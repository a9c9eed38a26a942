// ABOUTME: Named pure value transforms used in `{{ path | t1 | t2:arg }}` pipe chains
use serde_json::{Number, Value};
use std::collections::HashMap;
use tracing::warn;

/// A parsed transform-chain argument literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Bool(bool),
    Null,
    Int(i64),
    Float(f64),
    Str(String),
}

impl Arg {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed {
            "true" => Arg::Bool(true),
            "false" => Arg::Bool(false),
            "null" | "undefined" => Arg::Null,
            _ => {
                if let Ok(i) = trimmed.parse::<i64>() {
                    Arg::Int(i)
                } else if let Ok(f) = trimmed.parse::<f64>() {
                    Arg::Float(f)
                } else {
                    Arg::Str(trimmed.to_string())
                }
            }
        }
    }

    pub fn as_str(&self) -> String {
        match self {
            Arg::Bool(b) => b.to_string(),
            Arg::Null => String::new(),
            Arg::Int(i) => i.to_string(),
            Arg::Float(f) => f.to_string(),
            Arg::Str(s) => s.clone(),
        }
    }

    pub fn as_usize(&self, default: usize) -> usize {
        match self {
            Arg::Int(i) if *i >= 0 => *i as usize,
            Arg::Float(f) if *f >= 0.0 => *f as usize,
            _ => default,
        }
    }

    pub fn as_i64(&self, default: i64) -> i64 {
        match self {
            Arg::Int(i) => *i,
            Arg::Float(f) => *f as i64,
            _ => default,
        }
    }
}

type TransformFn = fn(&Value, &[Arg]) -> Value;

/// Registry mapping transform names to pure `(value, args…) -> value`
/// functions, populated once at startup and read-only thereafter.
pub struct TransformRegistry {
    transforms: HashMap<&'static str, TransformFn>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            transforms: HashMap::new(),
        };
        registry.register_builtins();
        registry
    }

    pub fn register(&mut self, name: &'static str, f: TransformFn) {
        self.transforms.insert(name, f);
    }

    /// Apply a pipe chain (`t1 | t2:arg,arg`) left to right. Unknown
    /// transforms log a warning and pass the input through unchanged.
    pub fn apply_chain(&self, value: Value, chain: &str) -> Value {
        let mut current = value;
        for segment in chain.split('|') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            let (name, args_raw) = match segment.split_once(':') {
                Some((n, a)) => (n.trim(), Some(a)),
                None => (segment, None),
            };
            let args: Vec<Arg> = args_raw
                .map(|a| a.split(',').map(Arg::parse).collect())
                .unwrap_or_default();
            current = self.apply(name, &current, &args);
        }
        current
    }

    pub fn apply(&self, name: &str, value: &Value, args: &[Arg]) -> Value {
        match self.transforms.get(name) {
            Some(f) => f(value, args),
            None => {
                warn!("unknown transform '{name}', leaving value unchanged");
                value.clone()
            }
        }
    }

    fn register_builtins(&mut self) {
        // String
        self.register("upper", |v, _| str_map(v, |s| s.to_uppercase()));
        self.register("lower", |v, _| str_map(v, |s| s.to_lowercase()));
        self.register("capitalize", |v, _| str_map(v, capitalize));
        self.register("title", |v, _| {
            str_map(v, |s| s.split(' ').map(capitalize).collect::<Vec<_>>().join(" "))
        });
        self.register("trim", |v, _| str_map(v, |s| s.trim().to_string()));
        self.register("truncate", |v, args| {
            str_map(v, |s| {
                let n = args.first().map(|a| a.as_usize(30)).unwrap_or(30);
                let suffix = args.get(1).map(|a| a.as_str()).unwrap_or_else(|| "…".to_string());
                if s.chars().count() > n {
                    let truncated: String = s.chars().take(n).collect();
                    format!("{truncated}{suffix}")
                } else {
                    s
                }
            })
        });
        self.register("padStart", |v, args| {
            str_map(v, |s| {
                let n = args.first().map(|a| a.as_usize(0)).unwrap_or(0);
                let ch = args.get(1).map(|a| a.as_str()).unwrap_or_else(|| " ".to_string());
                let ch = ch.chars().next().unwrap_or(' ');
                pad(&s, n, ch, true)
            })
        });
        self.register("padEnd", |v, args| {
            str_map(v, |s| {
                let n = args.first().map(|a| a.as_usize(0)).unwrap_or(0);
                let ch = args.get(1).map(|a| a.as_str()).unwrap_or_else(|| " ".to_string());
                let ch = ch.chars().next().unwrap_or(' ');
                pad(&s, n, ch, false)
            })
        });
        self.register("replace", |v, args| {
            str_map(v, |s| {
                let search = args.first().map(|a| a.as_str()).unwrap_or_default();
                let repl = args.get(1).map(|a| a.as_str()).unwrap_or_default();
                s.replacen(&search, &repl, 1)
            })
        });
        self.register("replaceAll", |v, args| {
            str_map(v, |s| {
                let search = args.first().map(|a| a.as_str()).unwrap_or_default();
                let repl = args.get(1).map(|a| a.as_str()).unwrap_or_default();
                s.replace(&search, &repl)
            })
        });
        self.register("slug", |v, _| {
            str_map(v, |s| {
                s.to_lowercase()
                    .chars()
                    .map(|c| if c.is_alphanumeric() { c } else { '-' })
                    .collect::<String>()
                    .split('-')
                    .filter(|part| !part.is_empty())
                    .collect::<Vec<_>>()
                    .join("-")
            })
        });
        self.register("camelCase", |v, _| str_map(v, |s| to_camel_case(&s)));
        self.register("snakeCase", |v, _| str_map(v, |s| to_word_case(&s, '_')));
        self.register("kebabCase", |v, _| str_map(v, |s| to_word_case(&s, '-')));

        // Number
        self.register("abs", |v, _| num_map(v, f64::abs));
        self.register("ceil", |v, _| num_map(v, f64::ceil));
        self.register("floor", |v, _| num_map(v, f64::floor));
        self.register("round", |v, args| {
            num_map(v, |n| {
                let prec = args.first().map(|a| a.as_i64(0)).unwrap_or(0).max(0) as i32;
                let factor = 10f64.powi(prec);
                (n * factor).round() / factor
            })
        });
        self.register("toFixed", |v, args| {
            let d = args.first().map(|a| a.as_usize(2)).unwrap_or(2);
            str_of(v, |n| format!("{n:.d$}", d = d))
        });
        self.register("toPrecision", |v, args| {
            let p = args.first().map(|a| a.as_usize(2)).unwrap_or(2);
            str_of(v, |n| format!("{n:.p$e}", p = p.saturating_sub(1)))
        });
        self.register("toExponential", |v, args| {
            let d = args.first().map(|a| a.as_usize(6));
            str_of(v, |n| match d {
                Some(d) => format!("{n:.d$e}"),
                None => format!("{n:e}"),
            })
        });
        self.register("parseInt", |v, args| {
            let radix = args.first().map(|a| a.as_i64(10)).unwrap_or(10) as u32;
            match v {
                Value::String(s) => i64::from_str_radix(s.trim(), radix)
                    .map(|n| Value::Number(n.into()))
                    .unwrap_or(Value::Null),
                other => other.clone(),
            }
        });
        self.register("parseFloat", |v, _| match v {
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            other => other.clone(),
        });

        // Array
        self.register("first", |v, args| {
            arr_map(v, |a| {
                let k = args.first().map(|x| x.as_usize(1)).unwrap_or(1);
                a.into_iter().take(k).collect()
            })
        });
        self.register("last", |v, args| {
            arr_map(v, |a| {
                let k = args.first().map(|x| x.as_usize(1)).unwrap_or(1);
                let len = a.len();
                a.into_iter().skip(len.saturating_sub(k)).collect()
            })
        });
        self.register("reverse", |v, _| {
            arr_map(v, |mut a| {
                a.reverse();
                a
            })
        });
        self.register("sort", |v, _| {
            arr_map(v, |mut a| {
                a.sort_by(|x, y| compare_values(x, y));
                a
            })
        });
        self.register("sortBy", |v, args| {
            let key = args.first().map(|a| a.as_str()).unwrap_or_default();
            arr_map(v, |mut a| {
                a.sort_by(|x, y| compare_values(x.get(&key).unwrap_or(&Value::Null), y.get(&key).unwrap_or(&Value::Null)));
                a
            })
        });
        self.register("unique", |v, _| {
            arr_map(v, |a| {
                let mut seen = Vec::new();
                for item in a {
                    if !seen.contains(&item) {
                        seen.push(item);
                    }
                }
                seen
            })
        });
        self.register("join", |v, args| {
            let sep = args.first().map(|a| a.as_str()).unwrap_or_else(|| ",".to_string());
            match v {
                Value::Array(a) => Value::String(
                    a.iter()
                        .map(value_to_plain_string)
                        .collect::<Vec<_>>()
                        .join(&sep),
                ),
                other => other.clone(),
            }
        });
        self.register("slice", |v, args| {
            arr_map(v, |a| {
                let start = args.first().map(|x| x.as_usize(0)).unwrap_or(0);
                let end = args.get(1).map(|x| x.as_usize(a.len())).unwrap_or(a.len());
                a.into_iter().skip(start).take(end.saturating_sub(start)).collect()
            })
        });
        self.register("take", |v, args| {
            arr_map(v, |a| {
                let n = args.first().map(|x| x.as_usize(0)).unwrap_or(0);
                a.into_iter().take(n).collect()
            })
        });
        self.register("skip", |v, args| {
            arr_map(v, |a| {
                let n = args.first().map(|x| x.as_usize(0)).unwrap_or(0);
                a.into_iter().skip(n).collect()
            })
        });
        self.register("filter", |v, args| {
            let key = args.first().map(|a| a.as_str()).unwrap_or_default();
            let expected = args.get(1).map(|a| a.as_str()).unwrap_or_default();
            arr_map(v, |a| {
                a.into_iter()
                    .filter(|item| value_to_plain_string(item.get(&key).unwrap_or(&Value::Null)) == expected)
                    .collect()
            })
        });
        self.register("map", |v, args| {
            let key = args.first().map(|a| a.as_str()).unwrap_or_default();
            arr_map(v, |a| {
                a.into_iter()
                    .map(|item| item.get(&key).cloned().unwrap_or(Value::Null))
                    .collect()
            })
        });

        // Date
        self.register("date", |v, args| {
            let format = args.first().map(|a| a.as_str()).unwrap_or_else(|| "iso".to_string());
            match value_to_datetime(v) {
                Some(dt) => Value::String(format_datetime(dt, &format)),
                None => v.clone(),
            }
        });
        self.register("timestamp", |v, _| match value_to_datetime(v) {
            Some(dt) => Value::Number(dt.timestamp_millis().into()),
            None => v.clone(),
        });
        self.register("fromNow", |v, _| match value_to_datetime(v) {
            Some(dt) => Value::String(human_relative(dt)),
            None => v.clone(),
        });

        // Format/utility
        self.register("yaml", |v, _| Value::String(to_simplified_yaml(v, 0)));
        self.register("csv", |v, _| Value::String(to_csv(v)));
        self.register("json", |v, args| {
            let indent = args.first().map(|a| a.as_usize(2)).unwrap_or(2);
            let text = if indent == 0 {
                serde_json::to_string(v).unwrap_or_default()
            } else {
                serde_json::to_string_pretty(v).unwrap_or_default()
            };
            Value::String(text)
        });
        self.register("urlEncode", |v, _| {
            str_map(v, |s| {
                s.bytes()
                    .map(|b| {
                        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
                            (b as char).to_string()
                        } else {
                            format!("%{b:02X}")
                        }
                    })
                    .collect()
            })
        });
        self.register("urlDecode", |v, _| {
            str_map(v, |s| {
                let bytes = s.as_bytes();
                let mut out = Vec::new();
                let mut i = 0;
                while i < bytes.len() {
                    if bytes[i] == b'%' && i + 2 < bytes.len() {
                        if let Ok(byte) = u8::from_str_radix(&s[i + 1..i + 3], 16) {
                            out.push(byte);
                            i += 3;
                            continue;
                        }
                    }
                    out.push(bytes[i]);
                    i += 1;
                }
                String::from_utf8_lossy(&out).into_owned()
            })
        });
        self.register("base64Encode", |v, _| {
            str_map(v, |s| base64_encode(s.as_bytes()))
        });
        self.register("base64Decode", |v, _| {
            str_map(v, |s| base64_decode(&s).unwrap_or_default())
        });
        self.register("escape", |v, _| {
            str_map(v, |s| {
                s.replace('&', "&amp;")
                    .replace('<', "&lt;")
                    .replace('>', "&gt;")
                    .replace('"', "&quot;")
                    .replace('\'', "&#39;")
            })
        });
        self.register("unescape", |v, _| {
            str_map(v, |s| {
                s.replace("&amp;", "&")
                    .replace("&lt;", "<")
                    .replace("&gt;", ">")
                    .replace("&quot;", "\"")
                    .replace("&#39;", "'")
            })
        });
        self.register("default", |v, args| {
            if matches!(v, Value::Null) {
                args.first().map(|a| Value::String(a.as_str())).unwrap_or(Value::Null)
            } else {
                v.clone()
            }
        });
        self.register("ternary", |v, args| {
            let truthy = promptforge_types::is_truthy(v);
            let t = args.first().map(|a| a.as_str()).unwrap_or_default();
            let f = args.get(1).map(|a| a.as_str()).unwrap_or_default();
            Value::String(if truthy { t } else { f })
        });
        self.register("typeof", |v, _| {
            Value::String(
                match v {
                    Value::Null => "null",
                    Value::Bool(_) => "boolean",
                    Value::Number(_) => "number",
                    Value::String(_) => "string",
                    Value::Array(_) => "array",
                    Value::Object(_) => "object",
                }
                .to_string(),
            )
        });
        self.register("length", |v, _| match v {
            Value::String(s) => Value::Number(s.chars().count().into()),
            Value::Array(a) => Value::Number(a.len().into()),
            Value::Object(o) => Value::Number(o.len().into()),
            _ => Value::Number(0.into()),
        });
        self.register("keys", |v, _| match v {
            Value::Object(o) => Value::Array(o.keys().map(|k| Value::String(k.clone())).collect()),
            _ => Value::Array(vec![]),
        });
        self.register("values", |v, _| match v {
            Value::Object(o) => Value::Array(o.values().cloned().collect()),
            _ => Value::Array(vec![]),
        });
        self.register("entries", |v, _| match v {
            Value::Object(o) => Value::Array(
                o.iter()
                    .map(|(k, val)| Value::Array(vec![Value::String(k.clone()), val.clone()]))
                    .collect(),
            ),
            _ => Value::Array(vec![]),
        });
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn capitalize(s: String) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => s,
    }
}

fn pad(s: &str, n: usize, ch: char, start: bool) -> String {
    let len = s.chars().count();
    if len >= n {
        return s.to_string();
    }
    let padding: String = std::iter::repeat(ch).take(n - len).collect();
    if start {
        format!("{padding}{s}")
    } else {
        format!("{s}{padding}")
    }
}

fn to_camel_case(s: &str) -> String {
    let words = split_words(s);
    words
        .iter()
        .enumerate()
        .map(|(i, w)| if i == 0 { w.to_lowercase() } else { capitalize(w.to_lowercase()) })
        .collect()
}

fn to_word_case(s: &str, sep: char) -> String {
    split_words(s)
        .iter()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(&sep.to_string())
}

fn split_words(s: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in s.chars() {
        if c == '_' || c == '-' || c == ' ' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        }
        prev_lower = c.is_lowercase();
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn str_map(v: &Value, f: impl FnOnce(String) -> String) -> Value {
    match v {
        Value::String(s) => Value::String(f(s.clone())),
        other => other.clone(),
    }
}

fn num_map(v: &Value, f: impl FnOnce(f64) -> f64) -> Value {
    match v.as_f64() {
        Some(n) => Number::from_f64(f(n)).map(Value::Number).unwrap_or(Value::Null),
        None => v.clone(),
    }
}

fn str_of(v: &Value, f: impl FnOnce(f64) -> String) -> Value {
    match v.as_f64() {
        Some(n) => Value::String(f(n)),
        None => v.clone(),
    }
}

fn arr_map(v: &Value, f: impl FnOnce(Vec<Value>) -> Vec<Value>) -> Value {
    match v {
        Value::Array(a) => Value::Array(f(a.clone())),
        other => other.clone(),
    }
}

pub fn value_to_plain_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn compare_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        _ => value_to_plain_string(a).cmp(&value_to_plain_string(b)),
    }
}

const BASE64_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn base64_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() + 2) / 3 * 4);
    for chunk in data.chunks(3) {
        let b0 = chunk[0];
        let b1 = *chunk.get(1).unwrap_or(&0);
        let b2 = *chunk.get(2).unwrap_or(&0);
        let n = ((b0 as u32) << 16) | ((b1 as u32) << 8) | b2 as u32;
        out.push(BASE64_ALPHABET[((n >> 18) & 0x3F) as usize] as char);
        out.push(BASE64_ALPHABET[((n >> 12) & 0x3F) as usize] as char);
        out.push(if chunk.len() > 1 {
            BASE64_ALPHABET[((n >> 6) & 0x3F) as usize] as char
        } else {
            '='
        });
        out.push(if chunk.len() > 2 {
            BASE64_ALPHABET[(n & 0x3F) as usize] as char
        } else {
            '='
        });
    }
    out
}

/// Interpret a value as a point in time: an RFC3339 string, or a number
/// treated as Unix milliseconds.
fn value_to_datetime(v: &Value) -> Option<chrono::DateTime<chrono::Utc>> {
    match v {
        Value::String(s) => chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&chrono::Utc)),
        Value::Number(n) => {
            let ms = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            chrono::DateTime::from_timestamp_millis(ms)
        }
        _ => None,
    }
}

fn format_datetime(dt: chrono::DateTime<chrono::Utc>, format: &str) -> String {
    use chrono::Datelike;
    match format {
        "iso" => dt.to_rfc3339(),
        "date" => dt.format("%Y-%m-%d").to_string(),
        "time" => dt.format("%H:%M:%S").to_string(),
        "locale" => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        "localeDate" => dt.format("%m/%d/%Y").to_string(),
        "localeTime" => dt.format("%I:%M %p").to_string(),
        "year" => dt.year().to_string(),
        "month" => dt.month().to_string(),
        "day" => dt.day().to_string(),
        "hour" => dt.format("%H").to_string(),
        "minute" => dt.format("%M").to_string(),
        "second" => dt.format("%S").to_string(),
        _ => dt.to_rfc3339(),
    }
}

/// Human-relative, coarse approximation: "just now", "N minutes ago", etc.
fn human_relative(dt: chrono::DateTime<chrono::Utc>) -> String {
    let delta = chrono::Utc::now().signed_duration_since(dt);
    let secs = delta.num_seconds();
    let (secs, suffix) = if secs < 0 { (-secs, "from now") } else { (secs, "ago") };
    if secs < 60 {
        "just now".to_string()
    } else if secs < 3600 {
        format!("{} minutes {suffix}", secs / 60)
    } else if secs < 86_400 {
        format!("{} hours {suffix}", secs / 3600)
    } else {
        format!("{} days {suffix}", secs / 86_400)
    }
}

/// A deliberately simplified YAML renderer: enough for scalars, flat
/// arrays, and one level of nested objects, not a full YAML emitter.
fn to_simplified_yaml(v: &Value, indent: usize) -> String {
    let pad = "  ".repeat(indent);
    match v {
        Value::Object(map) => map
            .iter()
            .map(|(k, val)| match val {
                Value::Object(_) | Value::Array(_) => {
                    format!("{pad}{k}:\n{}", to_simplified_yaml(val, indent + 1))
                }
                _ => format!("{pad}{k}: {}", scalar_to_yaml(val)),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Array(items) => items
            .iter()
            .map(|item| format!("{pad}- {}", scalar_to_yaml(item)))
            .collect::<Vec<_>>()
            .join("\n"),
        other => scalar_to_yaml(other),
    }
}

fn scalar_to_yaml(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Render an array of flat objects (or a single object) as CSV: header row
/// from the first row's keys, in encounter order.
fn to_csv(v: &Value) -> String {
    let rows: Vec<&serde_json::Map<String, Value>> = match v {
        Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
        Value::Object(map) => vec![map],
        _ => return value_to_plain_string(v),
    };
    let Some(first) = rows.first() else {
        return String::new();
    };
    let headers: Vec<String> = first.keys().cloned().collect();
    let mut out = headers.join(",");
    for row in &rows {
        out.push('\n');
        let cells: Vec<String> = headers
            .iter()
            .map(|h| csv_escape(row.get(h).map(value_to_plain_string).unwrap_or_default()))
            .collect();
        out.push_str(&cells.join(","));
    }
    out
}

fn csv_escape(s: String) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s
    }
}

fn base64_decode(s: &str) -> Option<String> {
    let mut buffer = Vec::new();
    let mut bits: u32 = 0;
    let mut bit_count = 0;
    for c in s.chars() {
        if c == '=' {
            break;
        }
        let value = BASE64_ALPHABET.iter().position(|&b| b as char == c)? as u32;
        bits = (bits << 6) | value;
        bit_count += 6;
        if bit_count >= 8 {
            bit_count -= 8;
            buffer.push((bits >> bit_count) as u8);
        }
    }
    Some(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn applies_chain_left_to_right_with_args() {
        let registry = TransformRegistry::new();
        let result = registry.apply_chain(json!("  hello world  "), "trim | upper");
        assert_eq!(result, json!("HELLO WORLD"));
    }

    #[test]
    fn truncate_appends_suffix() {
        let registry = TransformRegistry::new();
        let result = registry.apply_chain(json!("hello world"), "truncate:5");
        assert_eq!(result, json!("hello…"));
    }

    #[test]
    fn unknown_transform_passes_value_through() {
        let registry = TransformRegistry::new();
        let result = registry.apply_chain(json!("x"), "does_not_exist");
        assert_eq!(result, json!("x"));
    }

    #[test]
    fn join_formats_array_values() {
        let registry = TransformRegistry::new();
        let result = registry.apply_chain(json!([1, 2, 3]), "join:-");
        assert_eq!(result, json!("1-2-3"));
    }

    #[test]
    fn base64_round_trips() {
        let registry = TransformRegistry::new();
        let encoded = registry.apply_chain(json!("hello"), "base64Encode");
        let decoded = registry.apply_chain(encoded, "base64Decode");
        assert_eq!(decoded, json!("hello"));
    }

    #[test]
    fn date_formats_an_iso_timestamp() {
        let registry = TransformRegistry::new();
        let result = registry.apply_chain(json!("2024-03-05T12:30:00Z"), "date:year");
        assert_eq!(result, json!("2024"));
    }

    #[test]
    fn csv_renders_header_and_rows() {
        let registry = TransformRegistry::new();
        let result = registry.apply_chain(json!([{"a": 1, "b": "x"}, {"a": 2, "b": "y"}]), "csv");
        assert_eq!(result, json!("a,b\n1,x\n2,y"));
    }
}
