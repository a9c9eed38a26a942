// ABOUTME: Layered, schema-validated configuration store for the optimization service
use promptforge_types::{ForgeError, TargetModel};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use validator::Validate;

/// Cache subtree of the configuration surface (`optimizer.cache.*`).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub max_size: usize,
    pub distributed: DistributedCacheSettings,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 3600,
            max_size: 10_000,
            distributed: DistributedCacheSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct DistributedCacheSettings {
    pub enabled: bool,
    pub url: Option<String>,
    pub namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct RateLimitSettings {
    pub max_requests: u32,
    pub window_ms: u64,
    pub skip_cached: bool,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_ms: 60_000,
            skip_cached: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsBackend {
    Memory,
    File,
    Remote,
}

impl Default for AnalyticsBackend {
    fn default() -> Self {
        AnalyticsBackend::Memory
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyticsSettings {
    pub enabled: bool,
    pub track_usage: bool,
    pub report_interval_secs: u64,
    pub backend: AnalyticsBackend,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            track_usage: false,
            report_interval_secs: 300,
            backend: AnalyticsBackend::default(),
        }
    }
}

/// The full dotted-key configuration surface described in spec §6. The
/// original keys lived under a `promptwizard.` namespace; this
/// implementation renames that subtree to `optimizer.` (it configures the
/// `optimizer` module specifically) while the environment-variable prefix
/// is `PROMPTFORGE_`, matching the workspace's own name (see DESIGN.md).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct OptimizerSettings {
    pub enabled: bool,
    pub service_url: String,
    #[validate(range(min = 30_000, max = 600_000))]
    pub timeout_ms: u64,
    #[validate(range(min = 0, max = 10))]
    pub retries: u32,
    pub verify_ssl: bool,
    pub api_key: Option<String>,
    pub default_model: TargetModel,
    #[validate(range(min = 1, max = 10))]
    pub mutate_refine_iterations: u8,
    #[validate(range(min = 0, max = 20))]
    pub few_shot_count: u8,
    pub generate_reasoning: bool,
    #[validate(range(min = 1000))]
    pub max_prompt_length: usize,
    #[validate(range(min = 0.0, max = 1.0))]
    pub min_confidence: f64,
    pub auto_optimize: bool,
    #[validate(nested)]
    pub cache: CacheSettings,
    #[validate(nested)]
    pub rate_limiting: RateLimitSettings,
    #[validate(nested)]
    pub analytics: AnalyticsSettings,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            service_url: String::new(),
            timeout_ms: 120_000,
            retries: 3,
            verify_ssl: true,
            api_key: None,
            default_model: TargetModel::default(),
            mutate_refine_iterations: 3,
            few_shot_count: 5,
            generate_reasoning: true,
            max_prompt_length: 10_000,
            min_confidence: 0.7,
            auto_optimize: false,
            cache: CacheSettings::default(),
            rate_limiting: RateLimitSettings::default(),
            analytics: AnalyticsSettings::default(),
        }
    }
}

/// Layers configuration sources in increasing priority — built-in defaults,
/// a user-global file, a project-local file, `PROMPTFORGE_`-prefixed
/// environment variables, and runtime overrides — deep-merging each on top
/// of the last, then deserializes and validates the result.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    merged: Value,
}

const ENV_PREFIX: &str = "PROMPTFORGE_";

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            merged: serde_json::to_value(OptimizerSettings::default()).expect("defaults always serialize"),
        }
    }

    /// Layer a YAML or JSON file's contents on top of the current merge.
    /// Missing files are not an error: both the user-global and
    /// project-local layers are optional.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Result<Self, ForgeError> {
        let path = path.as_ref();
        let Ok(contents) = std::fs::read_to_string(path) else {
            return Ok(self);
        };
        let parsed: Value = if path.extension().and_then(|e| e.to_str()) == Some("json") {
            serde_json::from_str(&contents)?
        } else {
            serde_yaml::from_str(&contents)
                .map_err(|e| ForgeError::Configuration(format!("invalid config file {}: {e}", path.display())))?
        };
        deep_merge(&mut self.merged, parsed);
        Ok(self)
    }

    /// Layer environment variables whose name starts with `PROMPTFORGE_`.
    /// Each underscore-separated segment after the prefix becomes a
    /// lowercased dotted key, e.g. `PROMPTFORGE_CACHE_MAX_SIZE` becomes
    /// `cache.maxSize` is not attempted (no case recovery): segments map
    /// straight onto the already-camelCase JSON keys by matching
    /// case-insensitively against the existing object.
    pub fn with_env(mut self) -> Self {
        for (key, value) in std::env::vars() {
            let Some(rest) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let path: Vec<String> = rest.split('_').map(|s| s.to_lowercase()).collect();
            set_env_path(&mut self.merged, &path, &value);
        }
        self
    }

    /// Layer explicit runtime overrides, e.g. CLI flags, highest priority.
    pub fn with_overrides(mut self, overrides: Value) -> Self {
        deep_merge(&mut self.merged, overrides);
        self
    }

    pub fn build(self) -> Result<OptimizerSettings, ForgeError> {
        let settings: OptimizerSettings = serde_json::from_value(self.merged)?;
        settings
            .validate()
            .map_err(|e| ForgeError::Configuration(e.to_string()))?;
        if settings.enabled {
            url::Url::parse(&settings.service_url).map_err(|e| {
                ForgeError::Configuration(format!("optimizer.serviceUrl '{}' is not a valid URL: {e}", settings.service_url))
            })?;
        }
        Ok(settings)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                deep_merge(base_map.entry(key).or_insert(Value::Null), value);
            }
        }
        (base_slot, overlay_value) => *base_slot = overlay_value,
    }
}

/// Walk `path` through `root`'s object keys case-insensitively, parsing
/// `raw` as a bool/integer/float literal when it matches one, else storing
/// it as a string. Unknown paths are inserted verbatim so forward-declared
/// keys still round-trip.
fn set_env_path(root: &mut Value, path: &[String], raw: &str) {
    let Some((head, tail)) = path.split_first() else {
        return;
    };
    let Value::Object(map) = root else {
        return;
    };
    let existing_key = map.keys().find(|k| k.eq_ignore_ascii_case(head)).cloned();
    let key = existing_key.unwrap_or_else(|| head.clone());

    if tail.is_empty() {
        map.insert(key, parse_env_value(raw));
    } else {
        let slot = map.entry(key).or_insert_with(|| Value::Object(Default::default()));
        if !slot.is_object() {
            *slot = Value::Object(Default::default());
        }
        set_env_path(slot, tail, raw);
    }
}

fn parse_env_value(raw: &str) -> Value {
    if let Ok(b) = raw.parse::<bool>() {
        Value::Bool(b)
    } else if let Ok(i) = raw.parse::<i64>() {
        Value::from(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        Value::from(f)
    } else {
        Value::String(raw.to_string())
    }
}
