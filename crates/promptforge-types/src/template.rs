// ABOUTME: Template data model — variables, files, commands, metadata
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The declared type of a template variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    String,
    Number,
    Boolean,
    Array,
    Object,
    Choice,
}

/// Validation constraints for a single variable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableConstraints {
    pub pattern: Option<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub choices: Option<Vec<String>>,
}

/// Declared configuration for a single template variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableConfig {
    pub var_type: VariableType,
    pub default: Option<serde_json::Value>,
    pub required: bool,
    pub constraints: VariableConstraints,
}

impl VariableConfig {
    pub fn new(var_type: VariableType) -> Self {
        Self {
            var_type,
            default: None,
            required: false,
            constraints: VariableConstraints::default(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// A file the template produces when scaffolding a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateFile {
    pub source_path: String,
    pub destination_path: String,
    pub content: String,
    pub transform: bool,
    pub condition: Option<String>,
}

/// A shell command the template wants executed after file generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateCommand {
    pub command: String,
    pub args: Vec<String>,
    pub condition: Option<String>,
}

/// Free-form descriptive metadata about a template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateMetadata {
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Arbitrary extra key/value annotations (e.g. `original_id`, `optimized_from`).
    pub extra: HashMap<String, String>,
}

/// A named, versioned template artifact. Immutable once loaded; rendering
/// produces a new `Template` value with substituted content, it never
/// mutates `self`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub version: String,
    pub content: String,
    pub variables: HashMap<String, VariableConfig>,
    pub files: Vec<TemplateFile>,
    pub commands: Vec<TemplateCommand>,
    pub metadata: TemplateMetadata,
}

impl Template {
    pub fn new(name: impl Into<String>, version: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            content: content.into(),
            variables: HashMap::new(),
            files: Vec::new(),
            commands: Vec::new(),
            metadata: TemplateMetadata::default(),
        }
    }

    /// Identity is `(name, version)`.
    pub fn id(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }

    /// Return a copy of this template with `content` replaced by `rendered`.
    /// Used by the renderer, which never mutates the original `Template`.
    pub fn with_rendered_content(&self, rendered: impl Into<String>) -> Self {
        let mut cloned = self.clone();
        cloned.content = rendered.into();
        cloned
    }
}
