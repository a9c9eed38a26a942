// ABOUTME: Public template engine facade: render, validate, partials, and transform registration
mod ast;
mod helpers;
mod partials;
mod render;
pub mod transforms;

pub use helpers::HelperRegistry;
pub use partials::PartialRegistry;
pub use transforms::{Arg, TransformRegistry};

use promptforge_types::{resolve_path, TemplateError, ValidationError, VariableConfig, VariableType};
use render::Renderer;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Result of `TemplateEngine::validate_context`: whether every variable a
/// template reads from its context resolves to something, and if not, which
/// ones don't.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextValidation {
    pub valid: bool,
    pub missing: Vec<String>,
}

/// Owns the helper, transform, and partial registries and exposes the
/// service's whole template surface: rendering, variable extraction,
/// context validation against a template's declared schema, and partial
/// registration/loading.
pub struct TemplateEngine {
    transforms: TransformRegistry,
    helpers: HelperRegistry,
    partials: PartialRegistry,
}

impl TemplateEngine {
    pub fn new() -> Self {
        Self {
            transforms: TransformRegistry::new(),
            helpers: HelperRegistry::new(),
            partials: PartialRegistry::new(),
        }
    }

    /// Parse and render `template` against `context` in one pass. Templates
    /// are not cached here: the optimization pipeline's preprocessing stage
    /// is expected to call this once per job, and the cache module fronts
    /// repeat renders of identical (template, context) pairs.
    pub fn render(&self, template: &str, context: &Value) -> Result<String, TemplateError> {
        let nodes = ast::parse(template)?;
        let renderer = Renderer {
            transforms: &self.transforms,
            helpers: &self.helpers,
            partials: &self.partials,
        };
        renderer.render(&nodes, context.clone())
    }

    pub fn render_file(&self, path: impl AsRef<Path>, context: &Value) -> Result<String, TemplateError> {
        let template = std::fs::read_to_string(path)?;
        self.render(&template, context)
    }

    /// Every distinct path a template reads from its context, sorted and
    /// deduplicated, used to drive context validation and UI form generation.
    pub fn extract_variables(&self, template: &str) -> Result<Vec<String>, TemplateError> {
        let nodes = ast::parse(template)?;
        let mut out = Vec::new();
        Renderer::extract_variables(&nodes, &self.helpers, &mut out);
        Ok(out)
    }

    /// Check a context against the paths a template actually reads:
    /// `missing` is the subset of `extract_variables` whose resolution is
    /// undefined (a path present with a `null` value counts as resolved).
    pub fn validate_context(&self, template: &str, context: &Value) -> Result<ContextValidation, TemplateError> {
        let required = self.extract_variables(template)?;
        let missing: Vec<String> = required.into_iter().filter(|path| resolve_path(context, path).is_none()).collect();
        Ok(ContextValidation {
            valid: missing.is_empty(),
            missing,
        })
    }

    /// Check a context against a template's declared variable schema:
    /// required variables must be present, and present values must match
    /// their declared type and constraints.
    pub fn validate_variable_schema(
        &self,
        variables: &HashMap<String, VariableConfig>,
        context: &Value,
    ) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        for (name, var) in variables {
            let value = context.get(name);
            match value {
                None | Some(Value::Null) => {
                    if var.required && var.default.is_none() {
                        errors.push(ValidationError::MissingVariable(name.clone()));
                    }
                    continue;
                }
                Some(value) => {
                    if let Some(err) = check_type(name, var, value) {
                        errors.push(err);
                    }
                    if let Some(err) = check_constraints(name, var, value) {
                        errors.push(err);
                    }
                }
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn register_partial(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.partials.register(name, content);
    }

    pub fn register_partial_from_file(
        &mut self,
        name: impl Into<String>,
        path: impl AsRef<Path>,
    ) -> Result<(), TemplateError> {
        self.partials.register_from_file(name, path)
    }

    pub fn set_partials_directory(&mut self, dir: impl Into<std::path::PathBuf>) {
        self.partials.set_directory(dir);
    }

    pub fn load_partials(&mut self) -> Result<usize, TemplateError> {
        self.partials.load_directory()
    }

    pub fn register_transform(&mut self, name: &'static str, f: fn(&Value, &[Arg]) -> Value) {
        self.transforms.register(name, f);
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn check_type(name: &str, var: &VariableConfig, value: &Value) -> Option<ValidationError> {
    let matches = match var.var_type {
        VariableType::String | VariableType::Choice => value.is_string(),
        VariableType::Number => value.is_number(),
        VariableType::Boolean => value.is_boolean(),
        VariableType::Array => value.is_array(),
        VariableType::Object => value.is_object(),
    };
    if matches {
        None
    } else {
        Some(ValidationError::TypeMismatch {
            name: name.to_string(),
            expected: format!("{:?}", var.var_type),
            actual: type_name(value).to_string(),
        })
    }
}

fn check_constraints(name: &str, var: &VariableConfig, value: &Value) -> Option<ValidationError> {
    let constraints = &var.constraints;
    if let (Some(pattern), Some(text)) = (&constraints.pattern, value.as_str()) {
        if let Ok(re) = regex::Regex::new(pattern) {
            if !re.is_match(text) {
                return Some(ValidationError::PatternMismatch {
                    name: name.to_string(),
                    pattern: pattern.clone(),
                });
            }
        }
    }
    if let Some(n) = value.as_f64() {
        if let Some(min) = constraints.min {
            if n < min {
                return Some(ValidationError::OutOfRange { name: name.to_string() });
            }
        }
        if let Some(max) = constraints.max {
            if n > max {
                return Some(ValidationError::OutOfRange { name: name.to_string() });
            }
        }
    }
    if let Some(choices) = &constraints.choices {
        if let Some(text) = value.as_str() {
            if !choices.iter().any(|c| c == text) {
                return Some(ValidationError::EnumMiss { name: name.to_string() });
            }
        }
    }
    None
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
