// ABOUTME: Walks a parsed node tree against a render context, applying helpers and transforms
use crate::engine::ast::{self, Node, MAX_EXPANSION_DEPTH};
use crate::engine::helpers::HelperRegistry;
use crate::engine::partials::PartialRegistry;
use crate::engine::transforms::{value_to_plain_string, TransformRegistry};
use promptforge_types::{is_truthy, resolve_path, TemplateError};
use serde_json::Value;

struct Frame {
    value: Value,
    index: Option<usize>,
    len: Option<usize>,
    key: Option<String>,
}

struct Scope {
    stack: Vec<Frame>,
}

impl Scope {
    fn root(value: Value) -> Self {
        Self {
            stack: vec![Frame {
                value,
                index: None,
                len: None,
                key: None,
            }],
        }
    }

    fn current(&self) -> &Value {
        &self.stack.last().expect("scope stack is never empty").value
    }

    fn push(&mut self, value: Value, index: Option<usize>, len: Option<usize>, key: Option<String>) {
        self.stack.push(Frame { value, index, len, key });
    }

    fn pop(&mut self) {
        self.stack.pop();
    }

    /// Resolve a bare token: literals, `@`-prefixed loop metadata, `this`,
    /// or a dotted path walked from the innermost scope outward (so a name
    /// shadowed by a loop item still falls back to the enclosing context).
    fn resolve_token(&self, token: &str) -> Value {
        if let Some(literal) = parse_literal(token) {
            return literal;
        }
        if token == "this" || token == "." {
            return self.current().clone();
        }
        if let Some(rest) = token.strip_prefix("this.") {
            return resolve_path(self.current(), rest).cloned().unwrap_or(Value::Null);
        }
        if let Some(special) = token.strip_prefix('@') {
            let frame = self.stack.last().expect("scope stack is never empty");
            return match special {
                "index" => frame.index.map(|i| Value::from(i)).unwrap_or(Value::Null),
                "first" => frame.index.map(|i| Value::from(i == 0)).unwrap_or(Value::Null),
                "last" => match (frame.index, frame.len) {
                    (Some(i), Some(len)) => Value::from(i + 1 == len),
                    _ => Value::Null,
                },
                "key" => frame.key.clone().map(Value::String).unwrap_or(Value::Null),
                _ => Value::Null,
            };
        }
        for frame in self.stack.iter().rev() {
            if let Some(found) = resolve_path(&frame.value, token) {
                return found.clone();
            }
        }
        Value::Null
    }

    /// Like `resolve_token`, but distinguishes "genuinely absent from every
    /// scope frame" (`None`) from "present, possibly null" (`Some`). Used
    /// by the bare-variable pass, which must leave `{{path}}` textually
    /// intact on a true miss rather than print nothing.
    fn lookup(&self, token: &str) -> Option<Value> {
        if let Some(literal) = parse_literal(token) {
            return Some(literal);
        }
        if token == "this" || token == "." {
            return Some(self.current().clone());
        }
        if let Some(rest) = token.strip_prefix("this.") {
            return Some(resolve_path(self.current(), rest).cloned().unwrap_or(Value::Null));
        }
        if token.starts_with('@') {
            return Some(self.resolve_token(token));
        }
        for frame in self.stack.iter().rev() {
            if let Some(found) = resolve_path(&frame.value, token) {
                return Some(found.clone());
            }
        }
        None
    }
}

/// Strip one layer of surrounding parentheses from a condition expression,
/// e.g. `(gt score 50)` -> `gt score 50`. Conditions accept either a bare
/// dotted path or a parenthesized helper call per spec.
fn strip_parens(expr: &str) -> &str {
    let trimmed = expr.trim();
    if trimmed.starts_with('(') && trimmed.ends_with(')') {
        trimmed[1..trimmed.len() - 1].trim()
    } else {
        trimmed
    }
}

fn parse_literal(token: &str) -> Option<Value> {
    if (token.starts_with('"') && token.ends_with('"') && token.len() >= 2)
        || (token.starts_with('\'') && token.ends_with('\'') && token.len() >= 2)
    {
        return Some(Value::String(token[1..token.len() - 1].to_string()));
    }
    match token {
        "true" => return Some(Value::Bool(true)),
        "false" => return Some(Value::Bool(false)),
        "null" => return Some(Value::Null),
        _ => {}
    }
    if let Ok(n) = token.parse::<i64>() {
        return Some(Value::from(n));
    }
    if let Ok(n) = token.parse::<f64>() {
        return Some(Value::from(n));
    }
    None
}

/// Split an expression into whitespace-separated tokens, respecting quoted
/// string literals so `eq name "a b"` keeps its argument intact.
fn split_tokens(expr: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = None;
    for c in expr.chars() {
        match in_quotes {
            Some(q) if c == q => {
                current.push(c);
                tokens.push(std::mem::take(&mut current));
                in_quotes = None;
            }
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                current.push(c);
                in_quotes = Some(c);
            }
            None if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            None => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

pub struct Renderer<'a> {
    pub transforms: &'a TransformRegistry,
    pub helpers: &'a HelperRegistry,
    pub partials: &'a PartialRegistry,
}

impl<'a> Renderer<'a> {
    pub fn render(&self, nodes: &[Node], context: Value) -> Result<String, TemplateError> {
        let mut scope = Scope::root(context);
        let mut out = String::new();
        let mut trail = Vec::new();
        self.render_nodes(nodes, &mut scope, &mut out, &mut trail, 0)?;
        Ok(out)
    }

    fn render_nodes(
        &self,
        nodes: &[Node],
        scope: &mut Scope,
        out: &mut String,
        trail: &mut Vec<String>,
        depth: usize,
    ) -> Result<(), TemplateError> {
        for node in nodes {
            self.render_node(node, scope, out, trail, depth)?;
        }
        Ok(())
    }

    fn render_node(
        &self,
        node: &Node,
        scope: &mut Scope,
        out: &mut String,
        trail: &mut Vec<String>,
        depth: usize,
    ) -> Result<(), TemplateError> {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Variable(expr) => {
                out.push_str(&self.render_variable(expr, scope));
            }
            Node::Partial(name) => {
                self.render_partial(name, scope.current().clone(), out, trail, depth)?;
            }
            Node::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let value = self.eval_expr(condition, scope);
                if is_truthy(&value) {
                    self.render_nodes(then_branch, scope, out, trail, depth)?;
                } else {
                    self.render_nodes(else_branch, scope, out, trail, depth)?;
                }
            }
            Node::Unless { condition, body } => {
                let value = self.eval_expr(condition, scope);
                if !is_truthy(&value) {
                    self.render_nodes(body, scope, out, trail, depth)?;
                }
            }
            Node::Each { path, body } => {
                let collection = scope.resolve_token(path);
                match collection {
                    Value::Array(items) => {
                        let len = items.len();
                        for (i, item) in items.into_iter().enumerate() {
                            scope.push(item, Some(i), Some(len), None);
                            self.render_nodes(body, scope, out, trail, depth)?;
                            scope.pop();
                        }
                    }
                    Value::Object(map) => {
                        let len = map.len();
                        for (i, (key, value)) in map.into_iter().enumerate() {
                            scope.push(value, Some(i), Some(len), Some(key));
                            self.render_nodes(body, scope, out, trail, depth)?;
                            scope.pop();
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn render_partial(
        &self,
        name: &str,
        context: Value,
        out: &mut String,
        trail: &mut Vec<String>,
        depth: usize,
    ) -> Result<(), TemplateError> {
        if depth >= MAX_EXPANSION_DEPTH {
            return Err(TemplateError::IncludeDepthExceeded {
                path: name.to_string(),
                max: MAX_EXPANSION_DEPTH,
            });
        }
        let key = format!("partial:{name}");
        if trail.iter().any(|n| n == &key) {
            let mut cycle = trail.clone();
            cycle.push(key);
            return Err(TemplateError::IncludeCycle(cycle.join(" -> ")));
        }
        let body = match self.partials.get(name) {
            Some(body) => body,
            None => {
                out.push_str(&format!("{{{{> {name}}}}}"));
                return Ok(());
            }
        };
        let nodes = ast::parse(body)?;
        trail.push(key);
        let mut scope = Scope::root(context);
        self.render_nodes(&nodes, &mut scope, out, trail, depth + 1)?;
        trail.pop();
        Ok(())
    }

    /// Evaluate a `{{ expr }}` body or a block condition: a path, an
    /// optional transform chain (`path | t1 | t2:arg`), or a leading
    /// registered helper call (`eq a b`).
    fn eval_expr(&self, expr: &str, scope: &Scope) -> Value {
        let (head, chain) = match expr.split_once('|') {
            Some((h, c)) => (h.trim(), Some(c)),
            None => (expr.trim(), None),
        };
        let head = strip_parens(head);
        let tokens = split_tokens(head);
        let value = match tokens.split_first() {
            Some((first, rest)) if self.helpers.contains(first) => {
                let args: Vec<Value> = rest.iter().map(|t| scope.resolve_token(t)).collect();
                self.helpers.call(first, &args).unwrap_or(Value::Null)
            }
            Some((first, _)) => scope.resolve_token(first),
            None => Value::Null,
        };
        match chain {
            Some(chain) => self.transforms.apply_chain(value, chain),
            None => value,
        }
    }

    /// Evaluate a `{{ expr }}` output tag. Unlike `eval_expr` (used for
    /// block conditions, where a miss is simply falsy), a bare variable that
    /// resolves to nothing, or a call to an unregistered helper, must leave
    /// the original tag text in the output rather than print nothing.
    fn render_variable(&self, expr: &str, scope: &Scope) -> String {
        let (head, chain) = match expr.split_once('|') {
            Some((h, c)) => (h.trim(), Some(c)),
            None => (expr.trim(), None),
        };
        let head = strip_parens(head);
        let tokens = split_tokens(head);
        let apply = |value: Value| match chain {
            Some(chain) => value_to_plain_string(&self.transforms.apply_chain(value, chain)),
            None => value_to_plain_string(&value),
        };
        match tokens.split_first() {
            Some((first, rest)) if self.helpers.contains(first) => {
                let args: Vec<Value> = rest.iter().map(|t| scope.resolve_token(t)).collect();
                apply(self.helpers.call(first, &args).unwrap_or(Value::Null))
            }
            Some((first, rest)) if rest.is_empty() => match scope.lookup(first) {
                Some(value) => apply(value),
                None => format!("{{{{{expr}}}}}"),
            },
            Some(_) => format!("{{{{{expr}}}}}"),
            None => String::new(),
        }
    }

    /// Collect every distinct path referenced by a variable expression,
    /// block condition, or `#each` target, skipping literals, helper names,
    /// and `this`/`@...` scope references since those aren't context keys.
    /// Returns a sorted, deduplicated list per spec contract.
    pub fn extract_variables(nodes: &[Node], helpers: &HelperRegistry, out: &mut Vec<String>) {
        Self::collect_variables(nodes, helpers, out);
        out.sort();
        out.dedup();
    }

    fn collect_variables(nodes: &[Node], helpers: &HelperRegistry, out: &mut Vec<String>) {
        for node in nodes {
            match node {
                Node::Text(_) | Node::Partial(_) => {}
                Node::Variable(expr) => collect_expr_paths(expr, helpers, out),
                Node::If {
                    condition,
                    then_branch,
                    else_branch,
                } => {
                    collect_expr_paths(condition, helpers, out);
                    Self::collect_variables(then_branch, helpers, out);
                    Self::collect_variables(else_branch, helpers, out);
                }
                Node::Unless { condition, body } => {
                    collect_expr_paths(condition, helpers, out);
                    Self::collect_variables(body, helpers, out);
                }
                Node::Each { path, body } => {
                    push_path(path, out);
                    Self::collect_variables(body, helpers, out);
                }
            }
        }
    }
}

fn collect_expr_paths(expr: &str, helpers: &HelperRegistry, out: &mut Vec<String>) {
    let head = expr.split('|').next().unwrap_or("").trim();
    let tokens = split_tokens(head);
    let path_tokens: &[String] = match tokens.split_first() {
        Some((first, rest)) if helpers.contains(first) => rest,
        _ => &tokens,
    };
    for token in path_tokens {
        if parse_literal(token).is_none()
            && token != "this"
            && token != "."
            && !token.starts_with('@')
            && !token.starts_with("this.")
            && !token.starts_with("./")
        {
            push_path(token, out);
        }
    }
}

fn push_path(path: &str, out: &mut Vec<String>) {
    if !out.iter().any(|p| p == path) {
        out.push(path.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(template: &str, context: Value) -> String {
        let transforms = TransformRegistry::new();
        let helpers = HelperRegistry::new();
        let partials = PartialRegistry::new();
        let renderer = Renderer {
            transforms: &transforms,
            helpers: &helpers,
            partials: &partials,
        };
        let nodes = ast::parse(template).unwrap();
        renderer.render(&nodes, context).unwrap()
    }

    #[test]
    fn substitutes_bare_variables() {
        assert_eq!(render("Hi {{name}}!", json!({"name": "Ada"})), "Hi Ada!");
    }

    #[test]
    fn applies_pipe_transforms() {
        assert_eq!(render("{{name | upper}}", json!({"name": "ada"})), "ADA");
    }

    #[test]
    fn if_else_follows_truthiness() {
        assert_eq!(render("{{#if ok}}yes{{else}}no{{/if}}", json!({"ok": true})), "yes");
        assert_eq!(render("{{#if ok}}yes{{else}}no{{/if}}", json!({"ok": false})), "no");
        assert_eq!(render("{{#if ok}}yes{{else}}no{{/if}}", json!({})), "no");
    }

    #[test]
    fn unless_is_negated_if() {
        assert_eq!(render("{{#unless ok}}shown{{/unless}}", json!({"ok": false})), "shown");
        assert_eq!(render("{{#unless ok}}shown{{/unless}}", json!({"ok": true})), "");
    }

    #[test]
    fn each_binds_this_and_index_metadata() {
        let out = render(
            "{{#each items}}{{@index}}:{{this}} {{/each}}",
            json!({"items": ["a", "b"]}),
        );
        assert_eq!(out, "0:a 1:b ");
    }

    #[test]
    fn each_falls_back_to_outer_scope_for_unshadowed_paths() {
        let out = render(
            "{{#each items}}{{owner}}-{{this}} {{/each}}",
            json!({"owner": "root", "items": ["a", "b"]}),
        );
        assert_eq!(out, "root-a root-b ");
    }

    #[test]
    fn nested_each_and_if_compose() {
        let out = render(
            "{{#each groups}}{{#if this.active}}{{this.name}} {{/if}}{{/each}}",
            json!({"groups": [{"name": "x", "active": true}, {"name": "y", "active": false}]}),
        );
        assert_eq!(out, "x ");
    }

    #[test]
    fn helper_call_evaluates_condition() {
        assert_eq!(render("{{#if eq status \"done\"}}finished{{/if}}", json!({"status": "done"})), "finished");
    }

    #[test]
    fn renders_registered_partial_with_current_context() {
        let transforms = TransformRegistry::new();
        let helpers = HelperRegistry::new();
        let mut partials = PartialRegistry::new();
        partials.register("greeting", "Hi {{name}}");
        let renderer = Renderer {
            transforms: &transforms,
            helpers: &helpers,
            partials: &partials,
        };
        let nodes = ast::parse("{{> greeting}}!").unwrap();
        let result = renderer.render(&nodes, json!({"name": "Ada"})).unwrap();
        assert_eq!(result, "Hi Ada!");
    }

    #[test]
    fn detects_partial_include_cycles() {
        let transforms = TransformRegistry::new();
        let helpers = HelperRegistry::new();
        let mut partials = PartialRegistry::new();
        partials.register("a", "{{> b}}");
        partials.register("b", "{{> a}}");
        let renderer = Renderer {
            transforms: &transforms,
            helpers: &helpers,
            partials: &partials,
        };
        let nodes = ast::parse("{{> a}}").unwrap();
        let err = renderer.render(&nodes, json!({})).unwrap_err();
        assert!(matches!(err, TemplateError::IncludeCycle(_)));
    }

    #[test]
    fn missing_partial_leaves_directive_intact() {
        let transforms = TransformRegistry::new();
        let helpers = HelperRegistry::new();
        let partials = PartialRegistry::new();
        let renderer = Renderer {
            transforms: &transforms,
            helpers: &helpers,
            partials: &partials,
        };
        let nodes = ast::parse("{{> nope}}").unwrap();
        let out = renderer.render(&nodes, json!({})).unwrap();
        assert_eq!(out, "{{> nope}}");
    }

    #[test]
    fn missing_bare_variable_leaves_tag_intact() {
        assert_eq!(render("Hello {{name}}!", json!({})), "Hello {{name}}!");
    }

    #[test]
    fn unknown_helper_leaves_tag_intact() {
        assert_eq!(render("{{shout name}}", json!({"name": "Ada"})), "{{shout name}}");
    }

    #[test]
    fn parenthesized_helper_call_condition() {
        assert_eq!(
            render("{{#if (gt score 50)}}pass{{else}}fail{{/if}}", json!({"score": 75})),
            "pass"
        );
        assert_eq!(
            render("{{#if (gt score 50)}}pass{{else}}fail{{/if}}", json!({"score": 10})),
            "fail"
        );
    }

    #[test]
    fn include_directive_renders_file_against_current_scope() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partials_header.tmpl");
        std::fs::write(&path, "Hi {{name}}").unwrap();
        let template = format!("{{{{#include \"{}\"}}}}!", path.display());
        assert_eq!(render(&template, json!({"name": "Ada"})), "Hi Ada!");
    }

    #[test]
    fn include_directive_detects_cycles() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.tmpl");
        let b = dir.path().join("b.tmpl");
        std::fs::write(&a, format!("{{{{#include \"{}\"}}}}", b.display())).unwrap();
        std::fs::write(&b, format!("{{{{#include \"{}\"}}}}", a.display())).unwrap();
        let transforms = TransformRegistry::new();
        let helpers = HelperRegistry::new();
        let partials = PartialRegistry::new();
        let renderer = Renderer {
            transforms: &transforms,
            helpers: &helpers,
            partials: &partials,
        };
        let template = format!("{{{{#include \"{}\"}}}}", a.display());
        let nodes = ast::parse(&template).unwrap();
        let err = renderer.render(&nodes, json!({})).unwrap_err();
        assert!(matches!(err, TemplateError::IncludeCycle(_)));
    }

    #[test]
    fn extract_variables_skips_literals_and_helpers() {
        let helpers = HelperRegistry::new();
        let nodes = ast::parse("{{#if eq status \"done\"}}{{name | upper}}{{/if}}{{#each items}}{{this}}{{/each}}").unwrap();
        let mut out = Vec::new();
        Renderer::extract_variables(&nodes, &helpers, &mut out);
        assert_eq!(out, vec!["items".to_string(), "name".to_string(), "status".to_string()]);
    }
}
