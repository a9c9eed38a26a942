// ABOUTME: Block-aware tokenizer and parser turning raw template text into a node tree
use promptforge_types::TemplateError;

/// Shared nesting cap for both `{{#include}}` and `{{> partial}}` expansion;
/// spec boundary: depth exactly 10 succeeds, 11 fails.
pub(crate) const MAX_EXPANSION_DEPTH: usize = 10;

/// A single `{{ ... }}` tag's raw interior, or a run of literal text between tags.
#[derive(Debug, Clone)]
enum Token {
    Text(String),
    Tag(String),
}

/// Parsed template structure. Blocks nest by construction rather than by any
/// regex-based matching: the parser walks the token stream once, pushing a
/// frame per open block and popping it on the matching close tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Variable(String),
    Partial(String),
    If {
        condition: String,
        then_branch: Vec<Node>,
        else_branch: Vec<Node>,
    },
    Unless {
        condition: String,
        body: Vec<Node>,
    },
    Each {
        path: String,
        body: Vec<Node>,
    },
}

/// Scan `template` for `{{`/`}}` delimiters, splitting it into alternating
/// text and tag tokens. This is a linear character scan, not a regex: tags
/// cannot nest at the lexical level (an inner `{{` before a `}}` simply
/// starts a new, shorter match), which keeps the scanner O(n).
fn tokenize(template: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = template;
    loop {
        match rest.find("{{") {
            None => {
                if !rest.is_empty() {
                    tokens.push(Token::Text(rest.to_string()));
                }
                break;
            }
            Some(start) => {
                if start > 0 {
                    tokens.push(Token::Text(rest[..start].to_string()));
                }
                let after_open = &rest[start + 2..];
                match after_open.find("}}") {
                    None => {
                        // Unterminated tag: treat the rest as literal text.
                        tokens.push(Token::Text(rest[start..].to_string()));
                        break;
                    }
                    Some(end) => {
                        tokens.push(Token::Tag(after_open[..end].trim().to_string()));
                        rest = &after_open[end + 2..];
                    }
                }
            }
        }
    }
    tokens
}

pub fn parse(template: &str) -> Result<Vec<Node>, TemplateError> {
    let expanded = expand_includes(template, &mut Vec::new(), 0)?;
    let tokens = tokenize(&expanded);
    let mut pos = 0usize;
    let nodes = parse_nodes(&tokens, &mut pos, None)?;
    if pos != tokens.len() {
        return Err(TemplateError::MalformedBlock(
            "unexpected closing tag with no matching block".to_string(),
        ));
    }
    Ok(nodes)
}

/// Splice `{{#include "path"}}` directives into the template text before any
/// block structure is tokenized, so an included file's opened blocks can be
/// closed by the outer template (or vice versa). Runs a linear scan over the
/// same `{{`/`}}` boundaries `tokenize` uses, but only acts on include tags;
/// every other tag is copied through verbatim for the real tokenizer to see.
fn expand_includes(template: &str, trail: &mut Vec<String>, depth: usize) -> Result<String, TemplateError> {
    let mut out = String::new();
    let mut rest = template;
    loop {
        match rest.find("{{") {
            None => {
                out.push_str(rest);
                break;
            }
            Some(start) => {
                out.push_str(&rest[..start]);
                let after_open = &rest[start + 2..];
                match after_open.find("}}") {
                    None => {
                        out.push_str(&rest[start..]);
                        break;
                    }
                    Some(end) => {
                        let raw = after_open[..end].trim();
                        rest = &after_open[end + 2..];
                        if let Some(path) = raw.strip_prefix("#include ").map(str::trim) {
                            let path = path.trim_matches(|c| c == '"' || c == '\'').to_string();
                            if depth >= MAX_EXPANSION_DEPTH {
                                return Err(TemplateError::IncludeDepthExceeded {
                                    path,
                                    max: MAX_EXPANSION_DEPTH,
                                });
                            }
                            let key = format!("include:{path}");
                            if trail.iter().any(|n| n == &key) {
                                let mut cycle = trail.clone();
                                cycle.push(key);
                                return Err(TemplateError::IncludeCycle(cycle.join(" -> ")));
                            }
                            let content = std::fs::read_to_string(&path)
                                .map_err(|_| TemplateError::IncludeNotFound(path.clone()))?;
                            trail.push(key);
                            let expanded = expand_includes(&content, trail, depth + 1)?;
                            trail.pop();
                            out.push_str(&expanded);
                        } else {
                            out.push_str("{{");
                            out.push_str(&after_open[..end]);
                            out.push_str("}}");
                        }
                    }
                }
            }
        }
    }
    Ok(out)
}

/// Parse a run of nodes starting at `*pos`, stopping (without consuming)
/// when a closing/else tag relevant to `stop_on` is reached, or at EOF when
/// `stop_on` is `None` (top level).
fn parse_nodes(
    tokens: &[Token],
    pos: &mut usize,
    stop_on: Option<&str>,
) -> Result<Vec<Node>, TemplateError> {
    let mut nodes = Vec::new();
    while *pos < tokens.len() {
        match &tokens[*pos] {
            Token::Text(text) => {
                nodes.push(Node::Text(text.clone()));
                *pos += 1;
            }
            Token::Tag(raw) => {
                if raw == "else" || raw.starts_with('/') {
                    if stop_on.is_some() {
                        return Ok(nodes);
                    }
                    return Err(TemplateError::MalformedBlock(format!(
                        "unexpected tag '{{{{{raw}}}}}' with no open block"
                    )));
                }
                *pos += 1;
                if let Some(cond) = raw.strip_prefix("#if ").or_else(|| raw.strip_prefix("#if")) {
                    let condition = cond.trim().to_string();
                    let then_branch = parse_nodes(tokens, pos, Some("if"))?;
                    let mut else_branch = Vec::new();
                    if matches!(tokens.get(*pos), Some(Token::Tag(t)) if t == "else") {
                        *pos += 1;
                        else_branch = parse_nodes(tokens, pos, Some("if"))?;
                    }
                    expect_close(tokens, pos, "if")?;
                    nodes.push(Node::If {
                        condition,
                        then_branch,
                        else_branch,
                    });
                } else if let Some(path) = raw.strip_prefix("#each ").map(str::trim) {
                    let body = parse_nodes(tokens, pos, Some("each"))?;
                    expect_close(tokens, pos, "each")?;
                    nodes.push(Node::Each {
                        path: path.to_string(),
                        body,
                    });
                } else if let Some(cond) = raw.strip_prefix("#unless ").map(str::trim) {
                    let body = parse_nodes(tokens, pos, Some("unless"))?;
                    expect_close(tokens, pos, "unless")?;
                    nodes.push(Node::Unless {
                        condition: cond.to_string(),
                        body,
                    });
                } else if let Some(name) = raw.strip_prefix('>').map(str::trim) {
                    nodes.push(Node::Partial(name.to_string()));
                } else if raw.starts_with('#') {
                    return Err(TemplateError::MalformedBlock(format!(
                        "unknown block tag '{{{{{raw}}}}}'"
                    )));
                } else {
                    nodes.push(Node::Variable(raw.clone()));
                }
            }
        }
    }
    if stop_on.is_some() {
        return Err(TemplateError::MalformedBlock(format!(
            "unclosed block: expected {{{{/{}}}}}",
            stop_on.unwrap()
        )));
    }
    Ok(nodes)
}

fn expect_close(tokens: &[Token], pos: &mut usize, kind: &str) -> Result<(), TemplateError> {
    match tokens.get(*pos) {
        Some(Token::Tag(t)) if t == &format!("/{kind}") => {
            *pos += 1;
            Ok(())
        }
        Some(Token::Tag(t)) => Err(TemplateError::MalformedBlock(format!(
            "expected {{{{/{kind}}}}}, found {{{{{t}}}}}"
        ))),
        _ => Err(TemplateError::MalformedBlock(format!(
            "unclosed block: expected {{{{/{kind}}}}}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flat_variable_and_text() {
        let nodes = parse("Hello, {{name}}!").unwrap();
        assert_eq!(
            nodes,
            vec![
                Node::Text("Hello, ".to_string()),
                Node::Variable("name".to_string()),
                Node::Text("!".to_string()),
            ]
        );
    }

    #[test]
    fn parses_nested_if_each() {
        let nodes = parse("{{#if show}}{{#each items}}{{this}}{{/each}}{{/if}}").unwrap();
        match &nodes[0] {
            Node::If { then_branch, .. } => match &then_branch[0] {
                Node::Each { body, .. } => {
                    assert_eq!(body[0], Node::Variable("this".to_string()));
                }
                other => panic!("expected Each, got {other:?}"),
            },
            other => panic!("expected If, got {other:?}"),
        }
    }

    #[test]
    fn parses_if_else() {
        let nodes = parse("{{#if a}}yes{{else}}no{{/if}}").unwrap();
        match &nodes[0] {
            Node::If {
                then_branch,
                else_branch,
                ..
            } => {
                assert_eq!(then_branch, &vec![Node::Text("yes".to_string())]);
                assert_eq!(else_branch, &vec![Node::Text("no".to_string())]);
            }
            other => panic!("expected If, got {other:?}"),
        }
    }

    #[test]
    fn unclosed_block_is_an_error() {
        let err = parse("{{#if a}}oops").unwrap_err();
        assert!(matches!(err, TemplateError::MalformedBlock(_)));
    }

    #[test]
    fn stray_close_tag_is_an_error() {
        let err = parse("oops{{/if}}").unwrap_err();
        assert!(matches!(err, TemplateError::MalformedBlock(_)));
    }

    #[test]
    fn registers_partial_tag() {
        let nodes = parse("{{> header}}").unwrap();
        assert_eq!(nodes, vec![Node::Partial("header".to_string())]);
    }

    #[test]
    fn include_directive_splices_file_contents_before_block_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("header.tmpl");
        std::fs::write(&path, "Hello, {{name}}!").unwrap();
        let template = format!("{{{{#include \"{}\"}}}}", path.display());
        let nodes = parse(&template).unwrap();
        assert_eq!(
            nodes,
            vec![
                Node::Text("Hello, ".to_string()),
                Node::Variable("name".to_string()),
                Node::Text("!".to_string()),
            ]
        );
    }

    #[test]
    fn include_can_open_a_block_closed_by_the_outer_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opener.tmpl");
        std::fs::write(&path, "{{#if show}}").unwrap();
        let template = format!("{{{{#include \"{}\"}}}}yes{{{{/if}}}}", path.display());
        let nodes = parse(&template).unwrap();
        match &nodes[0] {
            Node::If { then_branch, .. } => {
                assert_eq!(then_branch, &vec![Node::Text("yes".to_string())]);
            }
            other => panic!("expected If, got {other:?}"),
        }
    }

    #[test]
    fn missing_include_file_is_an_error() {
        let err = parse("{{#include \"/no/such/file.tmpl\"}}").unwrap_err();
        assert!(matches!(err, TemplateError::IncludeNotFound(_)));
    }
}
