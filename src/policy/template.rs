//! Policy template parsing and rendering
//!
//! Policy documents are written as text templates with `{{ … }}` actions:
//!
//! - `{{ .Tenant.Name }}` / `{{ $.Tenant.Name }}` / `{{ . }}` insert a value
//! - `{{ range .Tenant.AppRoles }}…{{ else }}…{{ end }}` iterates a list
//! - `{{ if .Tenant.EnableIAMLogin }}…{{ else }}…{{ end }}` branches on truthiness
//! - `{{/* … */}}` is a comment
//! - `{{-` and `-}}` trim the whitespace next to the action

use regex::Regex;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ProvisionError, Result};

const ACTION_PATTERN: &str = r"(?s)\{\{(?P<ltrim>-\s+)?(?P<body>.*?)(?P<rtrim>\s+-)?\}\}";
const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

/// A value path such as `.Tenant.Name` or `$.Tenant.AppRoles`
#[derive(Debug, Clone, PartialEq)]
struct FieldPath {
    rooted: bool,
    segments: Vec<String>,
}

impl FieldPath {
    fn display(&self) -> String {
        let prefix = if self.rooted { "$" } else { "" };
        if self.segments.is_empty() {
            return if self.rooted { "$".to_string() } else { ".".to_string() };
        }
        format!("{}.{}", prefix, self.segments.join("."))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Field(FieldPath),
    Range {
        path: FieldPath,
        body: Vec<Node>,
        otherwise: Vec<Node>,
    },
    If {
        path: FieldPath,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

#[derive(Debug)]
enum Token {
    Text(String),
    Action(Action),
}

#[derive(Debug)]
enum Action {
    Field(FieldPath),
    Range(FieldPath),
    If(FieldPath),
    Else,
    End,
    Comment,
}

enum Terminator {
    Else,
    End,
    Eof,
}

/// A parsed policy template
#[derive(Debug, Clone)]
pub struct Template {
    path: PathBuf,
    nodes: Vec<Node>,
}

impl Template {
    /// Load and parse a template from disk
    pub fn load(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path).map_err(|source| ProvisionError::TemplateRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &source)
    }

    /// Parse template source; `path` is only used in error messages
    pub fn parse<P: Into<PathBuf>>(path: P, source: &str) -> Result<Self> {
        let path = path.into();
        let tokens = tokenize(&path, source)?;
        let mut tokens = tokens.into_iter();

        let (nodes, terminator) = parse_nodes(&path, &mut tokens)?;
        match terminator {
            Terminator::Eof => Ok(Self { path, nodes }),
            Terminator::End => Err(ProvisionError::template_parse(&path, "unexpected {{end}}")),
            Terminator::Else => Err(ProvisionError::template_parse(&path, "unexpected {{else}}")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Render the template against a context value
    pub fn render(&self, context: &Value) -> Result<String> {
        let mut out = String::new();
        render_nodes(&self.nodes, context, context, &mut out)
            .map_err(|details| ProvisionError::template_execution(&self.path, details))?;
        Ok(out)
    }
}

fn tokenize(path: &Path, source: &str) -> Result<Vec<Token>> {
    let action_re = Regex::new(ACTION_PATTERN)?;
    let mut tokens = Vec::new();
    let mut trim_next = false;
    let mut last = 0;

    for captures in action_re.captures_iter(source) {
        let whole = match captures.get(0) {
            Some(m) => m,
            None => continue,
        };

        let mut text = source[last..whole.start()].to_string();
        if trim_next {
            text = text.trim_start().to_string();
        }
        if captures.name("ltrim").is_some() {
            text = text.trim_end().to_string();
        }
        check_unclosed(path, &text)?;
        if !text.is_empty() {
            tokens.push(Token::Text(text));
        }

        let body = captures.name("body").map(|m| m.as_str()).unwrap_or_default();
        tokens.push(Token::Action(parse_action(path, body.trim())?));

        trim_next = captures.name("rtrim").is_some();
        last = whole.end();
    }

    let mut tail = source[last..].to_string();
    if trim_next {
        tail = tail.trim_start().to_string();
    }
    check_unclosed(path, &tail)?;
    if !tail.is_empty() {
        tokens.push(Token::Text(tail));
    }

    Ok(tokens)
}

fn check_unclosed(path: &Path, text: &str) -> Result<()> {
    if text.contains("{{") {
        return Err(ProvisionError::template_parse(path, "unclosed action"));
    }
    Ok(())
}

fn parse_action(path: &Path, body: &str) -> Result<Action> {
    if body.starts_with("/*") {
        if body.ends_with("*/") {
            return Ok(Action::Comment);
        }
        return Err(ProvisionError::template_parse(path, "unclosed comment"));
    }

    match body {
        "end" => return Ok(Action::End),
        "else" => return Ok(Action::Else),
        "" => return Err(ProvisionError::template_parse(path, "missing value for command")),
        _ => {}
    }

    if let Some(rest) = body.strip_prefix("range ") {
        return Ok(Action::Range(parse_field_path(path, rest.trim())?));
    }
    if let Some(rest) = body.strip_prefix("if ") {
        return Ok(Action::If(parse_field_path(path, rest.trim())?));
    }

    Ok(Action::Field(parse_field_path(path, body)?))
}

fn parse_field_path(path: &Path, text: &str) -> Result<FieldPath> {
    let (rooted, rest) = if text == "." {
        (false, "")
    } else if text == "$" {
        (true, "")
    } else if let Some(rest) = text.strip_prefix("$.") {
        (true, rest)
    } else if let Some(rest) = text.strip_prefix('.') {
        (false, rest)
    } else {
        return Err(ProvisionError::template_parse(
            path,
            format!("unsupported action '{text}'"),
        ));
    };

    let ident_re = Regex::new(IDENTIFIER_PATTERN)?;
    let mut segments = Vec::new();
    if !rest.is_empty() {
        for segment in rest.split('.') {
            if !ident_re.is_match(segment) {
                return Err(ProvisionError::template_parse(
                    path,
                    format!("bad field name '{segment}' in '{text}'"),
                ));
            }
            segments.push(segment.to_string());
        }
    }

    Ok(FieldPath { rooted, segments })
}

fn parse_nodes(
    path: &Path,
    tokens: &mut std::vec::IntoIter<Token>,
) -> Result<(Vec<Node>, Terminator)> {
    let mut nodes = Vec::new();

    while let Some(token) = tokens.next() {
        let action = match token {
            Token::Text(text) => {
                nodes.push(Node::Text(text));
                continue;
            }
            Token::Action(action) => action,
        };

        match action {
            Action::Comment => {}
            Action::Field(field) => nodes.push(Node::Field(field)),
            Action::Else => return Ok((nodes, Terminator::Else)),
            Action::End => return Ok((nodes, Terminator::End)),
            Action::Range(field) => {
                let (body, otherwise) = parse_block(path, tokens, "range")?;
                nodes.push(Node::Range {
                    path: field,
                    body,
                    otherwise,
                });
            }
            Action::If(field) => {
                let (then, otherwise) = parse_block(path, tokens, "if")?;
                nodes.push(Node::If {
                    path: field,
                    then,
                    otherwise,
                });
            }
        }
    }

    Ok((nodes, Terminator::Eof))
}

/// Parse the body of a block action up to its `{{end}}`, splitting on an optional `{{else}}`
fn parse_block(
    path: &Path,
    tokens: &mut std::vec::IntoIter<Token>,
    keyword: &str,
) -> Result<(Vec<Node>, Vec<Node>)> {
    let (body, terminator) = parse_nodes(path, tokens)?;
    match terminator {
        Terminator::End => Ok((body, Vec::new())),
        Terminator::Else => {
            let (otherwise, terminator) = parse_nodes(path, tokens)?;
            match terminator {
                Terminator::End => Ok((body, otherwise)),
                Terminator::Else => Err(ProvisionError::template_parse(
                    path,
                    format!("more than one {{{{else}}}} in {{{{{keyword}}}}}"),
                )),
                Terminator::Eof => Err(ProvisionError::template_parse(
                    path,
                    format!("unclosed {{{{{keyword}}}}}"),
                )),
            }
        }
        Terminator::Eof => Err(ProvisionError::template_parse(
            path,
            format!("unclosed {{{{{keyword}}}}}"),
        )),
    }
}

fn render_nodes(
    nodes: &[Node],
    root: &Value,
    dot: &Value,
    out: &mut String,
) -> std::result::Result<(), String> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Field(field) => {
                let value = lookup(field, root, dot)?;
                out.push_str(&format_value(value));
            }
            Node::Range {
                path,
                body,
                otherwise,
            } => {
                let value = lookup(path, root, dot)?;
                let items: Vec<&Value> = match value {
                    Value::Array(items) => items.iter().collect(),
                    Value::Object(map) => map.values().collect(),
                    Value::Null => Vec::new(),
                    other => {
                        return Err(format!(
                            "range can't iterate over {} ({})",
                            path.display(),
                            format_value(other)
                        ))
                    }
                };

                if items.is_empty() {
                    render_nodes(otherwise, root, dot, out)?;
                }
                for item in items {
                    render_nodes(body, root, item, out)?;
                }
            }
            Node::If {
                path,
                then,
                otherwise,
            } => {
                let value = lookup(path, root, dot)?;
                if is_truthy(value) {
                    render_nodes(then, root, dot, out)?;
                } else {
                    render_nodes(otherwise, root, dot, out)?;
                }
            }
        }
    }
    Ok(())
}

fn lookup<'a>(
    field: &FieldPath,
    root: &'a Value,
    dot: &'a Value,
) -> std::result::Result<&'a Value, String> {
    let mut current = if field.rooted { root } else { dot };

    for segment in &field.segments {
        current = match current {
            Value::Object(map) => map.get(segment).ok_or_else(|| {
                format!("undefined field '{}' in {}", segment, field.display())
            })?,
            other => {
                return Err(format!(
                    "can't evaluate field '{}' of {} in {}",
                    segment,
                    format_value(other),
                    field.display()
                ))
            }
        };
    }

    Ok(current)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => format!(
            "[{}]",
            items.iter().map(format_value).collect::<Vec<_>>().join(" ")
        ),
        Value::Object(_) => value.to_string(),
    }
}
