//! Value templates
//!
//! Guest metadata values and global extra-config values may reference data
//! known only at reconcile time, e.g. `{{ (index .NetworkInterfaces 0).Gateway }}`.
//! This module implements the subset of Go template syntax those values use:
//!
//! - `{{ . }}` and field paths `{{ .A.B }}`
//! - `{{ index .List 0 }}` with any number of indexes, and `{{ (index .List 0).Field }}`
//! - string and integer literals as `index` arguments
//! - `{{- ` / ` -}}` whitespace trimming and `{{/* comments */}}`
//!
//! Data is any `serde_json::Value`. A field that is not found verbatim is
//! retried with its first letter lowercased, so `.ImageName` resolves
//! against camelCase serialized resources.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::error;

use crate::network::IpConfig;

/// Errors that can occur while parsing or executing a template.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template: {name}: parse error: {message}")]
    Parse { name: String, message: String },

    #[error("template: {name}: execute error: {message}")]
    Execute { name: String, message: String },
}

/// Data available to guest metadata templates.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateData {
    pub network_interfaces: Vec<IpConfig>,
    pub name_servers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Action(Expr),
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    /// `.A.B`; an empty path is `.`
    Field(Vec<String>),
    Number(i64),
    Str(String),
    Index(Box<Expr>, Vec<Expr>),
    /// `(expr).A.B`
    Chain(Box<Expr>, Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    Field(Vec<String>),
    Ident(String),
    Number(i64),
    Str(String),
}

/// A parsed template.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    nodes: Vec<Node>,
}

impl Template {
    pub fn parse(name: &str, text: &str) -> Result<Self, TemplateError> {
        let parse_err = |message: String| TemplateError::Parse { name: name.to_string(), message };

        let mut nodes = Vec::new();
        let mut rest = text;
        let mut trim_next = false;

        while let Some(start) = rest.find("{{") {
            let mut literal = &rest[..start];
            if trim_next {
                literal = literal.trim_start();
            }
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or_else(|| parse_err("unclosed action".to_string()))?;
            let mut action = &after[..end];
            rest = &after[end + 2..];

            if let Some(a) = action.strip_prefix("- ") {
                literal = literal.trim_end();
                action = a;
            }
            trim_next = false;
            if let Some(a) = action.strip_suffix(" -") {
                trim_next = true;
                action = a;
            }

            if !literal.is_empty() {
                nodes.push(Node::Text(literal.to_string()));
            }

            let action = action.trim();
            if action.starts_with("/*") && action.ends_with("*/") {
                continue;
            }
            if action.is_empty() {
                return Err(parse_err("missing value for command".to_string()));
            }

            let tokens = tokenize(action).map_err(parse_err)?;
            let mut parser = Parser { tokens, pos: 0 };
            let expr = parser.parse_command().map_err(parse_err)?;
            if parser.pos != parser.tokens.len() {
                return Err(parse_err(format!("unexpected {:?} in command", parser.tokens[parser.pos])));
            }
            nodes.push(Node::Action(expr));
        }

        let tail = if trim_next { rest.trim_start() } else { rest };
        if !tail.is_empty() {
            nodes.push(Node::Text(tail.to_string()));
        }

        Ok(Self { name: name.to_string(), nodes })
    }

    pub fn execute(&self, data: &Value) -> Result<String, TemplateError> {
        let mut out = String::new();
        for node in &self.nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Action(expr) => {
                    let value = eval(expr, data).map_err(|message| TemplateError::Execute {
                        name: self.name.clone(),
                        message,
                    })?;
                    write_value(&mut out, &value);
                }
            }
        }
        Ok(out)
    }
}

/// Render `text` against `data`, or return `text` unchanged if it does not
/// parse or execute.
pub fn render_or_literal(name: &str, text: &str, data: &Value) -> String {
    if !text.contains("{{") {
        return text.to_string();
    }
    match Template::parse(name, text).and_then(|t| t.execute(data)) {
        Ok(rendered) => rendered,
        Err(e) => {
            error!("Failed to render template {:?}: {}", text, e);
            text.to_string()
        }
    }
}

fn tokenize(action: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = action.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let is_ident = |c: char| c.is_alphanumeric() || c == '_';

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '.' => {
                let mut path = Vec::new();
                while i < chars.len() && chars[i] == '.' {
                    i += 1;
                    let start = i;
                    while i < chars.len() && is_ident(chars[i]) {
                        i += 1;
                    }
                    if start == i {
                        // A bare `.` is only valid on its own.
                        if path.is_empty() && chars.get(i).is_none_or(|c| c.is_whitespace() || *c == ')') {
                            break;
                        }
                        return Err("unexpected . in operand".to_string());
                    }
                    path.push(chars[start..i].iter().collect());
                }
                tokens.push(Token::Field(path));
            }
            '"' => {
                i += 1;
                let mut s = String::new();
                loop {
                    match chars.get(i) {
                        None => return Err("unterminated quoted string".to_string()),
                        Some('"') => {
                            i += 1;
                            break;
                        }
                        Some('\\') => {
                            let escaped = chars.get(i + 1).ok_or("unterminated quoted string")?;
                            s.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                other => *other,
                            });
                            i += 2;
                        }
                        Some(other) => {
                            s.push(*other);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(s));
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) => {
                let start = i;
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let n = literal.parse::<i64>().map_err(|e| format!("bad number {literal}: {e}"))?;
                tokens.push(Token::Number(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && is_ident(chars[i]) {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(format!("unexpected {other:?} in command")),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn parse_command(&mut self) -> Result<Expr, String> {
        let Some(Token::Ident(name)) = self.peek() else {
            return self.parse_operand();
        };
        if name != "index" {
            return Err(format!("function {name:?} not defined"));
        }
        self.pos += 1;

        let mut args = Vec::new();
        while !matches!(self.peek(), None | Some(Token::RParen)) {
            args.push(self.parse_operand()?);
        }
        if args.len() < 2 {
            return Err("wrong number of args for index".to_string());
        }
        let target = args.remove(0);
        Ok(Expr::Index(Box::new(target), args))
    }

    fn parse_operand(&mut self) -> Result<Expr, String> {
        match self.next() {
            None => Err("missing value for command".to_string()),
            Some(Token::Field(path)) => Ok(Expr::Field(path)),
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Str(s)) => Ok(Expr::Str(s)),
            Some(Token::LParen) => {
                let inner = self.parse_command()?;
                if self.next() != Some(Token::RParen) {
                    return Err("unclosed left paren".to_string());
                }
                if let Some(Token::Field(path)) = self.peek() {
                    let path = path.clone();
                    self.pos += 1;
                    return Ok(Expr::Chain(Box::new(inner), path));
                }
                Ok(inner)
            }
            Some(Token::RParen) => Err("unexpected right paren".to_string()),
            Some(Token::Ident(name)) => Err(format!("unexpected function {name:?} in operand")),
        }
    }
}

fn eval(expr: &Expr, data: &Value) -> Result<Value, String> {
    match expr {
        Expr::Field(path) => walk(data, path).cloned(),
        Expr::Number(n) => Ok(Value::from(*n)),
        Expr::Str(s) => Ok(Value::String(s.clone())),
        Expr::Index(target, indexes) => {
            let mut value = eval(target, data)?;
            for index in indexes {
                let index = eval(index, data)?;
                value = index_value(&value, &index)?;
            }
            Ok(value)
        }
        Expr::Chain(inner, path) => {
            let value = eval(inner, data)?;
            walk(&value, path).cloned()
        }
    }
}

fn walk<'a>(mut value: &'a Value, path: &[String]) -> Result<&'a Value, String> {
    for segment in path {
        value = match value {
            Value::Object(map) => {
                lookup_field(map, segment).ok_or_else(|| format!("can't evaluate field {segment}"))?
            }
            Value::Null => return Err(format!("nil pointer evaluating .{segment}")),
            other => return Err(format!("can't evaluate field {segment} in type {}", type_name(other))),
        };
    }
    Ok(value)
}

fn lookup_field<'a>(map: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    map.get(name).or_else(|| {
        let mut chars = name.chars();
        let first = chars.next()?;
        let lowered: String = first.to_lowercase().chain(chars).collect();
        map.get(&lowered)
    })
}

fn index_value(value: &Value, index: &Value) -> Result<Value, String> {
    match (value, index) {
        (Value::Array(items), Value::Number(n)) => {
            let i = n.as_i64().ok_or_else(|| format!("cannot index slice with {n}"))?;
            usize::try_from(i)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .ok_or_else(|| format!("error calling index: index out of range: {i}"))
        }
        (Value::Object(map), Value::String(key)) => Ok(map.get(key).cloned().unwrap_or(Value::Null)),
        (Value::Null, _) => Err("error calling index: index of untyped nil".to_string()),
        (other, index) => Err(format!(
            "error calling index: cannot index {} with {}",
            type_name(other),
            type_name(index)
        )),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "nil",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "slice",
        Value::Object(_) => "map",
    }
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("<no value>"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => out.push_str(s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push_str("map[");
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                out.push_str(key);
                out.push(':');
                write_value(out, item);
            }
            out.push(']');
        }
    }
}
