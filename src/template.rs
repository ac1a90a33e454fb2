//! Template Engine - HTML Shell Rendering
//!
//! Syntax:
//! - `@!ident!@` HTML-escaped expression
//! - `$!ident!$` raw expression
//! - `<!--(for item in list)-->` ... `<!--(end)-->`
//! - `<!--(if flag)-->` ... `<!--(else)-->` ... `<!--(end)-->`
//!
//! Anything between `@!` and `!@` that is not an identifier is literal text.
//! Rendered output is a valid template source again, which is what lets a
//! shell be rendered once at build time and then reparsed.

use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::escape::html_escape;

const ESCAPED_OPEN: &str = "@!";
const ESCAPED_CLOSE: &str = "!@";
const RAW_OPEN: &str = "$!";
const RAW_CLOSE: &str = "!$";
const DIRECTIVE_OPEN: &str = "<!--(";
const DIRECTIVE_CLOSE: &str = ")-->";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Undefined variable: {0}")]
    Undefined(String),

    #[error("Variable {name} is a {found}, expected {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Unknown directive at byte {pos}: {directive}")]
    UnknownDirective { pos: usize, directive: String },

    #[error("Unexpected {directive} at byte {pos}")]
    Unexpected { pos: usize, directive: &'static str },

    #[error("Block opened at byte {0} is never closed")]
    Unclosed(usize),

    #[error("Directive at byte {0} is missing its closing )-->")]
    UnterminatedDirective(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    List(Vec<String>),
    Flag(bool),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Text(_) => "text",
            Value::List(_) => "list",
            Value::Flag(_) => "flag",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Flag(b)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::List(items)
    }
}

pub type Variables = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Expr { name: String, escape: bool },
    For { item: String, list: String, body: Vec<Node> },
    If { cond: String, then: Vec<Node>, otherwise: Vec<Node> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut parser = Parser { src: source, pos: 0 };
        let (nodes, close) = parser.parse_nodes()?;
        match close {
            None => Ok(Self { nodes }),
            Some(Close::Else(pos)) => Err(TemplateError::Unexpected { pos, directive: "else" }),
            Some(Close::End(pos)) => Err(TemplateError::Unexpected { pos, directive: "end" }),
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Names the template reads from its variables, excluding loop bindings.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        collect_variables(&self.nodes, &mut Vec::new(), &mut names);
        names
    }

    pub fn render(&self, vars: &Variables) -> Result<String, TemplateError> {
        let mut out = String::new();
        let mut scope = Scope { globals: vars, locals: Vec::new() };
        render_nodes(&self.nodes, &mut scope, &mut out)?;
        Ok(out)
    }
}

enum Close {
    Else(usize),
    End(usize),
}

enum Directive {
    For { item: String, list: String },
    If(String),
    Else,
    End,
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    /// Parse until end of input or an `else`/`end` directive, which is
    /// consumed and returned to the enclosing block.
    fn parse_nodes(&mut self) -> Result<(Vec<Node>, Option<Close>), TemplateError> {
        let mut nodes = Vec::new();
        let mut text = String::new();

        while self.pos < self.src.len() {
            let rest = &self.src[self.pos..];
            let Some(offset) = next_tag(rest) else {
                text.push_str(rest);
                self.pos = self.src.len();
                break;
            };
            text.push_str(&rest[..offset]);
            self.pos += offset;

            if self.src[self.pos..].starts_with(DIRECTIVE_OPEN) {
                let start = self.pos;
                let body = start + DIRECTIVE_OPEN.len();
                let len = self.src[body..]
                    .find(DIRECTIVE_CLOSE)
                    .ok_or(TemplateError::UnterminatedDirective(start))?;
                let directive = parse_directive(&self.src[body..body + len], start)?;
                self.pos = body + len + DIRECTIVE_CLOSE.len();
                flush_text(&mut text, &mut nodes);

                match directive {
                    Directive::For { item, list } => {
                        let body = self.parse_block(start)?;
                        nodes.push(Node::For { item, list, body });
                    }
                    Directive::If(cond) => {
                        let (then, close) = self.parse_nodes()?;
                        let otherwise = match close {
                            Some(Close::End(_)) => vec![],
                            Some(Close::Else(_)) => self.parse_block(start)?,
                            None => return Err(TemplateError::Unclosed(start)),
                        };
                        nodes.push(Node::If { cond, then, otherwise });
                    }
                    Directive::Else => return Ok((nodes, Some(Close::Else(start)))),
                    Directive::End => return Ok((nodes, Some(Close::End(start)))),
                }
            } else {
                let (open, close, escape) = if self.src[self.pos..].starts_with(ESCAPED_OPEN) {
                    (ESCAPED_OPEN, ESCAPED_CLOSE, true)
                } else {
                    (RAW_OPEN, RAW_CLOSE, false)
                };
                let inner = self.pos + open.len();
                match self.src[inner..].find(close) {
                    Some(len) if is_ident(&self.src[inner..inner + len]) => {
                        flush_text(&mut text, &mut nodes);
                        nodes.push(Node::Expr { name: self.src[inner..inner + len].to_string(), escape });
                        self.pos = inner + len + close.len();
                    }
                    _ => {
                        text.push_str(open);
                        self.pos = inner;
                    }
                }
            }
        }

        flush_text(&mut text, &mut nodes);
        Ok((nodes, None))
    }

    /// Parse a block body that must be closed by `end`.
    fn parse_block(&mut self, start: usize) -> Result<Vec<Node>, TemplateError> {
        match self.parse_nodes()? {
            (body, Some(Close::End(_))) => Ok(body),
            (_, Some(Close::Else(pos))) => Err(TemplateError::Unexpected { pos, directive: "else" }),
            (_, None) => Err(TemplateError::Unclosed(start)),
        }
    }
}

fn next_tag(rest: &str) -> Option<usize> {
    [ESCAPED_OPEN, RAW_OPEN, DIRECTIVE_OPEN]
        .iter()
        .filter_map(|tag| rest.find(tag))
        .min()
}

fn flush_text(text: &mut String, nodes: &mut Vec<Node>) {
    if !text.is_empty() {
        nodes.push(Node::Text(std::mem::take(text)));
    }
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_directive(raw: &str, pos: usize) -> Result<Directive, TemplateError> {
    let words: Vec<&str> = raw.split_whitespace().collect();
    let directive = match words.as_slice() {
        ["for", item, "in", list] if is_ident(item) && is_ident(list) => Directive::For {
            item: item.to_string(),
            list: list.to_string(),
        },
        ["if", cond] if is_ident(cond) => Directive::If(cond.to_string()),
        ["else"] => Directive::Else,
        ["end"] => Directive::End,
        _ => {
            return Err(TemplateError::UnknownDirective { pos, directive: raw.trim().to_string() });
        }
    };
    Ok(directive)
}

fn note_free(name: &str, bound: &[String], names: &mut BTreeSet<String>) {
    if !bound.iter().any(|b| b == name) {
        names.insert(name.to_string());
    }
}

fn collect_variables(nodes: &[Node], bound: &mut Vec<String>, names: &mut BTreeSet<String>) {
    for node in nodes {
        match node {
            Node::Text(_) => {}
            Node::Expr { name, .. } => note_free(name, bound, names),
            Node::For { item, list, body } => {
                note_free(list, bound, names);
                bound.push(item.clone());
                collect_variables(body, bound, names);
                bound.pop();
            }
            Node::If { cond, then, otherwise } => {
                note_free(cond, bound, names);
                collect_variables(then, bound, names);
                collect_variables(otherwise, bound, names);
            }
        }
    }
}

enum Resolved<'a> {
    Text(&'a str),
    Value(&'a Value),
}

struct Scope<'a> {
    globals: &'a Variables,
    locals: Vec<(&'a str, &'a str)>,
}

impl<'a> Scope<'a> {
    fn lookup(&self, name: &str) -> Result<Resolved<'a>, TemplateError> {
        if let Some((_, text)) = self.locals.iter().rev().find(|(n, _)| *n == name) {
            return Ok(Resolved::Text(*text));
        }
        self.globals
            .get(name)
            .map(Resolved::Value)
            .ok_or_else(|| TemplateError::Undefined(name.to_string()))
    }
}

fn render_nodes<'a>(nodes: &'a [Node], scope: &mut Scope<'a>, out: &mut String) -> Result<(), TemplateError> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Expr { name, escape } => {
                let text = match scope.lookup(name)? {
                    Resolved::Text(s) => s.to_string(),
                    Resolved::Value(Value::Text(s)) => s.clone(),
                    Resolved::Value(Value::Flag(b)) => b.to_string(),
                    Resolved::Value(other) => {
                        return Err(TemplateError::TypeMismatch {
                            name: name.clone(),
                            expected: "text",
                            found: other.kind(),
                        });
                    }
                };
                if *escape {
                    out.push_str(&html_escape(&text));
                } else {
                    out.push_str(&text);
                }
            }
            Node::For { item, list, body } => {
                let items = match scope.lookup(list)? {
                    Resolved::Value(Value::List(items)) => items,
                    Resolved::Text(_) => {
                        return Err(TemplateError::TypeMismatch { name: list.clone(), expected: "list", found: "text" });
                    }
                    Resolved::Value(other) => {
                        return Err(TemplateError::TypeMismatch {
                            name: list.clone(),
                            expected: "list",
                            found: other.kind(),
                        });
                    }
                };
                for value in items {
                    scope.locals.push((item.as_str(), value.as_str()));
                    let rendered = render_nodes(body, scope, out);
                    scope.locals.pop();
                    rendered?;
                }
            }
            Node::If { cond, then, otherwise } => {
                let truthy = match scope.lookup(cond)? {
                    Resolved::Text(s) => !s.is_empty(),
                    Resolved::Value(Value::Text(s)) => !s.is_empty(),
                    Resolved::Value(Value::List(items)) => !items.is_empty(),
                    Resolved::Value(Value::Flag(b)) => *b,
                };
                render_nodes(if truthy { then } else { otherwise }, scope, out)?;
            }
        }
    }
    Ok(())
}
