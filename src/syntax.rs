//! Syntax module for namespacer
//!
//! This module provides the symbolic expression tree the rewriter walks, with
//! source location tracking, plus the printer that renders trees back to
//! Lisp surface syntax.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub mod parser;

/// Represents a span in the source code.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Wrapper for carrying source span information with any value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spanned<T> {
    pub value: T,
    pub span: Span,
}

/// Canonical tree node type. Sub-trees are shared, never mutated in place.
pub type AstNode = Spanned<Arc<Expr>>;

/// A symbolic expression: an atom or a list of symbolic expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    List(Vec<AstNode>),
    /// Improper list `(a b . c)`. Only ever treated as literal data.
    Dotted(Vec<AstNode>, AstNode),
    Vector(Vec<AstNode>),
    Symbol(String),
    String(String),
    Integer(i64),
    Float(f64),
    Char(char),
}

// Reader shorthands, in the order the printer checks them.
const SHORTHANDS: [(&str, &str); 5] = [
    ("quote", "'"),
    ("function", "#'"),
    ("`", "`"),
    (",@", ",@"),
    (",", ","),
];

impl Expr {
    /// Returns the symbol name if this is a symbol.
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Expr::Symbol(name) => Some(name),
            _ => None,
        }
    }

    /// Returns the items if this is a proper list.
    pub fn as_list(&self) -> Option<&[AstNode]> {
        match self {
            Expr::List(items) => Some(items),
            _ => None,
        }
    }

    /// True for `()` and the symbol `nil`, the two spellings of "nothing".
    pub fn is_nil(&self) -> bool {
        match self {
            Expr::List(items) => items.is_empty(),
            Expr::Symbol(name) => name == "nil",
            _ => false,
        }
    }

    /// Returns the head symbol of a non-empty list.
    pub fn head_symbol(&self) -> Option<&str> {
        self.as_list()?.first()?.value.as_symbol()
    }

    /// Returns the type name of this node (for diagnostics).
    pub fn type_name(&self) -> &'static str {
        match self {
            Expr::List(_) => "list",
            Expr::Dotted(..) => "dotted list",
            Expr::Vector(_) => "vector",
            Expr::Symbol(_) => "symbol",
            Expr::String(_) => "string",
            Expr::Integer(_) => "integer",
            Expr::Float(_) => "float",
            Expr::Char(_) => "character",
        }
    }

    /// Pretty-prints the expression as a string.
    pub fn pretty(&self) -> String {
        match self {
            Expr::List(items) => {
                if let Some(short) = Self::pretty_shorthand(items) {
                    return short;
                }
                format!("({})", Self::pretty_items(items))
            }
            Expr::Dotted(items, tail) => {
                format!("({} . {})", Self::pretty_items(items), tail.value.pretty())
            }
            Expr::Vector(items) => format!("[{}]", Self::pretty_items(items)),
            Expr::Symbol(name) => escape_symbol(name),
            Expr::String(s) => escape_string(s),
            Expr::Integer(n) => n.to_string(),
            Expr::Float(f) => pretty_float(*f),
            Expr::Char(c) => pretty_char(*c),
        }
    }

    fn pretty_items(items: &[AstNode]) -> String {
        items
            .iter()
            .map(|e| e.value.pretty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn pretty_shorthand(items: &[AstNode]) -> Option<String> {
        let [head, arg] = items else {
            return None;
        };
        let name = head.value.as_symbol()?;
        SHORTHANDS
            .iter()
            .find(|(form, _)| *form == name)
            .map(|(_, prefix)| format!("{}{}", prefix, arg.value.pretty()))
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.pretty())
    }
}

fn escape_symbol(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_whitespace() || "()[]\"';`,#\\".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

fn pretty_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}

fn pretty_char(c: char) -> String {
    match c {
        '\n' => "?\\n".to_string(),
        '\t' => "?\\t".to_string(),
        ' ' => "?\\s".to_string(),
        '(' | ')' | '[' | ']' | '\\' | '"' | ';' => format!("?\\{}", c),
        _ => format!("?{}", c),
    }
}

// ----------------------------------------------------------------------------
// Node constructors
// ----------------------------------------------------------------------------

/// Wraps an expression into a node carrying `span`.
pub fn spanned(expr: Expr, span: Span) -> AstNode {
    Spanned {
        value: Arc::new(expr),
        span,
    }
}

pub fn make_symbol(name: impl Into<String>, span: Span) -> AstNode {
    spanned(Expr::Symbol(name.into()), span)
}

pub fn make_list(items: Vec<AstNode>, span: Span) -> AstNode {
    spanned(Expr::List(items), span)
}

/// Builds `(quote inner)` spanning the same source as `inner`.
pub fn make_quote(inner: AstNode) -> AstNode {
    let span = inner.span;
    make_list(vec![make_symbol("quote", span), inner], span)
}

/// Renders a sequence of top-level forms, one per line.
pub fn render_forms(forms: &[AstNode]) -> String {
    forms
        .iter()
        .map(|f| f.value.pretty())
        .collect::<Vec<_>>()
        .join("\n")
}
