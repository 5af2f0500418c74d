//! AST types for unit scripts.
//!
//! Every node carries the byte span it was parsed from so that runtime
//! exceptions and parse errors can point back into the unit's source.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// A byte range in the unit's source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// Smallest span covering both `self` and `other`.
    pub fn join(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Wrapper for carrying source span information with any value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithSpan<T> {
    pub value: T,
    pub span: Span,
}

/// Canonical AST node type; shared so function bodies can be captured cheaply.
pub type AstNode = WithSpan<Arc<Expr>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    List(Vec<AstNode>),
    Symbol(String),
    /// A dotted symbol: `self.history.count` is `Attr("self", ["history", "count"])`.
    Attr(String, Vec<String>),
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Nil,
}

impl Expr {
    pub fn type_name(&self) -> &'static str {
        match self {
            Expr::List(_) => "list form",
            Expr::Symbol(_) => "symbol",
            Expr::Attr(..) => "attribute path",
            Expr::String(_) => "string literal",
            Expr::Int(_) => "integer literal",
            Expr::Float(_) => "float literal",
            Expr::Bool(_) => "boolean literal",
            Expr::Nil => "nil",
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Expr::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[AstNode]> {
        match self {
            Expr::List(items) => Some(items),
            _ => None,
        }
    }
}

pub fn make_node(expr: Expr, span: Span) -> AstNode {
    WithSpan {
        value: Arc::new(expr),
        span,
    }
}
