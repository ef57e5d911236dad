//! Syntax module for the Sutra test dialect
//!
//! This module provides the core Abstract Syntax Tree types for representing
//! Sutra expressions with source location tracking.

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

/// Canonical AST node type; nodes are shared between closures and the suite tree.
pub type AstNode = Spanned<Arc<Expr>>;

/// The core AST node for Sutra expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    List(Vec<AstNode>),
    Symbol(String),
    Keyword(String),
    String(String),
    Number(f64),
    Bool(bool),
    Nil,
    Quote(Box<AstNode>),
}

impl Expr {
    pub fn type_name(&self) -> &'static str {
        match self {
            Expr::List(_) => "list",
            Expr::Symbol(_) => "symbol",
            Expr::Keyword(_) => "keyword",
            Expr::String(_) => "string",
            Expr::Number(_) => "number",
            Expr::Bool(_) => "boolean",
            Expr::Nil => "nil",
            Expr::Quote(_) => "quote",
        }
    }

    /// Returns the symbol name if this expression is a bare symbol.
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Expr::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Pretty-prints the expression back into source form.
    pub fn pretty(&self) -> String {
        match self {
            Expr::List(items) => {
                let inner: Vec<String> = items.iter().map(|e| e.value.pretty()).collect();
                format!("({})", inner.join(" "))
            }
            Expr::Symbol(s) => s.clone(),
            Expr::Keyword(k) => format!(":{}", k),
            Expr::String(s) => format!("{:?}", s),
            Expr::Number(n) => n.to_string(),
            Expr::Bool(b) => b.to_string(),
            Expr::Nil => "nil".to_string(),
            Expr::Quote(inner) => format!("'{}", inner.value.pretty()),
        }
    }
}

impl AstNode {
    pub fn new(expr: Expr, span: Span) -> Self {
        Spanned {
            value: Arc::new(expr),
            span,
        }
    }
}
