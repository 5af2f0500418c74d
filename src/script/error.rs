//! Parse-time diagnostics for unit scripts.
//!
//! Runtime failures of tested code are script exceptions (see `exceptions`),
//! never `ScriptError`s. A `ScriptError` only means the unit could not be read
//! as a program at all.

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceSpan};
use std::fmt;
use std::sync::Arc;

use crate::script::ast::Span;

// ============================================================================
// SOURCE CONTEXT - Error reporting infrastructure
// ============================================================================

/// Named source text of one unit, shared by every diagnostic raised for it.
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub name: String,
    pub content: Arc<str>,
}

impl SourceContext {
    pub fn from_file(name: impl Into<String>, content: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Use only when the real source cannot be obtained.
    pub fn fallback(context: &str) -> Self {
        Self {
            name: "fallback".to_string(),
            content: format!("; {}", context).into(),
        }
    }

    pub fn to_named_source(&self) -> Arc<NamedSource<String>> {
        Arc::new(NamedSource::new(self.name.clone(), self.content.to_string()))
    }
}

impl Default for SourceContext {
    fn default() -> Self {
        Self::fallback("default context")
    }
}

// ============================================================================
// ERROR KINDS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    MissingElement { element: String },
    MalformedConstruct { construct: String },
    InvalidLiteral { literal_type: String, value: String },
    UnexpectedToken { expected: String, found: String },
    InvalidPath { path: String },
}

impl ErrorKind {
    pub const fn code_suffix(&self) -> &'static str {
        match self {
            Self::MissingElement { .. } => "missing_element",
            Self::MalformedConstruct { .. } => "malformed_construct",
            Self::InvalidLiteral { .. } => "invalid_literal",
            Self::UnexpectedToken { .. } => "unexpected_token",
            Self::InvalidPath { .. } => "invalid_path",
        }
    }

    fn primary_label(&self) -> &'static str {
        match self {
            Self::MissingElement { .. } => "missing here",
            Self::MalformedConstruct { .. } => "malformed syntax",
            Self::InvalidLiteral { .. } => "invalid literal",
            Self::UnexpectedToken { .. } => "unexpected token",
            Self::InvalidPath { .. } => "invalid attribute path",
        }
    }
}

// ============================================================================
// SCRIPT ERROR
// ============================================================================

#[derive(Debug, Clone)]
pub struct ScriptError {
    pub kind: ErrorKind,
    pub source: Arc<NamedSource<String>>,
    pub span: SourceSpan,
    pub help: Option<String>,
}

impl std::error::Error for ScriptError {}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::MissingElement { element } => write!(f, "parse error: missing {}", element),
            ErrorKind::MalformedConstruct { construct } => {
                write!(f, "parse error: malformed {}", construct)
            }
            ErrorKind::InvalidLiteral {
                literal_type,
                value,
            } => write!(f, "parse error: invalid {} '{}'", literal_type, value),
            ErrorKind::UnexpectedToken { expected, found } => {
                write!(f, "parse error: expected {}, found {}", expected, found)
            }
            ErrorKind::InvalidPath { path } => {
                write!(f, "parse error: invalid attribute path '{}'", path)
            }
        }
    }
}

impl Diagnostic for ScriptError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(format!("verdict::script::{}", self.kind.code_suffix())))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let label = LabeledSpan::new_with_span(Some(self.kind.primary_label().into()), self.span);
        Some(Box::new(std::iter::once(label)))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&*self.source)
    }
}

/// Context-aware error creation.
pub trait ErrorReporting {
    fn report(&self, kind: ErrorKind, span: SourceSpan) -> ScriptError;

    fn missing_element(&self, element: &str, span: SourceSpan) -> ScriptError {
        self.report(
            ErrorKind::MissingElement {
                element: element.into(),
            },
            span,
        )
    }

    fn malformed(&self, construct: &str, span: SourceSpan) -> ScriptError {
        self.report(
            ErrorKind::MalformedConstruct {
                construct: construct.into(),
            },
            span,
        )
    }
}

impl ErrorReporting for SourceContext {
    fn report(&self, kind: ErrorKind, span: SourceSpan) -> ScriptError {
        ScriptError {
            kind,
            source: self.to_named_source(),
            span,
            help: None,
        }
    }
}

pub fn to_source_span(span: Span) -> SourceSpan {
    SourceSpan::from(span.start..span.end)
}
