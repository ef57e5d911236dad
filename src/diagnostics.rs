//!
//! ****************************************************************************************
//! ** ERROR CONSTRUCTION RULES FOR `err_msg!` AND `err_src!`                              **
//! ****************************************************************************************
//!
//! # Overview
//!
//! Every failure produced while parsing, loading, evaluating or asserting is a
//! [`SutraError`]. The variant is the classification ([`ErrorType`]); the
//! [`ErrorContext`] carries the named source, span and optional help used by
//! `miette` to render a diagnostic.
//!
//! # Construction Macros
//!
//! - **Use `err_msg!` for errors without a source location.**
//!   - `err_msg!(Eval, "Division by zero")`
//!   - `err_msg!(TypeError, "expected Number, got {}", value.type_name())`
//!
//! - **Use `err_src!` when the failing node is known.**
//!   - `err_src!(Eval, "Undefined symbol", &source, span)`
//!   - `err_src!(Eval, "Undefined symbol", &source, span, "did you forget a define?")`
//!
//! - **Never build `ErrorContext` by hand at a call site.** Attach a location
//!   to an existing error with [`SutraError::at`] instead.
//!
//! ****************************************************************************************

use std::fmt;
use std::sync::Arc;

use miette::{Diagnostic, GraphicalReportHandler, GraphicalTheme, LabeledSpan, NamedSource, SourceCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::syntax::Span;

pub type SourceArc = Arc<NamedSource<String>>;

/// Type-safe error classification corresponding to `SutraError` variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// Invalid syntax, unmatched delimiters, bad escapes
    Parse,
    /// Runtime failures raised by evaluated code
    Eval,
    /// Operand type mismatches
    TypeError,
    /// Failed expectations raised by the matcher library
    Assertion,
    /// A module or test file could not be resolved, read or executed
    Load,
    /// A test exceeded its deadline
    Timeout,
    /// The run was cancelled while this code was executing
    Cancelled,
    /// Engine bugs
    Internal,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Parse => "Parse",
            ErrorType::Eval => "Eval",
            ErrorType::TypeError => "TypeError",
            ErrorType::Assertion => "Assertion",
            ErrorType::Load => "Load",
            ErrorType::Timeout => "Timeout",
            ErrorType::Cancelled => "Cancelled",
            ErrorType::Internal => "Internal",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Minimal, composable error context for diagnostics.
#[derive(Debug, Default, Clone)]
pub struct ErrorContext {
    pub source: Option<SourceArc>,
    pub span: Option<Span>,
    pub help: Option<String>,
}

impl ErrorContext {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_source_and_span(source: SourceArc, span: Span) -> Self {
        Self {
            source: Some(source),
            span: Some(span),
            help: None,
        }
    }

    pub fn with_all(source: SourceArc, span: Span, help: String) -> Self {
        Self {
            source: Some(source),
            span: Some(span),
            help: Some(help),
        }
    }
}

/// Unified error type for every failure mode of the runner.
#[derive(Debug, Error)]
pub enum SutraError {
    #[error("Parse error: {message}")]
    Parse {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Error: {message}")]
    Eval {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("TypeError: {message}")]
    TypeError {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("{message}")]
    Assertion {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("{message}")]
    Load {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("{message}")]
    Timeout {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("{message}")]
    Cancelled {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
}

impl SutraError {
    fn parts(&self) -> (&String, &ErrorContext) {
        match self {
            SutraError::Parse { message, ctx, .. }
            | SutraError::Eval { message, ctx, .. }
            | SutraError::TypeError { message, ctx, .. }
            | SutraError::Assertion { message, ctx, .. }
            | SutraError::Load { message, ctx, .. }
            | SutraError::Timeout { message, ctx, .. }
            | SutraError::Cancelled { message, ctx, .. }
            | SutraError::Internal { message, ctx, .. } => (message, ctx),
        }
    }

    fn ctx_mut(&mut self) -> &mut ErrorContext {
        match self {
            SutraError::Parse { ctx, .. }
            | SutraError::Eval { ctx, .. }
            | SutraError::TypeError { ctx, .. }
            | SutraError::Assertion { ctx, .. }
            | SutraError::Load { ctx, .. }
            | SutraError::Timeout { ctx, .. }
            | SutraError::Cancelled { ctx, .. }
            | SutraError::Internal { ctx, .. } => ctx,
        }
    }

    /// Returns the type-safe error classification for this error.
    pub fn error_type(&self) -> ErrorType {
        match self {
            SutraError::Parse { .. } => ErrorType::Parse,
            SutraError::Eval { .. } => ErrorType::Eval,
            SutraError::TypeError { .. } => ErrorType::TypeError,
            SutraError::Assertion { .. } => ErrorType::Assertion,
            SutraError::Load { .. } => ErrorType::Load,
            SutraError::Timeout { .. } => ErrorType::Timeout,
            SutraError::Cancelled { .. } => ErrorType::Cancelled,
            SutraError::Internal { .. } => ErrorType::Internal,
        }
    }

    /// The bare message, without the variant prefix used by `Display`.
    pub fn message(&self) -> &str {
        self.parts().0
    }

    pub fn context(&self) -> &ErrorContext {
        self.parts().1
    }

    /// A copy with the same variant, message and context; the source chain is dropped.
    pub fn duplicate(&self) -> Self {
        let (message, ctx) = self.parts();
        let (message, ctx, source) = (message.clone(), ctx.clone(), None);
        match self {
            SutraError::Parse { .. } => SutraError::Parse { message, ctx, source },
            SutraError::Eval { .. } => SutraError::Eval { message, ctx, source },
            SutraError::TypeError { .. } => SutraError::TypeError { message, ctx, source },
            SutraError::Assertion { .. } => SutraError::Assertion { message, ctx, source },
            SutraError::Load { .. } => SutraError::Load { message, ctx, source },
            SutraError::Timeout { .. } => SutraError::Timeout { message, ctx, source },
            SutraError::Cancelled { .. } => SutraError::Cancelled { message, ctx, source },
            SutraError::Internal { .. } => SutraError::Internal { message, ctx, source },
        }
    }

    /// Attaches a location if the error does not carry one yet.
    ///
    /// Errors raised deep inside atoms have no span; the evaluator pins them
    /// to the innermost call that produced them.
    pub fn at(mut self, source: &SourceArc, span: Span) -> Self {
        let ctx = self.ctx_mut();
        if ctx.span.is_none() {
            ctx.source = Some(Arc::clone(source));
            ctx.span = Some(span);
        }
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.ctx_mut().help = Some(help.into());
        self
    }

    /// `file:line:col` of the primary span, when known.
    pub fn location(&self) -> Option<String> {
        let ctx = self.context();
        let (source, span) = (ctx.source.as_ref()?, ctx.span?);
        let (line, col) = line_col(source.inner(), span.start);
        Some(format!("{}:{}:{}", source.name(), line, col))
    }

    /// The display message followed by its location, as stored in results.
    pub fn located_message(&self) -> String {
        match self.location() {
            Some(location) => format!("{}\n    at {}", self, location),
            None => self.to_string(),
        }
    }

    /// Renders the full graphical diagnostic (no colors).
    pub fn render(&self) -> String {
        let mut out = String::new();
        let handler = GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor());
        if handler.render_report(&mut out, self).is_err() {
            return self.located_message();
        }
        out
    }
}

impl Diagnostic for SutraError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(format!("sutra::{}", self.error_type().as_str().to_lowercase())))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.context()
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display + 'a>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.context()
            .source
            .as_ref()
            .map(|s| s.as_ref() as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let (message, ctx) = self.parts();
        let span = ctx.span?;
        let len = if span.end > span.start {
            span.end - span.start
        } else {
            1
        };
        let label = LabeledSpan::new(Some(message.clone()), span.start, len);
        Some(Box::new(std::iter::once(label)))
    }
}

/// 1-based line and column of a byte offset.
pub fn line_col(text: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(text.len());
    let before = &text[..offset];
    let line = before.matches('\n').count() + 1;
    let col = match before.rfind('\n') {
        Some(nl) => before[nl + 1..].chars().count() + 1,
        None => before.chars().count() + 1,
    };
    (line, col)
}

/// Builds the named source used for diagnostics of one file.
pub fn to_error_source(name: impl Into<String>, text: impl Into<String>) -> SourceArc {
    Arc::new(NamedSource::new(name.into(), text.into()))
}

/// Constructs a SutraError variant with a formatted message and no context.
#[macro_export]
macro_rules! err_msg {
    ($variant:ident, $msg:literal $(, $arg:expr)* $(,)?) => {
        $crate::SutraError::$variant {
            message: format!($msg $(, $arg)*),
            ctx: $crate::ErrorContext::none(),
            source: None,
        }
    };
    ($variant:ident, $msg:expr) => {
        $crate::SutraError::$variant {
            message: ($msg).to_string(),
            ctx: $crate::ErrorContext::none(),
            source: None,
        }
    };
}

/// Constructs a SutraError variant pinned to a source and span, with optional help.
#[macro_export]
macro_rules! err_src {
    ($variant:ident, $msg:expr, $src:expr, $span:expr, $help:expr) => {
        $crate::SutraError::$variant {
            message: ($msg).to_string(),
            ctx: $crate::ErrorContext::with_all(
                $crate::diagnostics::SourceArc::clone($src),
                $span,
                format!("{}", $help),
            ),
            source: None,
        }
    };
    ($variant:ident, $msg:expr, $src:expr, $span:expr) => {
        $crate::SutraError::$variant {
            message: ($msg).to_string(),
            ctx: $crate::ErrorContext::with_source_and_span(
                $crate::diagnostics::SourceArc::clone($src),
                $span,
            ),
            source: None,
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_counts_from_one() {
        let text = "(a)\n  (b c)";
        assert_eq!(line_col(text, 0), (1, 1));
        assert_eq!(line_col(text, 6), (2, 3));
    }

    #[test]
    fn at_keeps_the_innermost_location() {
        let first = to_error_source("inner.sutra", "(boom)");
        let second = to_error_source("outer.sutra", "\n(call)");
        let err = err_msg!(Eval, "boom")
            .at(&first, Span { start: 1, end: 5 })
            .at(&second, Span { start: 1, end: 7 });
        assert_eq!(err.location().as_deref(), Some("inner.sutra:1:2"));
        assert_eq!(err.located_message(), "Error: boom\n    at inner.sutra:1:2");
    }

    #[test]
    fn macros_format_arguments() {
        let name = "x";
        let err = err_msg!(TypeError, "expected Number, got {}", name);
        assert_eq!(err.error_type(), ErrorType::TypeError);
        assert_eq!(err.message(), "expected Number, got x");
        let owned = String::from("plain");
        assert_eq!(err_msg!(Internal, owned).to_string(), "Internal error: plain");
    }

    #[test]
    fn source_chain_is_optional() {
        use std::error::Error as _;

        assert!(err_msg!(Load, "plain").source().is_none());
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = SutraError::Load {
            message: "Cannot read module".to_string(),
            ctx: ErrorContext::none(),
            source: Some(Box::new(io)),
        };
        assert_eq!(err.source().map(|e| e.to_string()).as_deref(), Some("gone"));
        assert!(err.duplicate().source().is_none());
    }
}
