//! # Overview
//!
//! This module defines the unified, `miette`-based diagnostic system for the
//! rewriter. Every failure mode of the reader, the rewrite pass, the host
//! environment and the CLI is represented by [`NamesError`].
//!
//! # Error Construction Macros
//!
//! - **Use `err_msg!` for message-only errors.**
//!   - `err_msg!(Configuration, "Unknown option '{}'", flag)`
//!
//! - **Use `err_span!` when the offending form is at hand.**
//!   - `err_span!(MalformedForm, form.span, "Bindings must be a list")`
//!
//! Source text is attached late, by whoever owns it (the reader or the CLI),
//! through [`NamesError::with_source`]. The rewriter itself never sees text.

use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceCode};
use thiserror::Error;

use crate::syntax::Span;

pub type SourceArc = Arc<NamedSource<String>>;
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Type-safe error classification that corresponds to `NamesError` variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// Reader errors: unbalanced delimiters, bad literals
    Parse,
    /// Unrecognised option flag or invalid namespace name
    Configuration,
    /// A name expression could not be evaluated statically
    Evaluation,
    /// Host macro expansion was requested on something that is not a macro
    HostExpansion,
    /// A form with bespoke scoping rules does not have the expected shape
    MalformedForm,
    /// Nesting or macro expansion went deeper than the rewriter allows
    RecursionLimit,
    /// File system access failed
    Io,
    /// Internal engine errors
    Internal,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Parse => "Parse",
            ErrorType::Configuration => "Configuration",
            ErrorType::Evaluation => "Evaluation",
            ErrorType::HostExpansion => "HostExpansion",
            ErrorType::MalformedForm => "MalformedForm",
            ErrorType::RecursionLimit => "RecursionLimit",
            ErrorType::Io => "Io",
            ErrorType::Internal => "Internal",
        }
    }
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Minimal, composable error context for diagnostics.
#[derive(Debug, Default)]
pub struct ErrorContext {
    /// The source text the span points into (if known).
    pub source: Option<SourceArc>,
    /// The span of the offending form (if known).
    pub span: Option<Span>,
    /// An optional help message.
    pub help: Option<String>,
}

impl ErrorContext {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_span(span: Span) -> Self {
        Self {
            span: Some(span),
            ..Self::default()
        }
    }
}

/// Unified error type for every failure mode of the rewrite pipeline.
#[derive(Debug, Error)]
pub enum NamesError {
    #[error("Parse error: {message}")]
    Parse {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<BoxedCause>,
    },
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<BoxedCause>,
    },
    #[error("Evaluation error: {message}")]
    Evaluation {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<BoxedCause>,
    },
    #[error("Macro expansion error: {message}")]
    HostExpansion {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<BoxedCause>,
    },
    #[error("Malformed form: {message}")]
    MalformedForm {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<BoxedCause>,
    },
    #[error("Recursion limit exceeded: {message}")]
    RecursionLimit {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<BoxedCause>,
    },
    #[error("I/O error: {message}")]
    Io {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<BoxedCause>,
    },
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<BoxedCause>,
    },
}

impl NamesError {
    fn parts(&self) -> (&str, &ErrorContext) {
        match self {
            NamesError::Parse { message, ctx, .. }
            | NamesError::Configuration { message, ctx, .. }
            | NamesError::Evaluation { message, ctx, .. }
            | NamesError::HostExpansion { message, ctx, .. }
            | NamesError::MalformedForm { message, ctx, .. }
            | NamesError::RecursionLimit { message, ctx, .. }
            | NamesError::Io { message, ctx, .. }
            | NamesError::Internal { message, ctx, .. } => (message, ctx),
        }
    }

    fn ctx_mut(&mut self) -> &mut ErrorContext {
        match self {
            NamesError::Parse { ctx, .. }
            | NamesError::Configuration { ctx, .. }
            | NamesError::Evaluation { ctx, .. }
            | NamesError::HostExpansion { ctx, .. }
            | NamesError::MalformedForm { ctx, .. }
            | NamesError::RecursionLimit { ctx, .. }
            | NamesError::Io { ctx, .. }
            | NamesError::Internal { ctx, .. } => ctx,
        }
    }

    fn cause_mut(&mut self) -> &mut Option<BoxedCause> {
        match self {
            NamesError::Parse { source, .. }
            | NamesError::Configuration { source, .. }
            | NamesError::Evaluation { source, .. }
            | NamesError::HostExpansion { source, .. }
            | NamesError::MalformedForm { source, .. }
            | NamesError::RecursionLimit { source, .. }
            | NamesError::Io { source, .. }
            | NamesError::Internal { source, .. } => source,
        }
    }

    /// Returns the type-safe error classification for this error.
    pub fn error_type(&self) -> ErrorType {
        match self {
            NamesError::Parse { .. } => ErrorType::Parse,
            NamesError::Configuration { .. } => ErrorType::Configuration,
            NamesError::Evaluation { .. } => ErrorType::Evaluation,
            NamesError::HostExpansion { .. } => ErrorType::HostExpansion,
            NamesError::MalformedForm { .. } => ErrorType::MalformedForm,
            NamesError::RecursionLimit { .. } => ErrorType::RecursionLimit,
            NamesError::Io { .. } => ErrorType::Io,
            NamesError::Internal { .. } => ErrorType::Internal,
        }
    }

    /// The bare message, without the variant prefix.
    pub fn message(&self) -> &str {
        self.parts().0
    }

    /// The span of the offending form, if one was recorded.
    pub fn span(&self) -> Option<Span> {
        self.parts().1.span
    }

    /// Records `span` unless the error already points somewhere more precise.
    pub fn at(mut self, span: Span) -> Self {
        let ctx = self.ctx_mut();
        if ctx.span.is_none() {
            ctx.span = Some(span);
        }
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.ctx_mut().help = Some(help.into());
        self
    }

    pub fn with_cause(mut self, cause: impl Into<BoxedCause>) -> Self {
        *self.cause_mut() = Some(cause.into());
        self
    }

    /// Attaches the source text the span points into, if none is attached yet.
    pub fn with_source(self, name: &str, text: &str) -> Self {
        self.with_context_source(to_error_source(name, text))
    }

    pub fn with_context_source(mut self, source: SourceArc) -> Self {
        let ctx = self.ctx_mut();
        if ctx.source.is_none() {
            ctx.source = Some(source);
        }
        self
    }
}

impl Diagnostic for NamesError {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        Some(Box::new(format!(
            "namespacer::{}",
            self.error_type().as_str().to_lowercase()
        )))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        self.parts()
            .1
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn std::fmt::Display + 'a>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.parts()
            .1
            .source
            .as_ref()
            .map(|s| s.as_ref() as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let (message, ctx) = self.parts();
        // Labels without source text cannot be rendered.
        let source_len = ctx.source.as_ref()?.inner().len();
        let span = ctx.span?;
        let start = span.start.min(source_len);
        let len = span.end.saturating_sub(span.start).max(1).min(source_len - start);
        let label = LabeledSpan::new(Some(message.to_string()), start, len);
        Some(Box::new(std::iter::once(label)))
    }
}

impl From<std::io::Error> for NamesError {
    fn from(e: std::io::Error) -> Self {
        crate::err_msg!(Io, "{}", e).with_cause(e)
    }
}

/// Converts source text into an `Arc<NamedSource<String>>` for error contexts.
pub fn to_error_source(name: &str, source: &str) -> SourceArc {
    Arc::new(NamedSource::new(name, source.to_string()))
}

/// Constructs a `NamesError` variant with a formatted message and no context.
#[macro_export]
macro_rules! err_msg {
    ($variant:ident, $($arg:tt)+) => {
        $crate::NamesError::$variant {
            message: format!($($arg)+),
            ctx: $crate::diagnostics::ErrorContext::none(),
            source: None,
        }
    };
}

/// Constructs a `NamesError` variant pointing at `span`.
#[macro_export]
macro_rules! err_span {
    ($variant:ident, $span:expr, $($arg:tt)+) => {
        $crate::NamesError::$variant {
            message: format!($($arg)+),
            ctx: $crate::diagnostics::ErrorContext::with_span($span),
            source: None,
        }
    };
}

#[cfg(test)]
mod diagnostics_tests {
    use miette::Report;

    use super::*;

    #[test]
    fn report_includes_label_and_help() {
        let err = crate::err_span!(MalformedForm, Span { start: 1, end: 4 }, "bad let")
            .with_help("Bindings must be a list.")
            .with_source("file.el", "(let x)");
        let output = format!("{:?}", Report::new(err));
        assert!(output.contains("bad let"));
        assert!(output.contains("Bindings must be a list."));
    }

    #[test]
    fn at_keeps_the_innermost_span() {
        let inner = Span { start: 3, end: 5 };
        let outer = Span { start: 0, end: 10 };
        let err = crate::err_span!(Evaluation, inner, "nope").at(outer);
        assert_eq!(err.span(), Some(inner));
    }

    #[test]
    fn error_chaining_keeps_the_cause() {
        let cause = crate::err_msg!(HostExpansion, "not a macro");
        let err = crate::err_msg!(Evaluation, "outer").with_cause(cause);
        let output = format!("{:?}", Report::new(err));
        assert!(output.contains("outer"));
        assert!(output.contains("not a macro"));
    }

    #[test]
    fn error_type_matches_variant() {
        let err = crate::err_msg!(Configuration, "Unknown option '{}'", ":frob");
        assert_eq!(err.error_type(), ErrorType::Configuration);
        assert_eq!(err.message(), "Unknown option ':frob'");
        assert_eq!(err.to_string(), "Configuration error: Unknown option ':frob'");
    }
}
