//! Error and diagnostic types for the Forma core.
//!
//! Two tiers:
//! - [`ParseError`] — fatal syntax failures from the lexer/parser. A file
//!   that fails to parse produces no IR.
//! - [`Diagnostic`] — structural errors and warnings accumulated by the
//!   validator. Validation always completes and returns every diagnostic
//!   it can find.
//!
//! Diagnostic codes are a stable contract: downstream tooling pattern-matches
//! on them, so changing a code's meaning is a breaking change.

use serde::Serialize;

use crate::parser::tokenizer::Span;

/// Result type alias for fallible core operations.
pub type Result<T> = std::result::Result<T, ParseError>;

/// A fatal syntax error with source position.
///
/// Carries `E000` for lexer/parser failures, or `E010` for an unknown
/// top-level form keyword.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("error[{code}]: {message} (line {line}, column {column})")]
pub struct ParseError {
    pub code: DiagnosticCode,
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    pub fn new(code: DiagnosticCode, message: impl Into<String>, span: &Span) -> Self {
        ParseError {
            code,
            message: message.into(),
            line: span.line,
            column: span.column,
        }
    }
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// Stable diagnostic codes.
///
/// E-codes mean the model cannot safely be used for generation; W-codes are
/// advisory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[allow(clippy::upper_case_acronyms)]
pub enum DiagnosticCode {
    /// Lexer/parser syntax failure
    E000,
    /// `meta` section missing
    E001,
    /// `meta.name` missing or empty
    E002,
    /// `meta.version` missing or empty
    E003,
    /// `meta.namespace` is not a non-empty dotted identifier
    E004,
    /// Unknown top-level form keyword
    E010,
    /// Empty or ill-formed type expression
    E041,
    /// Mixin name used as a field type
    E042,
    /// Choice has fewer than 2 variants
    E050,
    /// Parenthesized variant body with no fields
    E051,
    /// Duplicate variant name within a choice
    E052,
    /// Malformed `common` block
    E053,
    /// Mixin declares no fields
    E060,
    /// Shape has no fields after mixin expansion
    E070,
    /// Shape references an unknown mixin
    E084,
    /// Generic mixin arity mismatch
    E086,
    /// Field collision between composed mixins
    E090,
    /// Circular mixin composition
    E091,
    /// Mixin includes an unknown mixin
    E092,
    /// Same name declared in two sections
    E100,
    /// Shape field shadows a mixin field
    W012,
    /// `meta.description` missing
    W013,
    /// Named wrapper type (e.g. `tree<T>`)
    W015,
    /// Declared section is empty
    W017,
    /// Nullable element inside a collection, association, or wrapper
    W019,
}

impl DiagnosticCode {
    /// The severity implied by the code prefix.
    pub fn severity(self) -> Severity {
        use DiagnosticCode::*;
        match self {
            W012 | W013 | W015 | W017 | W019 => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A single validation error or warning.
///
/// `location` is a dotted path into the model (`shapes.Foo.fields.x`);
/// `span` is the source position of the offending declaration when known.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub location: String,
    pub message: String,
    pub span: Option<Span>,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, message: impl Into<String>, location: impl Into<String>) -> Self {
        Diagnostic {
            code,
            severity: code.severity(),
            location: location.into(),
            message: message.into(),
            span: None,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)?;
        match &self.span {
            Some(span) => write!(f, "\n  --> {} (at {})", self.location, span),
            None => write!(f, "\n  --> {}", self.location),
        }
    }
}
