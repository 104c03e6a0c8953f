//! Error types and the per-translation-unit diagnostic list.
//!
//! Two kinds of failure flow through the front-end. Recoverable diagnostics
//! (syntax, typing, redefinition, ...) are appended to a `DiagnosticList`
//! with their source line and parsing continues. Fatal conditions (I/O,
//! internal invariants) are typed errors propagated with `?`.

use crate::utils::location::Span;
use std::fmt;
use thiserror::Error;

/// Fatal front-end failure.
#[derive(Error, Debug)]
pub enum FrontendError {
    /// Error during lexing/tokenization
    #[error("lexer error: {0}")]
    Lexer(#[from] LexerError),

    /// Internal invariant violation
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error during lexical analysis.
#[derive(Error, Debug, Clone)]
pub struct LexerError {
    /// The error message
    pub message: String,
    /// Location in source
    pub span: Span,
    /// The kind of lexer error
    pub kind: LexerErrorKind,
}

impl fmt::Display for LexerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.message, self.span)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexerErrorKind {
    /// Unexpected character
    UnexpectedChar,
    /// Unterminated string or character literal
    UnterminatedLiteral,
    /// Invalid number literal
    InvalidNumber,
    /// Invalid escape sequence
    InvalidEscape,
    /// Unterminated block comment
    UnterminatedComment,
}

/// The closed set of recoverable diagnostic kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagKind {
    /// "miss ';'", "expected '}'"
    Syntax,
    /// Illegal specifier combination
    Specifier,
    /// Symbol/tag/enum redefined
    Redefinition,
    /// Incomplete struct/union used, zero-size array
    Incompleteness,
    /// Type rule violation in an expression
    Typing,
    /// Initializer shape mismatch
    Initializer,
    /// Unresolved identifier, field, or label
    Lookup,
}

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A single collected diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagKind,
    /// Source line (1-indexed; 0 when unknown)
    pub line: u32,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sev = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "line {}: {}: {}", self.line, sev, self.message)
    }
}

/// Number of errors after which parse loops short-circuit.
pub const ERROR_BUDGET: usize = 30;

/// Per-translation-unit diagnostic sink.
///
/// Errors never abort parsing directly; the budget query lets the outer
/// loops stop once a run has produced enough to act on.
#[derive(Debug, Default)]
pub struct DiagnosticList {
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
}

impl DiagnosticList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an error with its source line.
    pub fn err(&mut self, line: u32, kind: DiagKind, message: impl Into<String>) {
        self.errors.push(Diagnostic {
            severity: Severity::Error,
            kind,
            line,
            message: message.into(),
        });
    }

    /// Append a warning. Warnings never alter control flow.
    pub fn warn(&mut self, line: u32, kind: DiagKind, message: impl Into<String>) {
        self.warnings.push(Diagnostic {
            severity: Severity::Warning,
            kind,
            line,
            message: message.into(),
        });
    }

    /// True once the error budget is exhausted.
    pub fn too_many_errors(&self) -> bool {
        self.errors.len() >= ERROR_BUDGET
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    /// True if at least one error with the given kind was recorded.
    pub fn has_error_kind(&self, kind: DiagKind) -> bool {
        self.errors.iter().any(|d| d.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_display() {
        let mut diags = DiagnosticList::new();
        diags.err(3, DiagKind::Syntax, "miss ';'");
        diags.warn(7, DiagKind::Lookup, "'L' unreferenced label");
        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags.warning_count(), 1);
        let s = format!("{}", diags.errors()[0]);
        assert!(s.contains("line 3"));
        assert!(s.contains("miss ';'"));
    }

    #[test]
    fn test_error_budget() {
        let mut diags = DiagnosticList::new();
        for i in 0..ERROR_BUDGET {
            diags.err(i as u32, DiagKind::Typing, "x");
        }
        assert!(diags.too_many_errors());
    }
}
