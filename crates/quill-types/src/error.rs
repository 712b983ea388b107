use crate::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of parse errors collected before giving up on a source.
pub const MAX_ERRORS: usize = 20;

/// Error severity. Parsing currently only produces `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Error category, determined by error code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Lexical,
    Syntax,
}

/// Numeric error code (E100–E149).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ErrorCode(pub u16);

impl ErrorCode {
    // ── Lexical errors (E100–E119) ──
    pub const UNEXPECTED_CHARACTER: Self = Self(100);
    pub const UNTERMINATED_STRING: Self = Self(101);
    pub const INVALID_ESCAPE: Self = Self(102);
    pub const MALFORMED_NUMBER: Self = Self(103);

    // ── Syntax errors (E120–E149) ──
    pub const UNEXPECTED_TOKEN: Self = Self(120);
    pub const MISSING_TOKEN: Self = Self(121);
    pub const EXPRESSION_TOO_DEEP: Self = Self(122);
    pub const UNEXPECTED_END: Self = Self(123);

    /// Get the category for this error code.
    pub fn category(self) -> ErrorCategory {
        match self.0 {
            100..=119 => ErrorCategory::Lexical,
            _ => ErrorCategory::Syntax,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// A structured script parse error.
///
/// These are collected into a [`ParseErrors`] list and reported to the
/// caller; parsing never aborts on the first problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptError {
    /// Source name (file path or `<repl>`).
    pub file: String,
    /// Error code (e.g. E120).
    pub code: ErrorCode,
    /// Error severity.
    pub severity: Severity,
    /// Error category (derived from code).
    pub category: ErrorCategory,
    /// Human-readable error message.
    pub message: String,
    /// Source location.
    #[serde(flatten)]
    pub span: Span,
    /// The exact source line for context.
    pub source_line: String,
}

impl ScriptError {
    pub fn new(
        file: impl Into<String>,
        code: ErrorCode,
        message: impl Into<String>,
        span: Span,
        source_line: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            code,
            severity: Severity::Error,
            category: code.category(),
            message: message.into(),
            span,
            source_line: source_line.into(),
        }
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {} [{}] {}",
            self.file, self.span, self.code, self.category, self.message
        )
    }
}

impl std::error::Error for ScriptError {}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lexical => write!(f, "lexical"),
            Self::Syntax => write!(f, "syntax"),
        }
    }
}

/// The full set of errors produced while parsing one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseErrors {
    pub errors: Vec<ScriptError>,
    /// Count of all errors encountered, including those dropped past
    /// [`MAX_ERRORS`].
    pub total_errors: usize,
}

impl ParseErrors {
    /// Create an empty result (no errors).
    pub fn empty() -> Self {
        Self {
            errors: Vec::new(),
            total_errors: 0,
        }
    }

    /// Check if there are any errors.
    pub fn has_errors(&self) -> bool {
        self.total_errors > 0
    }

    /// Add an error, respecting the [`MAX_ERRORS`] limit.
    pub fn push_error(&mut self, error: ScriptError) {
        if self.errors.len() < MAX_ERRORS {
            self.errors.push(error);
        }
        self.total_errors += 1;
    }

    /// Append another error list onto this one.
    pub fn extend(&mut self, other: ParseErrors) {
        let dropped = other.total_errors.saturating_sub(other.errors.len());
        for error in other.errors {
            self.push_error(error);
        }
        self.total_errors += dropped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_categories() {
        assert_eq!(
            ErrorCode::UNEXPECTED_CHARACTER.category(),
            ErrorCategory::Lexical
        );
        assert_eq!(ErrorCode::UNEXPECTED_TOKEN.category(), ErrorCategory::Syntax);
    }

    #[test]
    fn code_display() {
        assert_eq!(format!("{}", ErrorCode::MISSING_TOKEN), "E121");
    }

    #[test]
    fn push_respects_cap() {
        let mut errors = ParseErrors::empty();
        for i in 0..MAX_ERRORS + 5 {
            errors.push_error(ScriptError::new(
                "<repl>",
                ErrorCode::UNEXPECTED_TOKEN,
                format!("error {i}"),
                Span::point(1, 1),
                "",
            ));
        }
        assert_eq!(errors.errors.len(), MAX_ERRORS);
        assert_eq!(errors.total_errors, MAX_ERRORS + 5);
        assert!(errors.has_errors());
    }
}
