//! Shared types for the Quill scripting engine.
//!
//! This crate defines the expression AST, source spans, the structured
//! parse-error types, and the [`Color`] value shared by every other stage.

mod color;
mod error;
mod span;
pub mod ast;

pub use color::Color;
pub use error::{ErrorCategory, ErrorCode, ParseErrors, ScriptError, Severity, MAX_ERRORS};
pub use span::{SourceFile, Span};
