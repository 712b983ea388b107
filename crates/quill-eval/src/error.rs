//! Runtime error types for the Quill evaluator.
//!
//! Evaluation errors come in two flavours with one type: eager (`Err` on
//! the spot, for conditions that stop the current operation) and lazy (an
//! error-kind *value* that only surfaces the error once something forces
//! it — converts it, compares it, calls it). See `Value::error`.

use thiserror::Error;

/// An evaluation error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("no such variable: {0}")]
    NoSuchVariable(String),

    #[error("{container} has no member '{member}'")]
    NoSuchMember { container: String, member: String },

    #[error("index {index} out of range (size {size})")]
    IndexOutOfRange { index: i64, size: usize },

    #[error("can't convert {from} to {to}")]
    Conversion { from: String, to: &'static str },

    #[error("can't iterate over {0}")]
    NotIterable(String),

    #[error("{0} is not a function")]
    NotAFunction(String),

    #[error("missing argument '{name}' to function '{function}'")]
    MissingArgument { function: String, name: String },

    #[error("too many arguments to '{function}' (expected {expected}, got {got})")]
    TooManyArguments {
        function: String,
        expected: usize,
        got: usize,
    },

    #[error("malformed regular expression: {0}")]
    MalformedRegex(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("operator '{op}' cannot be applied to {left} and {right}")]
    InvalidOperands {
        op: &'static str,
        left: String,
        right: String,
    },

    #[error("operator '{op}' cannot be applied to {operand}")]
    InvalidOperand {
        op: &'static str,
        operand: String,
    },

    #[error("a list cannot mix keyed and positional entries")]
    MixedListEntries,
}

impl EvalError {
    /// Shorthand for a conversion failure from a value of type `from`.
    pub fn conversion(from: impl Into<String>, to: &'static str) -> Self {
        EvalError::Conversion {
            from: from.into(),
            to,
        }
    }
}

/// Result alias used throughout the evaluator.
pub type EvalResult<T> = Result<T, EvalError>;
