//! Error types for compiling and executing scripts.
//!
//! Every error is scoped to one [`Script::compile`](crate::script::Script::compile)
//! or one [`Script::execute`](crate::script::Script::execute) call; there is no
//! global error state.

use crate::context::Word;

/// A compile-time failure.  Compilation stops at the first offending token.
///
/// The `Display` form is the canonical diagnostic, e.g.
/// `Script(line 1): SyntaxError: Unexpected token ILLEGAL`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Script(line {line}): SyntaxError: {message}")]
pub struct SyntaxError {
    /// 1-based source line of the offending token.
    pub line: usize,
    pub message: String,
}

impl SyntaxError {
    pub(crate) fn new(line: usize, message: impl Into<String>) -> Self {
        SyntaxError { line, message: message.into() }
    }
}

/// A failure reported by a [`ProcessMemory`](crate::context::ProcessMemory)
/// implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    #[error("null pointer dereference")]
    Null,
    #[error("cannot read {len} byte(s) at {address:#x}")]
    Unreadable { address: Word, len: usize },
    #[error("no terminator within {max_units} unit(s) of string at {address:#x}")]
    Unterminated { address: Word, max_units: usize },
}

/// A failure while executing one statement list.
///
/// Runtime errors abort only the current invocation; the script itself is
/// untouched and may be executed again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    #[error("{name} is not defined")]
    UnboundVariable { name: String },

    #[error("invalid assignment target: {reason}")]
    InvalidLValue { reason: String },

    #[error("arg{index} is out of range (function has {count} argument slot(s))")]
    ArgumentIndexOutOfRange { index: usize, count: usize },

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: &'static str, found: String },

    #[error("format string: {0}")]
    Format(String),

    #[error("{what} of {requested} exceeds the configured limit of {limit}")]
    LimitExceeded { what: &'static str, requested: usize, limit: usize },

    #[error(transparent)]
    Memory(#[from] MemoryError),
}

impl RuntimeError {
    pub(crate) fn mismatch(expected: &'static str, found: impl Into<String>) -> Self {
        RuntimeError::TypeMismatch { expected, found: found.into() }
    }
}
