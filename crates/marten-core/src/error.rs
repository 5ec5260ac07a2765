//! Runtime error taxonomy.

use marten_gc::GcError;
use thiserror::Error;

/// Convenience alias used throughout the runtime.
pub type Result<T> = std::result::Result<T, Error>;

/// Runtime errors.
///
/// Errors unwind across the evaluator boundary; nothing here is recovered
/// from inside the core. The heap never fails except with `OutOfMemory`.
#[derive(Debug, Error)]
pub enum Error {
    /// The parser refused the input (bridged from the front end).
    #[error("SyntaxError: {0}")]
    SyntaxError(String),

    /// Runtime type mismatch.
    #[error("TypeError: {0}")]
    TypeError(String),

    /// Numeric conversion at an impossible boundary.
    #[error("RangeError: {0}")]
    RangeError(String),

    /// Unbound identifier at runtime.
    #[error("ReferenceError: {0}")]
    ReferenceError(String),

    /// Heap exhaustion after a full collection.
    #[error("{0}")]
    OutOfMemory(#[from] GcError),

    /// Invariant violation; should never surface.
    #[error("InternalError: {0}")]
    InternalError(String),
}

impl Error {
    /// Build a `TypeError`.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError(message.into())
    }

    /// Build a `RangeError`.
    pub fn range_error(message: impl Into<String>) -> Self {
        Self::RangeError(message.into())
    }

    /// Build a `ReferenceError`.
    pub fn reference_error(message: impl Into<String>) -> Self {
        Self::ReferenceError(message.into())
    }

    /// Build an `InternalError`.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }
}
