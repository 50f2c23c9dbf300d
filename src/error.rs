//! Error types for relsql.
//!
//! Every failure is fatal to the compilation call that raised it: no SQL text
//! is produced once an error has been returned.

use thiserror::Error;

/// The main error type for compilation.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A node kind or shape this backend does not translate.
    #[error("{0}")]
    Unsupported(String),

    /// A mutation plan the DML rewrite layer cannot express.
    #[error("Malformed DML: {0}")]
    MalformedDml(String),

    /// Wrong number of arguments for a builtin.
    #[error("Invalid argument count for {function}: expected {expected}, got {actual}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    /// A builtin used with arguments it cannot accept.
    #[error("Invalid use of {function}: {message}")]
    InvalidFunction { function: String, message: String },

    /// A primitive kind without a backend spelling.
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    /// A column mapped to more than one target.
    #[error("Column {0} is mapped twice")]
    AmbiguousMapping(String),

    /// A variable reference with no enclosing binding.
    #[error("Unknown binding: '{0}'")]
    UnknownBinding(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompileError {
    /// A construct with no translation in this backend.
    pub fn unsupported(what: impl std::fmt::Display) -> Self {
        Self::Unsupported(format!("{} is not supported", what))
    }

    /// A construct that could be translated but is not yet.
    pub fn not_implemented(what: impl std::fmt::Display) -> Self {
        Self::Unsupported(format!("{} is not implemented", what))
    }

    pub fn dml(message: impl Into<String>) -> Self {
        Self::MalformedDml(message.into())
    }

    pub fn arguments(function: impl Into<String>, expected: impl Into<String>, actual: usize) -> Self {
        Self::ArgumentCount {
            function: function.into(),
            expected: expected.into(),
            actual,
        }
    }

    pub fn function(function: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidFunction {
            function: function.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for compilation.
pub type CompileResult<T> = Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CompileError::arguments("Substring", "3", 2);
        assert_eq!(
            err.to_string(),
            "Invalid argument count for Substring: expected 3, got 2"
        );
        assert_eq!(
            CompileError::unsupported("Navigate").to_string(),
            "Navigate is not supported"
        );
        assert_eq!(
            CompileError::dml("zero columns").to_string(),
            "Malformed DML: zero columns"
        );
    }
}
