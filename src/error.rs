//! Error types for mongoqs.

use thiserror::Error;

/// The main error type for query compilation.
#[derive(Debug, Error)]
pub enum QueryError {
    /// An expression is empty or names an empty relation or field.
    #[error("Malformed populate expression '{expression}': {reason}")]
    MalformedExpression { expression: String, reason: String },

    /// A dot-qualified segment appears before the end of an expression.
    #[error("Field selection '{segment}' must be the last segment of '{expression}'")]
    MisplacedLeafSegment { expression: String, segment: String },

    /// Relation name listed in the configured blacklist.
    #[error("Populating '{0}' is not allowed")]
    Forbidden(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error reported by the filter compiler.
    #[error("Filter error: {0}")]
    Filter(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl QueryError {
    /// Create a malformed expression error.
    pub fn malformed(expression: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedExpression {
            expression: expression.into(),
            reason: reason.into(),
        }
    }

    /// Create a misplaced leaf segment error.
    pub fn misplaced(expression: impl Into<String>, segment: impl Into<String>) -> Self {
        Self::MisplacedLeafSegment {
            expression: expression.into(),
            segment: segment.into(),
        }
    }
}

/// Result type alias for query compilation.
pub type QueryResult<T> = Result<T, QueryError>;
