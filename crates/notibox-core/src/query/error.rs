//! Error types for the query language.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// A specialized Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Category of a user-facing validation problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    UnterminatedQuote,
    UnbalancedParen,
    UnknownField,
    EmptyGroup,
    MissingValue,
    InvalidValue,
    NotNegatable,
    DanglingOperator,
}

/// A problem found while parsing a query string.
///
/// Validation errors never abort parsing; they are collected next to the
/// best-effort AST so that callers can show them inline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    /// Byte offset into the query string.
    pub position: usize,
    pub message: String,
}

impl ValidationError {
    pub fn new(kind: ValidationErrorKind, position: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            position,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at {})", self.message, self.position)
    }
}

/// Errors returned by query entry points that refuse partial results.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    /// The query string had validation errors.
    #[error("invalid query: {}", join_messages(.errors))]
    Invalid { errors: Vec<ValidationError> },

    /// The AST contains a construct the compiler cannot express.
    #[error("cannot build query: {0}")]
    Build(String),
}

impl QueryError {
    /// Creates an invalid-query error from collected validation errors.
    pub fn invalid(errors: Vec<ValidationError>) -> Self {
        QueryError::Invalid { errors }
    }

    /// Returns the validation errors, if this is an invalid-query error.
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            QueryError::Invalid { errors } => errors,
            QueryError::Build(_) => &[],
        }
    }
}

fn join_messages(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_error_joins_messages() {
        let err = QueryError::invalid(vec![
            ValidationError::new(ValidationErrorKind::UnknownField, 0, "unknown field: foo"),
            ValidationError::new(ValidationErrorKind::EmptyGroup, 8, "empty group"),
        ]);
        assert_eq!(err.to_string(), "invalid query: unknown field: foo; empty group");
        assert_eq!(err.validation_errors().len(), 2);
    }

    #[test]
    fn test_validation_error_serializes_kind_in_snake_case() {
        let err = ValidationError::new(ValidationErrorKind::UnterminatedQuote, 3, "x");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "unterminated_quote");
        assert_eq!(json["position"], 3);
    }
}
