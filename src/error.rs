use serde::{Serialize, Serializer};
use thiserror::Error;

/// Stable identifiers for every recoverable turn-level failure.
///
/// These travel on the wire (`error_code`) so clients can branch on them
/// without parsing the human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    NotAnswerable,
    ColumnNotMapped,
    MissingFilterValue,
    UnsupportedMatchType,
    UnsupportedOperation,
    FilterExecutionError,
    DisplayFormatError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotInitialized => "NotInitialized",
            ErrorCode::NotAnswerable => "NotAnswerable",
            ErrorCode::ColumnNotMapped => "ColumnNotMapped",
            ErrorCode::MissingFilterValue => "MissingFilterValue",
            ErrorCode::UnsupportedMatchType => "UnsupportedMatchType",
            ErrorCode::UnsupportedOperation => "UnsupportedOperation",
            ErrorCode::FilterExecutionError => "FilterExecutionError",
            ErrorCode::DisplayFormatError => "DisplayFormatError",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Which part of the plan referenced a conceptual column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Filter,
    Count,
    ListUnique,
}

impl std::fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnRole::Filter => f.write_str("Filter Error"),
            ColumnRole::Count => f.write_str("Count Error"),
            ColumnRole::ListUnique => f.write_str("List Unique Error"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueryError {
    #[error("Chatbot not fully initialized. Please wait or check server logs.")]
    NotInitialized,

    #[error("I cannot answer that. Reason: {0}")]
    NotAnswerable(String),

    #[error("{role}: Conceptual column '{concept}' not mapped.")]
    ColumnNotMapped { role: ColumnRole, concept: String },

    #[error("Filter Error: No value for filtering '{0}'.")]
    MissingFilterValue(String),

    #[error("Unsupported match_type: '{0}'.")]
    UnsupportedMatchType(String),

    #[error("Unsupported operation: '{0}'.")]
    UnsupportedOperation(String),

    #[error("Error during filtering on '{column}': {message}")]
    FilterExecution { column: String, message: String },

    #[error("Error displaying results as table. {0}")]
    DisplayFormat(String),
}

impl QueryError {
    pub fn code(&self) -> ErrorCode {
        match self {
            QueryError::NotInitialized => ErrorCode::NotInitialized,
            QueryError::NotAnswerable(_) => ErrorCode::NotAnswerable,
            QueryError::ColumnNotMapped { .. } => ErrorCode::ColumnNotMapped,
            QueryError::MissingFilterValue(_) => ErrorCode::MissingFilterValue,
            QueryError::UnsupportedMatchType(_) => ErrorCode::UnsupportedMatchType,
            QueryError::UnsupportedOperation(_) => ErrorCode::UnsupportedOperation,
            QueryError::FilterExecution { .. } => ErrorCode::FilterExecutionError,
            QueryError::DisplayFormat(_) => ErrorCode::DisplayFormatError,
        }
    }

    pub(crate) fn not_mapped(role: ColumnRole, concept: impl Into<String>) -> Self {
        QueryError::ColumnNotMapped {
            role,
            concept: concept.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;
