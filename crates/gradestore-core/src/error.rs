//! Error types and exit codes for gradestore
//!
//! Exit codes:
//! - 0: Success
//! - 1: Generic failure
//! - 2: Usage error (bad flags/args)
//! - 3: Data/store error (missing store, missing grade, malformed record, conflict)

mod macros;

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the gradestore CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Success (0)
    Success = 0,
    /// Generic failure (1)
    Failure = 1,
    /// Usage error - bad flags/args (2)
    Usage = 2,
    /// Data/store error (3)
    Data = 3,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

/// One item of a bulk insert that collided with an existing grade row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictEntry {
    /// Position of the item in the submitted batch
    pub index: usize,
    pub user_id: i64,
    pub usage_key: String,
}

impl fmt::Display for ConflictEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} (user {}, {})",
            self.index, self.user_id, self.usage_key
        )
    }
}

fn join_conflicts(conflicts: &[ConflictEntry]) -> String {
    conflicts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<rusqlite::Error> for GradeError {
    fn from(err: rusqlite::Error) -> Self {
        GradeError::Other(err.to_string())
    }
}

/// Errors that can occur during grade persistence operations
#[derive(Error, Debug)]
pub enum GradeError {
    // Usage errors (exit code 2)
    #[error("unknown format: {0} (expected: human, json, or records)")]
    UnknownFormat(String),

    #[error("{0}")]
    UsageError(String),

    #[error("invalid {context}: {value}")]
    InvalidValue { context: String, value: String },

    // Data/store errors (exit code 3)
    #[error("store not found (searched from {search_root:?})")]
    StoreNotFound { search_root: PathBuf },

    #[error("invalid store: {reason}")]
    InvalidStore { reason: String },

    #[error("malformed block record set: {reason}")]
    MalformedRecord { reason: String },

    #[error("{context} not found: {value}")]
    NotFound { context: String, value: String },

    #[error("{context} already exists: {value}")]
    AlreadyExists { context: String, value: String },

    #[error("bulk create rejected, {} conflicting grade(s): {}", conflicts.len(), join_conflicts(conflicts))]
    Conflict { conflicts: Vec<ConflictEntry> },

    // Programmer errors (exit code 1)
    #[error("structural mismatch: {reason}")]
    StructuralMismatch { reason: String },

    #[error("persistent grades are disabled for course {course_id}")]
    PersistenceDisabled { course_id: String },

    // Generic failures (exit code 1)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to {operation}: {reason}")]
    FailedOperation { operation: String, reason: String },

    #[error("{0}")]
    Other(String),
}

impl GradeError {
    /// Create an error for a failed database operation
    pub fn db_operation(operation: &str, error: impl fmt::Display) -> Self {
        GradeError::FailedOperation {
            operation: operation.to_string(),
            reason: error.to_string(),
        }
    }

    /// Create an error for a failed transaction operation
    pub fn transaction(operation: &str, error: impl fmt::Display) -> Self {
        GradeError::FailedOperation {
            operation: format!("{} transaction", operation),
            reason: error.to_string(),
        }
    }

    /// Create an error for a malformed serialized block set
    pub fn malformed(reason: impl Into<String>) -> Self {
        GradeError::MalformedRecord {
            reason: reason.into(),
        }
    }

    /// Create an error for a programmer-supplied structure that does not fit
    pub fn structural(reason: impl Into<String>) -> Self {
        GradeError::StructuralMismatch {
            reason: reason.into(),
        }
    }

    /// Create an error for an invalid value or configuration
    pub fn invalid_value(context: &str, value: impl fmt::Display) -> Self {
        GradeError::InvalidValue {
            context: context.to_string(),
            value: value.to_string(),
        }
    }

    /// Create an error for an entity that already exists
    pub fn already_exists(context: &str, value: impl fmt::Display) -> Self {
        GradeError::AlreadyExists {
            context: context.to_string(),
            value: value.to_string(),
        }
    }

    /// Create an error for an entity that was not found
    pub fn not_found(context: &str, value: impl fmt::Display) -> Self {
        GradeError::NotFound {
            context: context.to_string(),
            value: value.to_string(),
        }
    }

    /// True for the one error the factory treats as "no cached grade".
    pub fn is_not_found(&self) -> bool {
        matches!(self, GradeError::NotFound { .. })
    }

    /// Get the appropriate exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        match self {
            GradeError::UnknownFormat(_)
            | GradeError::UsageError(_)
            | GradeError::InvalidValue { .. } => ExitCode::Usage,

            GradeError::StoreNotFound { .. }
            | GradeError::InvalidStore { .. }
            | GradeError::MalformedRecord { .. }
            | GradeError::NotFound { .. }
            | GradeError::AlreadyExists { .. }
            | GradeError::Conflict { .. } => ExitCode::Data,

            GradeError::StructuralMismatch { .. }
            | GradeError::PersistenceDisabled { .. }
            | GradeError::Io(_)
            | GradeError::Json(_)
            | GradeError::Toml(_)
            | GradeError::FailedOperation { .. }
            | GradeError::Other(_) => ExitCode::Failure,
        }
    }

    /// Get the error type identifier
    fn error_type(&self) -> &'static str {
        match self {
            GradeError::UnknownFormat(_) => "unknown_format",
            GradeError::UsageError(_) => "usage_error",
            GradeError::InvalidValue { .. } => "invalid_value",
            GradeError::StoreNotFound { .. } => "store_not_found",
            GradeError::InvalidStore { .. } => "invalid_store",
            GradeError::MalformedRecord { .. } => "malformed_record",
            GradeError::NotFound { .. } => "not_found",
            GradeError::AlreadyExists { .. } => "already_exists",
            GradeError::Conflict { .. } => "conflict",
            GradeError::StructuralMismatch { .. } => "structural_mismatch",
            GradeError::PersistenceDisabled { .. } => "persistence_disabled",
            GradeError::Io(_) => "io_error",
            GradeError::Json(_) => "json_error",
            GradeError::Toml(_) => "toml_error",
            GradeError::FailedOperation { .. } => "failed_operation",
            GradeError::Other(_) => "other",
        }
    }

    /// Convert error to JSON representation for structured error output.
    pub fn to_json(&self) -> serde_json::Value {
        let mut error_obj = serde_json::json!({
            "code": self.exit_code() as i32,
            "type": self.error_type(),
            "message": self.to_string(),
        });

        if let GradeError::Conflict { conflicts } = self {
            error_obj["conflicts"] = conflicts
                .iter()
                .map(|c| {
                    serde_json::json!({
                        "index": c.index,
                        "user_id": c.user_id,
                        "usage_key": c.usage_key,
                    })
                })
                .collect();
        }

        serde_json::json!({ "error": error_obj })
    }
}

/// Result type alias for gradestore operations
pub type Result<T> = std::result::Result<T, GradeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_data_error() {
        let err = GradeError::not_found("grade", "user 1");
        assert!(err.is_not_found());
        assert_eq!(err.exit_code(), ExitCode::Data);
        assert_eq!(err.to_string(), "grade not found: user 1");
    }

    #[test]
    fn test_conflict_json_lists_entries() {
        let err = GradeError::Conflict {
            conflicts: vec![ConflictEntry {
                index: 2,
                user_id: 7,
                usage_key: "block-v1:Org+C+R+type@sequential+block@s1".to_string(),
            }],
        };
        let json = err.to_json();
        assert_eq!(json["error"]["type"], "conflict");
        assert_eq!(json["error"]["code"], 3);
        assert_eq!(json["error"]["conflicts"][0]["index"], 2);
        assert!(err.to_string().contains("1 conflicting grade(s)"));
    }

    #[test]
    fn test_structural_mismatch_is_not_recoverable_lookup() {
        let err = GradeError::structural("subtree root not in course");
        assert!(!err.is_not_found());
        assert_eq!(err.exit_code(), ExitCode::Failure);
    }
}
