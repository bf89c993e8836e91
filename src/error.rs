//! Error types for sheetsync.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=not_found, 4=validation, etc.)
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers
//!
//! Row-level import problems are not errors in this sense: they travel as
//! data inside [`crate::sync::ImportOutcome`]. This type covers operator
//! mistakes outside a single import and infrastructure faults.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for sheetsync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    NotInitialized,
    AlreadyInitialized,
    DatabaseError,

    // Not Found (exit 3)
    TemplateNotFound,
    ColumnNotFound,

    // Validation (exit 4)
    TemplateExists,
    DuplicateColumn,
    InvalidDataType,
    InvalidArgument,

    // Input file (exit 5)
    UnsupportedFormat,
    FileTooLarge,
    SpreadsheetError,
    ImportRejected,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::TemplateNotFound => "TEMPLATE_NOT_FOUND",
            Self::ColumnNotFound => "COLUMN_NOT_FOUND",
            Self::TemplateExists => "TEMPLATE_EXISTS",
            Self::DuplicateColumn => "DUPLICATE_COLUMN",
            Self::InvalidDataType => "INVALID_DATA_TYPE",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::UnsupportedFormat => "UNSUPPORTED_FORMAT",
            Self::FileTooLarge => "FILE_TOO_LARGE",
            Self::SpreadsheetError => "SPREADSHEET_ERROR",
            Self::ImportRejected => "IMPORT_REJECTED",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized | Self::AlreadyInitialized | Self::DatabaseError => 2,
            Self::TemplateNotFound | Self::ColumnNotFound => 3,
            Self::TemplateExists
            | Self::DuplicateColumn
            | Self::InvalidDataType
            | Self::InvalidArgument => 4,
            Self::UnsupportedFormat
            | Self::FileTooLarge
            | Self::SpreadsheetError
            | Self::ImportRejected => 5,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether the caller can fix the problem by changing its input.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TemplateExists
                | Self::DuplicateColumn
                | Self::InvalidDataType
                | Self::InvalidArgument
                | Self::UnsupportedFormat
                | Self::FileTooLarge
                | Self::ImportRejected
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in sheetsync operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not initialized: run `sheetsync init` first")]
    NotInitialized,

    #[error("Already initialized at {path}")]
    AlreadyInitialized { path: PathBuf },

    #[error("Template not found: {name}")]
    TemplateNotFound { name: String },

    #[error("Template already exists: {name}")]
    TemplateExists { name: String },

    #[error("Column not found: {name}")]
    ColumnNotFound { name: String },

    #[error("Column '{name}' already exists in this template")]
    DuplicateColumn { name: String },

    #[error("Invalid data type: {input}")]
    InvalidDataType {
        input: String,
        suggestion: Option<String>,
    },

    #[error("Unsupported file format '{extension}' (expected .xlsx or .xls)")]
    UnsupportedFormat { extension: String },

    #[error("File is too large ({size} bytes, limit is {limit} bytes)")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Import rejected with {errors} error(s); no changes were made")]
    ImportRejected { errors: usize },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl From<calamine::Error> for Error {
    fn from(err: calamine::Error) -> Self {
        Self::Spreadsheet(err.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for Error {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        Self::Spreadsheet(err.to_string())
    }
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::AlreadyInitialized { .. } => ErrorCode::AlreadyInitialized,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::TemplateNotFound { .. } => ErrorCode::TemplateNotFound,
            Self::TemplateExists { .. } => ErrorCode::TemplateExists,
            Self::ColumnNotFound { .. } => ErrorCode::ColumnNotFound,
            Self::DuplicateColumn { .. } => ErrorCode::DuplicateColumn,
            Self::InvalidDataType { .. } => ErrorCode::InvalidDataType,
            Self::UnsupportedFormat { .. } => ErrorCode::UnsupportedFormat,
            Self::FileTooLarge { .. } => ErrorCode::FileTooLarge,
            Self::Spreadsheet(_) => ErrorCode::SpreadsheetError,
            Self::ImportRejected { .. } => ErrorCode::ImportRejected,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized => {
                Some("Run `sheetsync init` to create the database".to_string())
            }

            Self::AlreadyInitialized { path } => Some(format!(
                "Database already exists at {}. Use `--force` to reinitialize.",
                path.display()
            )),

            Self::TemplateNotFound { name } => Some(format!(
                "No template named '{name}'. Use `sheetsync template list` to see available templates."
            )),

            Self::TemplateExists { name } => Some(format!(
                "Pick another name or remove the old one with `sheetsync template delete {name}`."
            )),

            Self::ColumnNotFound { .. } => Some(
                "Use `sheetsync column list <template>` to see the configured columns.".to_string(),
            ),

            Self::InvalidDataType { suggestion, .. } => match suggestion {
                Some(s) => Some(format!("Did you mean: {s}? Valid types: string, number, date, boolean")),
                None => Some("Valid types: string, number, date, boolean".to_string()),
            },

            Self::UnsupportedFormat { .. } => {
                Some("Save the sheet as .xlsx (or legacy .xls) and try again.".to_string())
            }

            Self::FileTooLarge { .. } => {
                Some("Split the sheet into smaller files, or remove unused rows.".to_string())
            }

            Self::ImportRejected { .. } => {
                Some("Fix the listed rows in the sheet and import it again.".to_string())
            }

            Self::DuplicateColumn { .. }
            | Self::Spreadsheet(_)
            | Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::InvalidArgument(_)
            | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_by_category() {
        assert_eq!(Error::NotInitialized.exit_code(), 2);
        assert_eq!(
            Error::TemplateNotFound { name: "x".into() }.exit_code(),
            3
        );
        assert_eq!(Error::InvalidArgument("bad".into()).exit_code(), 4);
        assert_eq!(
            Error::FileTooLarge { size: 20, limit: 10 }.exit_code(),
            5
        );
        assert_eq!(Error::Other("boom".into()).exit_code(), 1);
    }

    #[test]
    fn test_structured_json_includes_hint() {
        let err = Error::InvalidDataType {
            input: "nmber".into(),
            suggestion: Some("number".into()),
        };
        let json = err.to_structured_json();
        assert_eq!(json["error"]["code"], "INVALID_DATA_TYPE");
        assert_eq!(json["error"]["retryable"], true);
        assert!(json["error"]["hint"].as_str().unwrap().contains("number"));
    }

    #[test]
    fn test_database_error_not_retryable() {
        let err = Error::Database(rusqlite::Error::InvalidQuery);
        assert!(!err.error_code().is_retryable());
        assert!(err.hint().is_none());
    }
}
