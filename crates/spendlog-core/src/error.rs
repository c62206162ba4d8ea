//! Error types for spendlog-core
//!
//! Every failure carries a stable code, a severity and, through
//! [`CoreError::to_details`], suggestions the command line can print.

use serde::{Deserialize, Serialize};
use spendlog_codec::CodecError;
use std::fmt;
use thiserror::Error;

/// Error codes for programmatic error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Ledger directory or file unusable
    IoError,
    /// Unknown summary period
    InvalidPeriod,
    /// Window start after window end
    InvalidRange,
    /// Model reply could not be turned into an entry
    StructuringFailure,
    /// Malformed composite entry id
    InvalidEntryId,
    /// Text-completion collaborator failed
    CompletionFailed,
    /// Text-completion collaborator did not answer in time
    CompletionTimeout,
    /// Invalid data format
    InvalidFormat,
    /// Configuration error
    ConfigError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::IoError => write!(f, "IO_ERROR"),
            ErrorCode::InvalidPeriod => write!(f, "INVALID_PERIOD"),
            ErrorCode::InvalidRange => write!(f, "INVALID_RANGE"),
            ErrorCode::StructuringFailure => write!(f, "STRUCTURING_FAILURE"),
            ErrorCode::InvalidEntryId => write!(f, "INVALID_ENTRY_ID"),
            ErrorCode::CompletionFailed => write!(f, "COMPLETION_FAILED"),
            ErrorCode::CompletionTimeout => write!(f, "COMPLETION_TIMEOUT"),
            ErrorCode::InvalidFormat => write!(f, "INVALID_FORMAT"),
            ErrorCode::ConfigError => write!(f, "CONFIG_ERROR"),
        }
    }
}

/// Detailed error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl ErrorDetails {
    pub fn new(code: ErrorCode, message: String) -> Self {
        Self {
            code,
            message,
            details: None,
            suggestions: vec![],
        }
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.details = Some(detail);
        self
    }

    pub fn with_suggestion(mut self, suggestion: String) -> Self {
        self.suggestions.push(suggestion);
        self
    }
}

impl fmt::Display for ErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(ref details) = self.details {
            write!(f, "\nDetails: {}", details)?;
        }
        if !self.suggestions.is_empty() {
            write!(f, "\nSuggestions:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n  - {}", suggestion)?;
            }
        }
        Ok(())
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Warning,
    Error,
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Warning => write!(f, "warning"),
            ErrorSeverity::Error => write!(f, "error"),
            ErrorSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// Main error type for spendlog-core
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error on {path}: {message}")]
    Io { path: String, message: String },

    #[error("Invalid period: '{period}'")]
    InvalidPeriod { period: String },

    #[error("Invalid range: {start} is after {end}")]
    InvalidRange { start: String, end: String },

    #[error("Could not structure reply: {message}")]
    StructuringFailure { message: String },

    #[error("Invalid entry id '{id}': {reason}")]
    InvalidEntryId { id: String, reason: String },

    #[error("Text completion failed: {message}")]
    CompletionFailed { message: String },

    #[error("Text completion timed out after {seconds}s")]
    CompletionTimeout { seconds: u64 },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    pub(crate) fn io(path: &std::path::Path, error: std::io::Error) -> Self {
        CoreError::Io {
            path: path.display().to_string(),
            message: error.to_string(),
        }
    }

    /// Get the error code
    pub fn code(&self) -> ErrorCode {
        match self {
            CoreError::Io { .. } => ErrorCode::IoError,
            CoreError::InvalidPeriod { .. } => ErrorCode::InvalidPeriod,
            CoreError::InvalidRange { .. } => ErrorCode::InvalidRange,
            CoreError::StructuringFailure { .. } => ErrorCode::StructuringFailure,
            CoreError::InvalidEntryId { .. } => ErrorCode::InvalidEntryId,
            CoreError::CompletionFailed { .. } => ErrorCode::CompletionFailed,
            CoreError::CompletionTimeout { .. } => ErrorCode::CompletionTimeout,
            CoreError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            CoreError::Config { .. } => ErrorCode::ConfigError,
        }
    }

    /// Get the severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            CoreError::InvalidPeriod { .. }
            | CoreError::InvalidRange { .. }
            | CoreError::InvalidEntryId { .. }
            | CoreError::StructuringFailure { .. } => ErrorSeverity::Warning,
            CoreError::CompletionFailed { .. }
            | CoreError::CompletionTimeout { .. }
            | CoreError::InvalidFormat { .. } => ErrorSeverity::Error,
            CoreError::Io { .. } | CoreError::Config { .. } => ErrorSeverity::Critical,
        }
    }

    /// Convert to detailed error info
    pub fn to_details(&self) -> ErrorDetails {
        let mut details = ErrorDetails::new(self.code(), self.to_string());

        match self {
            CoreError::Io { path, .. } => {
                details = details.with_detail(serde_json::json!({ "path": path }));
                details = details.with_suggestion(
                    "Check that the data directory exists and is writable.".to_string(),
                );
            }
            CoreError::InvalidPeriod { .. } => {
                details = details.with_suggestion(
                    "Use one of: day, week, month, year, or pass an explicit start date.".to_string(),
                );
            }
            CoreError::InvalidRange { .. } => {
                details = details.with_suggestion(
                    "Swap the start and end dates.".to_string(),
                );
            }
            CoreError::StructuringFailure { message } => {
                details = details.with_detail(serde_json::json!({ "reason": message }));
                details = details.with_suggestion(
                    "Rephrase the description or add the entry manually.".to_string(),
                );
            }
            CoreError::InvalidEntryId { .. } => {
                details = details.with_suggestion(
                    "Ids look like <date>_<category>_<product>, e.g. 2024-01-01_通讯_话费.".to_string(),
                );
            }
            CoreError::CompletionTimeout { .. } | CoreError::CompletionFailed { .. } => {
                details = details.with_suggestion(
                    "Check that the completion endpoint is running, or raise completion.timeout_secs.".to_string(),
                );
            }
            _ => {}
        }

        details
    }
}

/// Result type with CoreError
pub type CoreResult<T> = Result<T, CoreError>;

impl From<CodecError> for CoreError {
    fn from(error: CodecError) -> Self {
        CoreError::InvalidFormat {
            message: error.to_string(),
        }
    }
}

// ==================== Tests ====================
