//! Error types and exit codes for qa-bench
//!
//! Exit codes:
//! - 0: Success
//! - 1: Generic failure (transport, IO, contract violations)
//! - 2: Usage error (bad flags/args, invalid configuration values)
//! - 3: Data error (missing or malformed dataset/config, missing metadata)

mod macros;

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the qa-bench binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Success (0)
    Success = 0,
    /// Generic failure (1)
    Failure = 1,
    /// Usage error - bad flags/args (2)
    Usage = 2,
    /// Data error - missing dataset, malformed metadata (3)
    Data = 3,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

/// Errors that can occur during qa-bench operations
#[derive(Error, Debug)]
pub enum BenchError {
    // Model output did not satisfy the requested response contract
    #[error("contract violation in {schema}: {reason}")]
    ContractViolation { schema: String, reason: String },

    // Grading was invoked without a required field (programming error upstream)
    #[error("missing required metadata: {key}")]
    MissingRequiredMetadata { key: String },

    // Network / HTTP failures from the model API, passed through unchanged
    #[error("upstream transport failure{}: {message}", .status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Transport {
        status: Option<u16>,
        message: String,
    },

    #[error("OPENAI_API_KEY or QA_BENCH_API_KEY environment variable must be set")]
    MissingApiKey,

    #[error("{0}")]
    UsageError(String),

    #[error("template error: {reason}")]
    Template { reason: String },

    #[error("invalid {context}: {value}")]
    InvalidValue { context: String, value: String },

    #[error("{context} not found: {value}")]
    NotFound { context: String, value: String },

    #[error("unsupported {context}: {value} (supported: {supported})")]
    Unsupported {
        context: String,
        value: String,
        supported: String,
    },

    #[error("invalid dataset record in {path:?} at line {line}: {reason}")]
    InvalidRecord {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for BenchError {
    fn from(err: reqwest::Error) -> Self {
        BenchError::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

impl BenchError {
    /// Create an error for model output that failed schema validation
    pub fn contract_violation(schema: &str, reason: impl std::fmt::Display) -> Self {
        BenchError::ContractViolation {
            schema: schema.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create an error for a required key absent from the scorer arguments
    pub fn missing_metadata(key: &str) -> Self {
        BenchError::MissingRequiredMetadata {
            key: key.to_string(),
        }
    }

    /// Create an error for an invalid value or configuration
    pub fn invalid_value(context: &str, value: impl std::fmt::Display) -> Self {
        BenchError::InvalidValue {
            context: context.to_string(),
            value: value.to_string(),
        }
    }

    /// Create an error for an entity that was not found
    pub fn not_found(context: &str, value: impl std::fmt::Display) -> Self {
        BenchError::NotFound {
            context: context.to_string(),
            value: value.to_string(),
        }
    }

    /// Create an error for an unsupported value
    pub fn unsupported(
        context: &str,
        value: impl std::fmt::Display,
        supported: impl std::fmt::Display,
    ) -> Self {
        BenchError::Unsupported {
            context: context.to_string(),
            value: value.to_string(),
            supported: supported.to_string(),
        }
    }

    /// Get the appropriate exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        match self {
            BenchError::UsageError(_)
            | BenchError::InvalidValue { .. }
            | BenchError::Unsupported { .. }
            | BenchError::MissingApiKey => ExitCode::Usage,

            BenchError::NotFound { .. }
            | BenchError::InvalidRecord { .. }
            | BenchError::MissingRequiredMetadata { .. }
            | BenchError::Toml(_)
            | BenchError::Csv(_) => ExitCode::Data,

            BenchError::ContractViolation { .. }
            | BenchError::Transport { .. }
            | BenchError::Template { .. }
            | BenchError::Io(_)
            | BenchError::Json(_)
            | BenchError::Other(_) => ExitCode::Failure,
        }
    }

    /// Get the error type identifier
    pub fn error_type(&self) -> &'static str {
        match self {
            BenchError::ContractViolation { .. } => "contract_violation",
            BenchError::MissingRequiredMetadata { .. } => "missing_required_metadata",
            BenchError::Transport { .. } => "upstream_transport_failure",
            BenchError::MissingApiKey => "missing_api_key",
            BenchError::UsageError(_) => "usage_error",
            BenchError::Template { .. } => "template_error",
            BenchError::InvalidValue { .. } => "invalid_value",
            BenchError::NotFound { .. } => "not_found",
            BenchError::Unsupported { .. } => "unsupported",
            BenchError::InvalidRecord { .. } => "invalid_record",
            BenchError::Io(_) => "io_error",
            BenchError::Json(_) => "json_error",
            BenchError::Toml(_) => "toml_error",
            BenchError::Csv(_) => "csv_error",
            BenchError::Other(_) => "other",
        }
    }

    /// Convert error to JSON representation for structured error output.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "code": self.exit_code() as i32,
                "type": self.error_type(),
                "message": self.to_string(),
            }
        })
    }
}

/// Result type alias for qa-bench operations
pub type Result<T> = std::result::Result<T, BenchError>;
