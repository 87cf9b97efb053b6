//! Error types and exit codes for Filterbar.

use thiserror::Error;

/// Exit codes used by the `filterbar` CLI.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const FILE_ERROR: i32 = 2;
    pub const EXPRESSIONS_INVALID: i32 = 4;
    pub const SCHEMA_INVALID: i32 = 5;
}

/// Main error type for Filterbar operations.
///
/// Validation problems are not errors: they are collected as
/// [`ValidationError`](crate::validate::ValidationError) data and reported
/// through validation reports. `FilterError` covers contract violations
/// (unknown keys during deserialization), malformed inputs handed to the
/// adapters, and the file/config plumbing used by the CLI.
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Unknown operator '{operator}' for field '{field}'")]
    UnknownOperator { field: String, operator: String },

    #[error("Invalid query string: {0}")]
    InvalidQueryString(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Unsupported schema file format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid replay script at line {line}: {message}")]
    InvalidScript { line: usize, message: String },

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("{0}")]
    Other(String),
}

impl FilterError {
    /// Returns the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            FilterError::UnknownField(_)
            | FilterError::UnknownOperator { .. }
            | FilterError::InvalidQueryString(_) => exit_code::EXPRESSIONS_INVALID,
            FilterError::InvalidSchema(_) => exit_code::SCHEMA_INVALID,
            FilterError::Io(_)
            | FilterError::Json(_)
            | FilterError::YamlParse(_)
            | FilterError::TomlParse(_) => exit_code::FILE_ERROR,
            _ => exit_code::GENERAL_ERROR,
        }
    }
}

/// Result type alias for Filterbar operations.
pub type Result<T> = std::result::Result<T, FilterError>;

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    GeneralError,
    FileError,
    ExpressionsInvalid,
    SchemaInvalid,
}

impl ExitCode {
    /// Convert to exit code integer.
    pub fn code(self) -> i32 {
        match self {
            ExitCode::Success => exit_code::SUCCESS,
            ExitCode::GeneralError => exit_code::GENERAL_ERROR,
            ExitCode::FileError => exit_code::FILE_ERROR,
            ExitCode::ExpressionsInvalid => exit_code::EXPRESSIONS_INVALID,
            ExitCode::SchemaInvalid => exit_code::SCHEMA_INVALID,
        }
    }
}
