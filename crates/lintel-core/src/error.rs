//! Error types for Lintel

use thiserror::Error;

/// The main error type for Lintel operations
///
/// These are run-level failures: they are reported to the caller before a
/// traversal starts and no partial report is produced. Per-element problems
/// (rule evaluation, action execution, traversal) are recorded in the report
/// instead.
#[derive(Debug, Error)]
pub enum LintelError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Duplicate element key: {0}")]
    DuplicateElementKey(String),

    #[error("No root elements supplied")]
    NoRoots,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config load error: {0}")]
    ConfigLoadError(String),

    #[error("Model error: {0}")]
    ModelError(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),

    #[error("TOML serialization error: {0}")]
    TomlSerError(String),
}

/// Result type alias for Lintel operations
pub type Result<T> = std::result::Result<T, LintelError>;

impl From<toml::de::Error> for LintelError {
    fn from(err: toml::de::Error) -> Self {
        LintelError::TomlParseError(err.to_string())
    }
}

impl From<toml::ser::Error> for LintelError {
    fn from(err: toml::ser::Error) -> Self {
        LintelError::TomlSerError(err.to_string())
    }
}
