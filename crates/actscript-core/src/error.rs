use thiserror::Error;

/// Top-level error type for actscript.
///
/// Each variant wraps a subsystem-specific error. Subsystem crates define their
/// own error types and implement `From<SubsystemError> for ActscriptError` so
/// that the `?` operator works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ActscriptError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Input error: {0}")]
    Input(String),

    #[error("Focus error: {0}")]
    Focus(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Shutdown in progress")]
    ShuttingDown,
}

impl From<toml::de::Error> for ActscriptError {
    fn from(err: toml::de::Error) -> Self {
        ActscriptError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ActscriptError {
    fn from(err: toml::ser::Error) -> Self {
        ActscriptError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ActscriptError {
    fn from(err: serde_json::Error) -> Self {
        ActscriptError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for actscript operations.
pub type Result<T> = std::result::Result<T, ActscriptError>;
