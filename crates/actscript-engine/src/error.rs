//! Error types for the action engine.

use actscript_core::error::ActscriptError;
use actscript_input::InputError;

/// A token that does not match `name` or `name(parameter)`.
///
/// Parse errors never reach the caller directly: the offending action is
/// logged and skipped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("Malformed action: '{0}'")]
    MalformedAction(String),
}

/// Reasons a script is rejected as a whole.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Script contains no executable actions")]
    EmptyScript,
    #[error("Control command not allowed in scripts: {0}")]
    ReservedCommand(String),
    #[error("Unsupported action type: {0}")]
    UnsupportedType(String),
    #[error("Negative duration {duration}s for {action}")]
    NegativeDuration { action: String, duration: f64 },
    #[error("Duration {duration}s for {action} exceeds the {max}s limit")]
    DurationExceeded {
        action: String,
        duration: f64,
        max: f64,
    },
    #[error("Invalid parameter for {action}: {reason}")]
    InvalidParameter { action: String, reason: String },
}

/// Errors returned by `add_commands`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueueError {
    #[error("Invalid script: {0}")]
    Validation(#[from] ValidationError),
    #[error("Too many consecutive invalid scripts ({limit}), last error: {last}")]
    ErrorLimitExceeded { limit: u32, last: ValidationError },
    #[error("Action queue has been stopped")]
    Stopped,
}

impl QueueError {
    /// Whether this is the circuit breaker rather than a single bad script.
    pub fn is_limit_exceeded(&self) -> bool {
        matches!(self, QueueError::ErrorLimitExceeded { .. })
    }
}

/// Faults raised while an action drives the hardware.
///
/// These end the action in the `Failed` state and are logged; they never
/// propagate to whoever submitted the script.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("Input failed: {0}")]
    Input(#[from] InputError),
    #[error("Could not focus target window: {0}")]
    Focus(InputError),
    #[error("Cannot execute {0}: invalid parameter")]
    InvalidAction(String),
    #[error("Action task ended abnormally: {0}")]
    TaskAborted(String),
}

impl From<ValidationError> for ActscriptError {
    fn from(err: ValidationError) -> Self {
        ActscriptError::Script(err.to_string())
    }
}

impl From<QueueError> for ActscriptError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Validation(e) => ActscriptError::Script(e.to_string()),
            QueueError::Stopped => ActscriptError::ShuttingDown,
            other => ActscriptError::Queue(other.to_string()),
        }
    }
}

impl From<ExecutionError> for ActscriptError {
    fn from(err: ExecutionError) -> Self {
        match err {
            ExecutionError::Input(e) => e.into(),
            ExecutionError::Focus(e) => ActscriptError::Focus(e.to_string()),
            other => ActscriptError::Input(other.to_string()),
        }
    }
}
