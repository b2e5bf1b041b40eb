//! Error types for the hardware-input and focus capabilities.

use actscript_core::error::ActscriptError;

/// Errors raised while resolving keys or talking to the OS input APIs.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("Unknown key name: {0}")]
    UnknownKey(String),
    #[error("Input injection is only available on Windows")]
    Unsupported,
    #[error("SendInput only sent {sent} of {expected} events")]
    PartialSend { sent: u32, expected: u32 },
    #[error("Target window not found: {0}")]
    WindowNotFound(String),
    #[error("Failed to focus target window: {0}")]
    Focus(String),
    #[error("Input device failure: {0}")]
    Device(String),
}

impl From<InputError> for ActscriptError {
    fn from(err: InputError) -> Self {
        match err {
            InputError::WindowNotFound(_) | InputError::Focus(_) => {
                ActscriptError::Focus(err.to_string())
            }
            other => ActscriptError::Input(other.to_string()),
        }
    }
}
