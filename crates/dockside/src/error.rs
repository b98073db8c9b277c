//! Session error types.

use thiserror::Error;

use crate::binding::BindingError;
use crate::engine::EngineError;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that end a session with a non-zero status.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Bad target directory or auxiliary source. Raised before any engine call.
    #[error(transparent)]
    Binding(#[from] BindingError),

    /// An engine command failed.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Reading the user's answer failed.
    #[error("reading answer: {0}")]
    Prompt(#[source] std::io::Error),
}
