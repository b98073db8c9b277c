//! Engine gateway error types.

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while talking to the container engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine command ran but returned a non-zero status.
    #[error("{command} failed{}: {message}", exit_suffix(*.exit_code))]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        message: String,
    },

    /// The engine binary could not be launched at all.
    #[error("failed to launch {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Invalid input provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A listing record could not be decoded.
    #[error("malformed listing record: {0}")]
    Decode(String),
}

impl EngineError {
    /// Exit status reported by the engine, when it produced one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            EngineError::CommandFailed { exit_code, .. } => *exit_code,
            _ => None,
        }
    }
}

fn exit_suffix(code: Option<i32>) -> String {
    match code {
        Some(code) => format!(" with exit code {code}"),
        None => " (terminated by signal)".to_string(),
    }
}
