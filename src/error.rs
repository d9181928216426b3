//! Error handling for the installer
//!
//! Every fallible library operation reports one of these variants. The
//! binary turns them into a process exit status via [`InstallError::exit_code`].

use thiserror::Error;

/// Main error type for the installer
#[derive(Error, Debug)]
pub enum InstallError {
    /// IO errors (file operations, terminal, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file errors (loading, missing fields)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rejected user input or config value
    #[error("Validation error: {0}")]
    Validation(String),

    /// Environment checks that must pass before anything is touched
    #[error("Pre-flight check failed: {0}")]
    Preflight(String),

    /// An external command ran and exited unsuccessfully
    #[error("Command failed: {command} (exit code {})", describe_exit(.exit_code))]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// An external command could not be found on PATH
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    /// Standard input reached EOF while a prompt was waiting
    #[error("Input closed while waiting for an answer")]
    InputClosed,

    /// The user declined a confirmation
    #[error("Aborted.")]
    Aborted,

    /// Password hashing failed
    #[error("Password error: {0}")]
    Password(String),

    /// Install state machine transition errors
    #[error("Install transition error: {0}")]
    InstallTransition(String),
}

fn describe_exit(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}

/// Result type alias for installer operations
pub type Result<T> = std::result::Result<T, InstallError>;

impl InstallError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a pre-flight error
    pub fn preflight(msg: impl Into<String>) -> Self {
        Self::Preflight(msg.into())
    }

    /// Create a password error
    pub fn password(msg: impl Into<String>) -> Self {
        Self::Password(msg.into())
    }

    /// Process exit status for this error.
    ///
    /// A failed command propagates its own status, a missing program exits
    /// with 127 like a shell would, and a user abort is not a failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::CommandFailed { exit_code, .. } => match exit_code {
                Some(code) if *code != 0 => *code,
                _ => 1,
            },
            Self::CommandNotFound(_) => 127,
            Self::Aborted => 0,
            _ => 1,
        }
    }
}
