//! Error types for Netcommit.
//!
//! The lifecycle operations of [`EosDriver`](crate::network::EosDriver)
//! fail with one of the variants below. Device rejections keep the text the
//! device returned so that an operator can see exactly which command failed.

use crate::connection::ConnectionError;
use crate::network::ConfigMode;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Netcommit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Netcommit.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// The device rejected a command while test-applying a candidate.
    ///
    /// Any session opened for the test has already been aborted.
    #[error("Failed to stage {mode} candidate: {message}")]
    Staging {
        /// Mode the candidate was being staged in
        mode: ConfigMode,
        /// Device rejection text
        message: String,
    },

    /// The device rejected a full configuration replace.
    #[error("Configuration replace rejected: {0}")]
    ReplaceCommit(String),

    /// A command in the finalize-merge sequence failed.
    ///
    /// Nothing is undone automatically; [`EosDriver::rollback`] is the
    /// recovery path when the snapshot was taken.
    ///
    /// [`EosDriver::rollback`]: crate::network::EosDriver::rollback
    #[error("Commit of session '{session}' failed (snapshot taken: {snapshot_taken}): {message}")]
    CommitSequence {
        /// Session being committed
        session: String,
        /// Whether the rollback snapshot was written before the failure
        snapshot_taken: bool,
        /// Device rejection text
        message: String,
    },

    /// Saving the running configuration to startup-config failed.
    ///
    /// The running configuration change stays applied.
    #[error("Running configuration applied but not persisted: {0}")]
    Persist(String),

    /// Restoring the snapshot was rejected by the device.
    #[error("Rollback failed: {0}")]
    Rollback(String),

    /// The operation was called without the state it requires.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Session name contains characters the device does not accept.
    #[error("Invalid session name '{0}': must contain only alphanumeric characters, underscores, and hyphens")]
    InvalidSessionName(String),

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// The command channel failed.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidConfig {
        /// Configuration key
        key: String,
        /// Error message
        message: String,
    },

    // ========================================================================
    // IO Errors
    // ========================================================================
    /// Candidate source file not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ========================================================================
    // Serialization Errors
    // ========================================================================
    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Device output did not have the expected shape.
    #[error("Unexpected output from '{command}': {message}")]
    Parse {
        /// Command whose output could not be read
        command: String,
        /// Error message
        message: String,
    },

    // ========================================================================
    // Other Errors
    // ========================================================================
    /// Generic error with source.
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
        /// Source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Creates a new staging error.
    pub fn staging(mode: ConfigMode, message: impl Into<String>) -> Self {
        Self::Staging {
            mode,
            message: message.into(),
        }
    }

    /// Creates a new precondition error.
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }

    /// Creates a new parse error.
    pub fn parse(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Returns true if the error leaves the device running the intended
    /// configuration and only reports a follow-up problem.
    pub fn is_warning(&self) -> bool {
        matches!(self, Error::Persist(_))
    }

    /// Returns true if the error was caused by the caller rather than the
    /// device.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Error::Precondition(_) | Error::InvalidSessionName(_) | Error::FileNotFound(_)
        )
    }

    /// Returns the error code for CLI exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Staging { .. } => 2,
            Error::ReplaceCommit(_) | Error::CommitSequence { .. } => 3,
            Error::Rollback(_) => 4,
            Error::Persist(_) => 5,
            Error::Precondition(_) | Error::InvalidSessionName(_) => 6,
            Error::Connection(_) => 7,
            _ => 1,
        }
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Adds context with a closure that is only evaluated on error.
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Other {
            message: message.into(),
            source: Some(Box::new(e)),
        })
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| Error::Other {
            message: f().into(),
            source: Some(Box::new(e)),
        })
    }
}
