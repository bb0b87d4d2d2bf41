//! Connection layer for device communication.
//!
//! This module defines the command channel that every device operation runs
//! over. A channel takes an ordered batch of CLI commands, runs them on the
//! device in one round-trip and returns one result per command. The first
//! command the device refuses stops the batch and is reported as
//! [`ConnectionError::CommandRejected`].
//!
//! Channels are interactively stateful: a `configure session <name>` command
//! in one batch leaves a pending session on the device that later batches can
//! re-enter.
//!
//! # Supported Transports
//!
//! - **eAPI** ([`eapi::EapiChannel`]): JSON-RPC over HTTP/HTTPS
//!
//! # Example
//!
//! ```rust,ignore
//! use netcommit::connection::{Command, CommandChannel, OutputFormat};
//!
//! let results = channel
//!     .run_commands(&[Command::from("show version")], OutputFormat::Json)
//!     .await?;
//! println!("{}", results[0].value()["modelName"]);
//! ```

/// eAPI (JSON-RPC over HTTP/HTTPS) channel implementation.
pub mod eapi;

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub use eapi::{EapiChannel, EapiChannelBuilder};

/// Errors that can occur during channel operations.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Failed to reach the device.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication was rejected by the device.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The device refused a command; later commands in the batch did not run.
    #[error("Command {index} '{command}' rejected: {message}")]
    CommandRejected {
        /// Position of the command in the submitted batch
        index: usize,
        /// The rejected command
        command: String,
        /// Diagnostic text returned by the device
        message: String,
    },

    /// The device answered with something that is not a valid response.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Configuration is invalid or incomplete.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Channel was closed.
    #[error("Connection closed")]
    ConnectionClosed,
}

impl ConnectionError {
    /// The device diagnostic text for a rejected command, or the error's
    /// display text otherwise.
    pub fn device_message(&self) -> String {
        match self {
            ConnectionError::CommandRejected { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Returns true if the device itself refused a command.
    pub fn is_rejection(&self) -> bool {
        matches!(self, ConnectionError::CommandRejected { .. })
    }
}

/// Result type for channel operations.
pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// A single CLI command.
///
/// Most commands are plain strings. Commands that read from the terminal,
/// such as `copy terminal: <file>`, carry their input alongside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Command {
    /// Plain command line
    Simple(String),
    /// Command with terminal input
    WithInput {
        /// Command line
        cmd: String,
        /// Text fed to the command
        input: String,
    },
}

impl Command {
    /// Create a command that reads `input` from the terminal.
    pub fn with_input(cmd: impl Into<String>, input: impl Into<String>) -> Self {
        Command::WithInput {
            cmd: cmd.into(),
            input: input.into(),
        }
    }

    /// The command line without any attached input.
    pub fn line(&self) -> &str {
        match self {
            Command::Simple(cmd) => cmd,
            Command::WithInput { cmd, .. } => cmd,
        }
    }

    /// Attached terminal input, if any.
    pub fn input(&self) -> Option<&str> {
        match self {
            Command::Simple(_) => None,
            Command::WithInput { input, .. } => Some(input),
        }
    }
}

impl From<String> for Command {
    fn from(s: String) -> Self {
        Command::Simple(s)
    }
}

impl From<&str> for Command {
    fn from(s: &str) -> Self {
        Command::Simple(s.to_string())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.line())
    }
}

/// Format the device renders command output in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Structured JSON objects
    #[default]
    Json,
    /// Raw CLI text
    Text,
}

impl OutputFormat {
    /// Wire name of the format.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Text => "text",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of one command in a batch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommandOutput {
    value: serde_json::Value,
}

impl CommandOutput {
    /// Wrap a raw per-command result.
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    /// Build a text-format result.
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            value: serde_json::json!({ "output": output.into() }),
        }
    }

    /// The raw result object.
    pub fn value(&self) -> &serde_json::Value {
        &self.value
    }

    /// Consume into the raw result object.
    pub fn into_value(self) -> serde_json::Value {
        self.value
    }

    /// Text output of a text-format command. Empty for JSON results.
    pub fn output(&self) -> &str {
        self.value
            .get("output")
            .and_then(|v| v.as_str())
            .unwrap_or("")
    }
}

/// Channel that runs CLI command batches on a single device.
///
/// Implementations must run commands in order and stop at the first
/// command the device refuses.
#[async_trait]
pub trait CommandChannel: Send + Sync {
    /// Get a unique identifier for this channel (usually the device host).
    fn identifier(&self) -> &str;

    /// Run `commands` in order and return one output per command.
    async fn run_commands(
        &self,
        commands: &[Command],
        format: OutputFormat,
    ) -> ConnectionResult<Vec<CommandOutput>>;

    /// Run a single text-format command and return its output.
    async fn run_text(&self, command: &str) -> ConnectionResult<String> {
        let outputs = self
            .run_commands(&[Command::from(command)], OutputFormat::Text)
            .await?;
        outputs
            .into_iter()
            .next()
            .map(|o| o.output().to_string())
            .ok_or_else(|| ConnectionError::InvalidResponse(format!("no output for '{}'", command)))
    }

    /// Run a single JSON-format command and return its result object.
    async fn run_json(&self, command: &str) -> ConnectionResult<serde_json::Value> {
        let outputs = self
            .run_commands(&[Command::from(command)], OutputFormat::Json)
            .await?;
        outputs
            .into_iter()
            .next()
            .map(CommandOutput::into_value)
            .ok_or_else(|| ConnectionError::InvalidResponse(format!("no output for '{}'", command)))
    }

    /// Check that the device answers.
    async fn is_alive(&self) -> bool {
        self.run_commands(&[Command::from("show hostname")], OutputFormat::Json)
            .await
            .is_ok()
    }

    /// Close the channel.
    async fn close(&self) -> ConnectionResult<()> {
        Ok(())
    }
}
