//! eAPI command channel.
//!
//! Arista eAPI exposes the CLI as a JSON-RPC 2.0 endpoint at
//! `/command-api`. Each `runCmds` request carries a batch of commands that
//! the device runs in order, stopping at the first failure.
//!
//! Every batch is prefixed with `enable` so that configuration commands run
//! with full privileges; the `enable` result is stripped before the outputs
//! are handed back and rejection indices refer to the caller's batch.

use super::{Command, CommandChannel, CommandOutput, ConnectionError, ConnectionResult, OutputFormat};
use crate::config::DeviceConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace};

/// Default eAPI HTTPS port
pub const EAPI_DEFAULT_HTTPS_PORT: u16 = 443;

/// Default eAPI HTTP port
pub const EAPI_DEFAULT_HTTP_PORT: u16 = 80;

/// Default timeout for eAPI requests (seconds)
pub const EAPI_DEFAULT_TIMEOUT: u64 = 30;

// ============================================================================
// eAPI Types
// ============================================================================

/// eAPI JSON-RPC request format
#[derive(Debug, Serialize)]
struct EapiRequest<'a> {
    jsonrpc: &'static str,
    method: &'static str,
    params: EapiParams<'a>,
    id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EapiParams<'a> {
    version: u32,
    cmds: Vec<&'a Command>,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    auto_complete: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expand_aliases: Option<bool>,
}

/// eAPI JSON-RPC response format
#[derive(Debug, Deserialize)]
struct EapiResponse {
    #[serde(default)]
    result: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    error: Option<EapiError>,
}

#[derive(Debug, Deserialize)]
struct EapiError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Vec<EapiErrorData>,
}

#[derive(Debug, Deserialize, Default)]
struct EapiErrorData {
    #[serde(default)]
    errors: Vec<String>,
}

// ============================================================================
// Channel
// ============================================================================

/// Command channel speaking eAPI to one device.
#[derive(Debug, Clone)]
pub struct EapiChannel {
    client: Client,
    url: String,
    host: String,
    username: String,
    password: String,
    enable_password: Option<String>,
    timeout: u64,
}

impl EapiChannel {
    /// Start building a channel to `host`.
    pub fn builder(host: impl Into<String>) -> EapiChannelBuilder {
        EapiChannelBuilder::new(host)
    }

    /// Build a channel from the `[device]` configuration section.
    pub fn from_config(config: &DeviceConfig) -> ConnectionResult<Self> {
        let host = config.host.clone().ok_or_else(|| {
            ConnectionError::InvalidConfig("device host is required for eAPI".to_string())
        })?;

        let mut builder = EapiChannelBuilder::new(host)
            .use_ssl(config.use_ssl)
            .validate_certs(config.validate_certs)
            .timeout(config.timeout);

        if let Some(port) = config.port {
            builder = builder.port(port);
        }
        if let Some(ref username) = config.username {
            builder = builder.username(username.clone());
        }
        if let Some(ref password) = config.password {
            builder = builder.password(password.clone());
        }
        if let Some(ref enable) = config.enable_password {
            builder = builder.enable_password(enable.clone());
        }

        builder.build()
    }

    /// The `/command-api` URL requests are posted to.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn enable_command(&self) -> Command {
        match self.enable_password {
            Some(ref password) => Command::with_input("enable", password.clone()),
            None => Command::from("enable"),
        }
    }

    /// Turn a JSON-RPC error into a rejection of the caller's command.
    ///
    /// `data` holds one entry per submitted command (including `enable`);
    /// the first entry with a non-empty `errors` list is the failing one.
    fn rejection(&self, commands: &[Command], error: EapiError) -> ConnectionError {
        let failed = error
            .data
            .iter()
            .position(|d| !d.errors.is_empty())
            .unwrap_or_else(|| error.data.len().saturating_sub(1));

        if let Some(enable) = error.data.first().filter(|d| !d.errors.is_empty()) {
            return ConnectionError::AuthenticationFailed(format!(
                "enable rejected: {}",
                enable.errors.join(", ")
            ));
        }

        let index = failed.saturating_sub(1);
        let command = commands
            .get(index)
            .map(|c| c.line().to_string())
            .unwrap_or_default();

        let details = error
            .data
            .get(failed)
            .map(|d| d.errors.join(", "))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("eAPI error {}: {}", error.code, error.message));

        ConnectionError::CommandRejected {
            index,
            command,
            message: details,
        }
    }
}

#[async_trait]
impl CommandChannel for EapiChannel {
    fn identifier(&self) -> &str {
        &self.host
    }

    async fn run_commands(
        &self,
        commands: &[Command],
        format: OutputFormat,
    ) -> ConnectionResult<Vec<CommandOutput>> {
        let enable = self.enable_command();
        let mut cmds: Vec<&Command> = Vec::with_capacity(commands.len() + 1);
        cmds.push(&enable);
        cmds.extend(commands.iter());

        let request = EapiRequest {
            jsonrpc: "2.0",
            method: "runCmds",
            params: EapiParams {
                version: 1,
                cmds,
                format: format.as_str(),
                auto_complete: None,
                expand_aliases: None,
            },
            id: uuid::Uuid::new_v4().to_string(),
        };

        debug!(host = %self.host, count = commands.len(), %format, "eAPI runCmds");
        trace!(commands = ?commands.iter().map(Command::line).collect::<Vec<_>>());

        let response = self
            .client
            .post(&self.url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ConnectionError::Timeout(self.timeout)
                } else {
                    ConnectionError::ConnectionFailed(format!("eAPI request failed: {}", e))
                }
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ConnectionError::AuthenticationFailed(format!(
                "eAPI rejected credentials for '{}'",
                self.username
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectionError::InvalidResponse(format!(
                "eAPI returned error status {}: {}",
                status, body
            )));
        }

        let eapi_response: EapiResponse = response.json().await.map_err(|e| {
            ConnectionError::InvalidResponse(format!("Failed to parse eAPI response: {}", e))
        })?;

        if let Some(error) = eapi_response.error {
            return Err(self.rejection(commands, error));
        }

        let mut results = eapi_response
            .result
            .ok_or_else(|| ConnectionError::InvalidResponse("eAPI returned no result".to_string()))?;

        if results.len() != commands.len() + 1 {
            return Err(ConnectionError::InvalidResponse(format!(
                "expected {} results, got {}",
                commands.len() + 1,
                results.len()
            )));
        }

        results.remove(0);
        Ok(results.into_iter().map(CommandOutput::new).collect())
    }
}

/// Builder for [`EapiChannel`].
#[derive(Debug, Clone)]
pub struct EapiChannelBuilder {
    host: String,
    port: Option<u16>,
    use_ssl: bool,
    validate_certs: bool,
    username: Option<String>,
    password: Option<String>,
    enable_password: Option<String>,
    timeout: u64,
}

impl EapiChannelBuilder {
    /// Create a builder for `host` with HTTPS and certificate validation.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            use_ssl: true,
            validate_certs: true,
            username: None,
            password: None,
            enable_password: None,
            timeout: EAPI_DEFAULT_TIMEOUT,
        }
    }

    /// Set the eAPI port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Use HTTPS (default) or plain HTTP.
    pub fn use_ssl(mut self, use_ssl: bool) -> Self {
        self.use_ssl = use_ssl;
        self
    }

    /// Validate the device certificate (default true).
    pub fn validate_certs(mut self, validate: bool) -> Self {
        self.validate_certs = validate;
        self
    }

    /// Set the username.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the enable password.
    pub fn enable_password(mut self, password: impl Into<String>) -> Self {
        self.enable_password = Some(password.into());
        self
    }

    /// Set the request timeout in seconds.
    pub fn timeout(mut self, secs: u64) -> Self {
        self.timeout = secs;
        self
    }

    fn effective_port(&self) -> u16 {
        self.port.unwrap_or(if self.use_ssl {
            EAPI_DEFAULT_HTTPS_PORT
        } else {
            EAPI_DEFAULT_HTTP_PORT
        })
    }

    /// Build the channel.
    pub fn build(self) -> ConnectionResult<EapiChannel> {
        let username = self.username.clone().ok_or_else(|| {
            ConnectionError::InvalidConfig("username is required for eAPI".to_string())
        })?;
        let password = self.password.clone().unwrap_or_default();

        let scheme = if self.use_ssl { "https" } else { "http" };
        let url = url::Url::parse(&format!(
            "{}://{}:{}/command-api",
            scheme,
            self.host,
            self.effective_port()
        ))
        .map_err(|e| ConnectionError::InvalidConfig(format!("invalid eAPI host '{}': {}", self.host, e)))?;

        let builder = Client::builder().timeout(Duration::from_secs(self.timeout));
        let client = if self.use_ssl && !self.validate_certs {
            builder.danger_accept_invalid_certs(true).build()
        } else {
            builder.build()
        }
        .map_err(|e| ConnectionError::InvalidConfig(format!("Failed to create HTTP client: {}", e)))?;

        Ok(EapiChannel {
            client,
            url: url.to_string(),
            host: self.host,
            username,
            password,
            enable_password: self.enable_password,
            timeout: self.timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_default_https_port() {
        let channel = EapiChannel::builder("192.0.2.10")
            .username("admin")
            .password("admin")
            .build()
            .unwrap();
        assert_eq!(channel.url(), "https://192.0.2.10/command-api");
        assert_eq!(channel.identifier(), "192.0.2.10");
    }

    #[test]
    fn test_builder_http_custom_port() {
        let channel = EapiChannel::builder("leaf1")
            .use_ssl(false)
            .port(8080)
            .username("admin")
            .build()
            .unwrap();
        assert_eq!(channel.url(), "http://leaf1:8080/command-api");
    }

    #[test]
    fn test_builder_requires_username() {
        let err = EapiChannel::builder("leaf1").build().unwrap_err();
        assert!(matches!(err, ConnectionError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejection_maps_to_caller_index() {
        let channel = EapiChannel::builder("leaf1").username("admin").build().unwrap();
        let commands = vec![
            Command::from("configure session s1"),
            Command::from("interface Ethernet1"),
            Command::from("descripton typo"),
        ];
        let error = EapiError {
            code: 1002,
            message: "CLI command 4 of 4 'descripton typo' failed: invalid command".into(),
            data: vec![
                EapiErrorData::default(),
                EapiErrorData::default(),
                EapiErrorData::default(),
                EapiErrorData {
                    errors: vec!["Invalid input (at token 0: 'descripton')".into()],
                },
            ],
        };

        match channel.rejection(&commands, error) {
            ConnectionError::CommandRejected {
                index,
                command,
                message,
            } => {
                assert_eq!(index, 2);
                assert_eq!(command, "descripton typo");
                assert!(message.contains("Invalid input"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_rejection_without_data_uses_message() {
        let channel = EapiChannel::builder("leaf1").username("admin").build().unwrap();
        let commands = vec![Command::from("write memory")];
        let error = EapiError {
            code: 1000,
            message: "General error".into(),
            data: vec![],
        };
        let err = channel.rejection(&commands, error);
        assert_eq!(err.device_message(), "eAPI error 1000: General error");
    }
}
