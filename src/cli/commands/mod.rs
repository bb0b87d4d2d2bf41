//! Subcommands module for netcommit CLI
//!
//! This module contains all the subcommand implementations.

pub mod apply;
pub mod inventory;
pub mod lifecycle;

use crate::cli::output::OutputFormatter;
use anyhow::{Context, Result};
use netcommit::config::Config;
use netcommit::connection::EapiChannel;
use netcommit::network::EosDriver;

/// Common context shared between commands
pub struct CommandContext {
    /// Configuration
    pub config: Config,
    /// Output formatter
    pub output: OutputFormatter,
}

impl CommandContext {
    /// Create a new command context from CLI arguments
    pub fn new(cli: &crate::cli::Cli, mut config: Config) -> Self {
        if let Some(host) = &cli.host {
            config.device.host = Some(host.clone());
        }
        if let Some(user) = &cli.user {
            config.device.username = Some(user.clone());
        }

        let output = OutputFormatter::new(!cli.no_color, cli.output, cli.verbosity());

        Self { config, output }
    }

    /// Connect to the configured device and prepare a driver.
    ///
    /// Leftover sessions found on the device are reported.
    pub async fn connect(&self) -> Result<EosDriver<EapiChannel>> {
        let Some(host) = self.config.device.host.as_deref() else {
            anyhow::bail!("no device host configured (use --host or NETCOMMIT_HOST)");
        };

        let channel = EapiChannel::from_config(&self.config.device)
            .with_context(|| format!("invalid eAPI settings for {}", host))?;
        self.output
            .info(&format!("Connecting to {}", channel.url()));

        let mut driver = EosDriver::new(channel, self.config.session.clone());
        let aborted = driver.open().await?;
        if !aborted.is_empty() {
            self.output.warning(&format!(
                "aborted {} leftover session(s): {}",
                aborted.len(),
                aborted.join(", ")
            ));
        }
        Ok(driver)
    }
}
