//! Shared test utilities for the netcommit test suite.
//!
//! This module provides:
//! - `MockDevice`, an in-memory EOS simulator implementing `CommandChannel`
//! - Fixture helpers for running configurations and driver settings
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::collections::HashMap;

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::{json, Value};
use similar::TextDiff;

use netcommit::config::SessionConfig;
use netcommit::connection::{
    Command, CommandChannel, CommandOutput, ConnectionError, ConnectionResult, OutputFormat,
};

/// Running configuration every `MockDevice` starts with.
pub const BASELINE_CONFIG: &str = "hostname leaf1
interface Ethernet1
   description old-uplink
interface Ethernet2
   description server
ntp server 192.0.2.10
";

/// Top-level keywords the simulator accepts outside a section.
const TOP_LEVEL: &[&str] = &[
    "hostname",
    "interface",
    "vlan",
    "router",
    "ip",
    "ntp",
    "username",
    "management",
    "logging",
    "spanning-tree",
];

/// Keywords that open a configuration section.
const SECTIONS: &[&str] = &["interface", "vlan", "router", "management"];

/// Default driver settings for tests.
pub fn session_config() -> SessionConfig {
    SessionConfig::default()
}

// ============================================================================
// Configuration model
// ============================================================================

/// One top-level statement and its indented children.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Block {
    header: String,
    children: Vec<String>,
}

/// Simplified EOS configuration tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct DeviceConfig {
    blocks: Vec<Block>,
}

fn first_word(line: &str) -> &str {
    line.split_whitespace().next().unwrap_or("")
}

/// Key under which a child line replaces an existing one.
fn child_key(line: &str) -> String {
    let mut words = line.split_whitespace();
    let first = words.next().unwrap_or("");
    match first {
        "ip" | "ipv6" | "switchport" => format!("{} {}", first, words.next().unwrap_or("")),
        _ => first.to_string(),
    }
}

impl DeviceConfig {
    fn parse(text: &str, rejects: &[String]) -> Result<Self, String> {
        let mut config = DeviceConfig::default();
        let mut current = None;
        for line in text.lines() {
            config.apply(line, &mut current, rejects)?;
        }
        Ok(config)
    }

    /// Apply one CLI line. `current` tracks the open section.
    fn apply(
        &mut self,
        line: &str,
        current: &mut Option<usize>,
        rejects: &[String],
    ) -> Result<(), String> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('!') || trimmed == "end" {
            return Ok(());
        }
        if rejects.iter().any(|r| trimmed.contains(r.as_str())) {
            return Err(format!("% Invalid input (at token 0: '{}')", first_word(trimmed)));
        }
        if trimmed == "exit" {
            *current = None;
            return Ok(());
        }

        let indented = line.starts_with(' ');
        let (negated, statement) = match trimmed.strip_prefix("no ") {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        if !indented && TOP_LEVEL.contains(&first_word(statement)) {
            if negated {
                self.blocks.retain(|b| b.header != statement);
                *current = None;
            } else if SECTIONS.contains(&first_word(statement)) {
                let index = match self.blocks.iter().position(|b| b.header == statement) {
                    Some(index) => index,
                    None => {
                        self.blocks.push(Block {
                            header: statement.to_string(),
                            children: Vec::new(),
                        });
                        self.blocks.len() - 1
                    }
                };
                *current = Some(index);
            } else {
                if first_word(statement) == "hostname" {
                    self.blocks.retain(|b| first_word(&b.header) != "hostname");
                }
                if !self.blocks.iter().any(|b| b.header == statement) {
                    self.blocks.push(Block {
                        header: statement.to_string(),
                        children: Vec::new(),
                    });
                }
                *current = None;
            }
            return Ok(());
        }

        let Some(index) = *current else {
            return Err(format!(
                "% Invalid input (at token 0: '{}')",
                first_word(trimmed)
            ));
        };
        let children = &mut self.blocks[index].children;
        let key = child_key(statement);
        let position = children.iter().position(|c| child_key(c) == key);
        match (negated, position) {
            (true, Some(p)) => {
                children.remove(p);
            }
            (true, None) => {}
            (false, Some(p)) => children[p] = statement.to_string(),
            (false, None) => children.push(statement.to_string()),
        }
        Ok(())
    }

    fn render(&self) -> String {
        let mut text = String::new();
        for block in &self.blocks {
            text.push_str(&block.header);
            text.push('\n');
            for child in &block.children {
                text.push_str("   ");
                text.push_str(child);
                text.push('\n');
            }
            if SECTIONS.contains(&first_word(&block.header)) {
                text.push_str("!\n");
            }
        }
        text
    }
}

// ============================================================================
// Mock Device
// ============================================================================

#[derive(Debug, Clone)]
struct SimSession {
    config: DeviceConfig,
    completed: bool,
}

#[derive(Debug)]
struct DeviceState {
    running: DeviceConfig,
    startup: DeviceConfig,
    files: HashMap<String, String>,
    sessions: IndexMap<String, SimSession>,
    log: Vec<String>,
    rejects: Vec<String>,
    failures: Vec<(String, String)>,
    responses: HashMap<String, CommandOutput>,
}

/// An in-memory Arista EOS device.
///
/// Understands configuration sessions (`configure session`, `end`,
/// `abort`, `commit`, `rollback clean-config`, `show session-config
/// diffs`), `configure replace`, flash files written by `copy`, `write
/// memory` and `show configuration sessions`. Other commands are answered
/// from canned responses.
///
/// # Example
///
/// ```rust,ignore
/// let device = MockDevice::new("leaf1");
/// device.reject_lines_containing("bogus");
/// device.fail_command("write memory", "% Error writing flash");
/// ```
#[derive(Debug)]
pub struct MockDevice {
    identifier: String,
    state: Mutex<DeviceState>,
}

impl MockDevice {
    /// Create a device running [`BASELINE_CONFIG`].
    pub fn new(identifier: impl Into<String>) -> Self {
        Self::with_running(identifier, BASELINE_CONFIG)
    }

    /// Create a device running `config`.
    pub fn with_running(identifier: impl Into<String>, config: &str) -> Self {
        let running = DeviceConfig::parse(config, &[]).unwrap_or_default();
        Self {
            identifier: identifier.into(),
            state: Mutex::new(DeviceState {
                startup: running.clone(),
                running,
                files: HashMap::new(),
                sessions: IndexMap::new(),
                log: Vec::new(),
                rejects: Vec::new(),
                failures: Vec::new(),
                responses: HashMap::new(),
            }),
        }
    }

    /// Rendered running configuration.
    pub fn running_config(&self) -> String {
        self.state.lock().running.render()
    }

    /// Rendered startup configuration.
    pub fn startup_config(&self) -> String {
        self.state.lock().startup.render()
    }

    /// Names of sessions that are still pending.
    pub fn pending_sessions(&self) -> Vec<String> {
        self.state
            .lock()
            .sessions
            .iter()
            .filter(|(_, s)| !s.completed)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Content of a flash file.
    pub fn file(&self, url: &str) -> Option<String> {
        self.state.lock().files.get(url).cloned()
    }

    /// Put a file on flash.
    pub fn put_file(&self, url: &str, content: &str) {
        self.state
            .lock()
            .files
            .insert(url.to_string(), content.to_string());
    }

    /// Create a pending session, as left behind by a crashed process.
    pub fn add_pending_session(&self, name: &str) {
        let mut state = self.state.lock();
        let config = state.running.clone();
        state.sessions.insert(
            name.to_string(),
            SimSession {
                config,
                completed: false,
            },
        );
    }

    /// Reject every configuration line containing `pattern`.
    pub fn reject_lines_containing(&self, pattern: &str) {
        self.state.lock().rejects.push(pattern.to_string());
    }

    /// Make commands starting with `prefix` fail with `message`.
    pub fn fail_command(&self, prefix: &str, message: &str) {
        self.state
            .lock()
            .failures
            .push((prefix.to_string(), message.to_string()));
    }

    /// Stop failing commands.
    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    /// Answer `command` with a JSON result.
    pub fn set_json_response(&self, command: &str, value: Value) {
        self.state
            .lock()
            .responses
            .insert(command.to_string(), CommandOutput::new(value));
    }

    /// Answer `command` with text output.
    pub fn set_text_response(&self, command: &str, output: &str) {
        self.state
            .lock()
            .responses
            .insert(command.to_string(), CommandOutput::text(output));
    }

    /// Every command received, in order.
    pub fn commands(&self) -> Vec<String> {
        self.state.lock().log.clone()
    }

    /// Number of commands received.
    pub fn command_count(&self) -> usize {
        self.state.lock().log.len()
    }

    /// Forget the command log.
    pub fn clear_log(&self) {
        self.state.lock().log.clear();
    }
}

fn session_diff(running: &DeviceConfig, session: &DeviceConfig, name: &str) -> String {
    let old = running.render();
    let new = session.render();
    TextDiff::from_lines(&old, &new)
        .unified_diff()
        .context_radius(3)
        .header(
            "system:/running-config",
            &format!("session:/{}-session-config", name),
        )
        .to_string()
}

fn empty() -> CommandOutput {
    CommandOutput::new(json!({}))
}

impl DeviceState {
    /// Run one command. `session` is the session the batch is in, if any.
    fn execute(
        &mut self,
        command: &Command,
        session: &mut Option<String>,
        section: &mut Option<usize>,
    ) -> Result<CommandOutput, String> {
        let line = command.line().trim();

        if let Some((_, message)) = self.failures.iter().find(|(p, _)| line.starts_with(p.as_str())) {
            return Err(message.clone());
        }
        if let Some(output) = self.responses.get(line) {
            return Ok(output.clone());
        }
        if line == "enable" {
            return Ok(empty());
        }

        if let Some(name) = line.strip_prefix("configure session ") {
            let name = name.trim().to_string();
            let running = self.running.clone();
            let entry = self.sessions.entry(name.clone()).or_insert(SimSession {
                config: running,
                completed: false,
            });
            if entry.completed {
                return Err(format!("% Cannot enter session {} (completed)", name));
            }
            *session = Some(name);
            *section = None;
            return Ok(empty());
        }

        if let Some(name) = session.clone() {
            return self.execute_in_session(&name, line, session, section);
        }

        if let Some(rest) = line.strip_prefix("show session-config named ") {
            let name = rest.trim_end_matches(" diffs").trim();
            let sim = self
                .sessions
                .get(name)
                .ok_or_else(|| format!("% Session {} does not exist", name))?;
            return Ok(CommandOutput::text(session_diff(&self.running, &sim.config, name)));
        }
        if let Some(url) = line.strip_prefix("copy running-config ") {
            let rendered = self.running.render();
            self.files.insert(url.trim().to_string(), rendered);
            return Ok(empty());
        }
        if let Some(url) = line.strip_prefix("copy terminal: ") {
            let input = command.input().unwrap_or_default().to_string();
            self.files.insert(url.trim().to_string(), input);
            return Ok(empty());
        }
        if let Some(url) = line.strip_prefix("configure replace ") {
            let text = self
                .files
                .get(url.trim())
                .ok_or_else(|| format!("% Error copying {} (No such file or directory)", url))?;
            self.running = DeviceConfig::parse(text, &self.rejects)?;
            return Ok(empty());
        }
        if let Some(url) = line.strip_prefix("dir ") {
            return if self.files.contains_key(url.trim()) {
                Ok(CommandOutput::text(format!("Directory of {}\n", url)))
            } else {
                Err(format!("% Error listing {} (No such file or directory)", url))
            };
        }

        match line {
            "write memory" => {
                self.startup = self.running.clone();
                Ok(CommandOutput::text("Copy completed successfully.\n"))
            }
            "show running-config" => Ok(CommandOutput::text(format!(
                "! Command: show running-config\n{}end\n",
                self.running.render()
            ))),
            "show configuration sessions" => {
                let sessions: serde_json::Map<String, Value> = self
                    .sessions
                    .iter()
                    .map(|(name, s)| {
                        let state = if s.completed { "completed" } else { "pending" };
                        (name.clone(), json!({ "state": state, "description": "" }))
                    })
                    .collect();
                Ok(CommandOutput::new(json!({ "sessions": sessions })))
            }
            "show hostname" => Ok(CommandOutput::new(json!({ "hostname": "leaf1", "fqdn": "leaf1.lab" }))),
            _ => Err(format!("% Invalid input (at token 0: '{}')", first_word(line))),
        }
    }

    fn execute_in_session(
        &mut self,
        name: &str,
        line: &str,
        session: &mut Option<String>,
        section: &mut Option<usize>,
    ) -> Result<CommandOutput, String> {
        match line {
            "end" => {
                *session = None;
                Ok(empty())
            }
            "abort" => {
                self.sessions.shift_remove(name);
                *session = None;
                Ok(empty())
            }
            "commit" => {
                let sim = self
                    .sessions
                    .get_mut(name)
                    .ok_or_else(|| format!("% Session {} does not exist", name))?;
                sim.completed = true;
                self.running = sim.config.clone();
                *session = None;
                Ok(empty())
            }
            "rollback clean-config" => {
                if let Some(sim) = self.sessions.get_mut(name) {
                    sim.config = DeviceConfig::default();
                }
                *section = None;
                Ok(empty())
            }
            "show session-config diffs" => {
                let sim = self
                    .sessions
                    .get(name)
                    .ok_or_else(|| format!("% Session {} does not exist", name))?;
                Ok(CommandOutput::text(session_diff(&self.running, &sim.config, name)))
            }
            _ => {
                if let Some(url) = line.strip_prefix("configure replace ") {
                    let text = self
                        .files
                        .get(url.trim())
                        .ok_or_else(|| format!("% Error copying {} (No such file or directory)", url))?
                        .clone();
                    let parsed = DeviceConfig::parse(&text, &self.rejects)?;
                    if let Some(sim) = self.sessions.get_mut(name) {
                        sim.config = parsed;
                    }
                    *section = None;
                    return Ok(empty());
                }

                let rejects = self.rejects.clone();
                let sim = self
                    .sessions
                    .get_mut(name)
                    .ok_or_else(|| format!("% Session {} does not exist", name))?;
                sim.config.apply(line, section, &rejects)?;
                Ok(empty())
            }
        }
    }
}

#[async_trait]
impl CommandChannel for MockDevice {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn run_commands(
        &self,
        commands: &[Command],
        _format: OutputFormat,
    ) -> ConnectionResult<Vec<CommandOutput>> {
        let mut state = self.state.lock();
        let mut session = None;
        let mut section = None;
        let mut outputs = Vec::with_capacity(commands.len());

        for (index, command) in commands.iter().enumerate() {
            state.log.push(command.line().to_string());
            match state.execute(command, &mut session, &mut section) {
                Ok(output) => outputs.push(output),
                Err(message) => {
                    return Err(ConnectionError::CommandRejected {
                        index,
                        command: command.line().to_string(),
                        message,
                    })
                }
            }
        }

        Ok(outputs)
    }
}
