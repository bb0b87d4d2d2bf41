//! Output formatting for netcommit
//!
//! Human output is colored text on stdout with diagnostics on stderr.
//! JSON and YAML modes print one document per result so that the output can
//! be piped into other tools.

use super::OutputFormat;
use colored::Colorize;
use serde::Serialize;
use std::io::{self, Write};
use std::time::{Duration, Instant};

/// Output formatter for the selected output mode
pub struct OutputFormatter {
    /// Use colored output
    use_color: bool,
    /// Output mode
    format: OutputFormat,
    /// Verbosity level
    verbosity: u8,
    /// Start time for duration calculations
    start_time: Instant,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(use_color: bool, format: OutputFormat, verbosity: u8) -> Self {
        // Respect NO_COLOR environment variable
        let use_color = use_color && std::env::var("NO_COLOR").is_err();

        Self {
            use_color,
            format,
            verbosity,
            start_time: Instant::now(),
        }
    }

    fn structured(&self) -> bool {
        !matches!(self.format, OutputFormat::Human)
    }

    /// Print a banner/header
    pub fn banner(&self, title: &str) {
        if self.structured() {
            return;
        }

        let line = "=".repeat(title.len() + 4);
        if self.use_color {
            println!("\n{}", line.bright_blue());
            println!("{}", format!("  {}  ", title).bright_blue().bold());
            println!("{}\n", line.bright_blue());
        } else {
            println!("\n{}", line);
            println!("  {}  ", title);
            println!("{}\n", line);
        }
    }

    /// Print a section header
    pub fn section(&self, title: &str) {
        if self.structured() {
            return;
        }

        if self.use_color {
            println!("\n{}", title.cyan().bold());
            println!("{}", "-".repeat(title.len()).cyan());
        } else {
            println!("\n{}", title);
            println!("{}", "-".repeat(title.len()));
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.structured() {
            self.event("error", message);
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "ERROR:".red().bold(), message);
        } else {
            eprintln!("ERROR: {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.structured() {
            self.event("warning", message);
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "WARNING:".yellow().bold(), message);
        } else {
            eprintln!("WARNING: {}", message);
        }
    }

    /// Print a hint message
    pub fn hint(&self, message: &str) {
        if self.structured() {
            self.event("hint", message);
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "HINT:".cyan().bold(), message);
        } else {
            eprintln!("HINT: {}", message);
        }
    }

    /// Print an info message (respects verbosity)
    pub fn info(&self, message: &str) {
        if self.verbosity < 1 || self.structured() {
            return;
        }

        if self.use_color {
            println!("{} {}", "INFO:".blue(), message);
        } else {
            println!("INFO: {}", message);
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.structured() {
            return;
        }

        if self.use_color {
            println!("{} {}", "OK:".green().bold(), message);
        } else {
            println!("OK: {}", message);
        }
    }

    fn event(&self, kind: &str, message: &str) {
        let event = serde_json::json!({
            "type": kind,
            "message": message
        });
        eprintln!("{}", serde_json::to_string(&event).unwrap_or_default());
    }

    /// Print a device-computed configuration diff
    pub fn config_diff(&self, diff: &str) {
        if self.structured() {
            return;
        }

        if diff.trim().is_empty() {
            println!("(no changes)");
            return;
        }

        for line in diff.lines() {
            if !self.use_color {
                println!("{}", line);
            } else if line.starts_with("+++") || line.starts_with("---") {
                println!("{}", line.bold());
            } else if line.starts_with('+') {
                println!("{}", line.green());
            } else if line.starts_with('-') {
                println!("{}", line.red());
            } else if line.starts_with("@@") {
                println!("{}", line.cyan());
            } else {
                println!("{}", line);
            }
        }
    }

    /// Print a list of items
    pub fn list(&self, title: &str, items: &[String]) {
        if self.structured() {
            return;
        }

        if self.use_color {
            println!("\n{}:", title.bright_white().bold());
        } else {
            println!("\n{}:", title);
        }

        for item in items {
            if self.use_color {
                println!("  {} {}", "-".bright_black(), item);
            } else {
                println!("  - {}", item);
            }
        }
    }

    /// Print a table
    pub fn table(&self, headers: &[&str], rows: &[Vec<String>]) {
        if self.structured() {
            return;
        }

        let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
        for row in rows {
            for (i, cell) in row.iter().enumerate() {
                if i < widths.len() {
                    widths[i] = widths[i].max(cell.len());
                }
            }
        }

        let header_line = headers
            .iter()
            .enumerate()
            .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
            .collect::<Vec<_>>()
            .join(" | ");
        if self.use_color {
            println!("{}", header_line.bright_white().bold());
        } else {
            println!("{}", header_line);
        }

        let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        if self.use_color {
            println!("{}", sep.join("-+-").bright_black());
        } else {
            println!("{}", sep.join("-+-"));
        }

        for row in rows {
            let line = row
                .iter()
                .zip(widths.iter())
                .map(|(cell, width)| format!("{:width$}", cell, width = *width))
                .collect::<Vec<_>>()
                .join(" | ");
            println!("{}", line);
        }
    }

    /// Print a structured result in JSON or YAML mode. Does nothing in
    /// human mode.
    pub fn data<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Human => {}
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
            OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
        }
        Ok(())
    }

    /// Print how long the command took (verbose only)
    pub fn elapsed(&self) {
        if self.verbosity < 1 || self.structured() {
            return;
        }

        let duration = format_duration(self.start_time.elapsed());
        if self.use_color {
            println!("\n{} {}", "Completed in".bright_black(), duration.bright_white());
        } else {
            println!("\nCompleted in {}", duration);
        }
    }

    /// Flush stdout
    pub fn flush(&self) {
        let _ = io::stdout().flush();
    }
}

/// Format a duration as a human-readable string
fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}.{:03}s", secs, millis)
    } else {
        format!("{}ms", millis)
    }
}
