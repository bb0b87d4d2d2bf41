//! Diff and apply commands
//!
//! Both stage a candidate and print the device-computed diff. `diff`
//! always discards afterwards; `apply` commits unless `--check` is given or
//! there is nothing to change.

use super::CommandContext;
use anyhow::Result;
use clap::Parser;
use netcommit::connection::EapiChannel;
use netcommit::network::{ConfigMode, ConfigSource, EosDriver};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Arguments for the diff command
#[derive(Parser, Debug, Clone)]
pub struct DiffArgs {
    /// Candidate configuration file
    #[arg(required = true)]
    pub file: PathBuf,

    /// Merge the file into the running configuration instead of replacing it
    #[arg(long)]
    pub merge: bool,
}

/// Arguments for the apply command
#[derive(Parser, Debug, Clone)]
pub struct ApplyArgs {
    /// Candidate configuration file
    #[arg(required = true)]
    pub file: PathBuf,

    /// Merge the file into the running configuration
    #[arg(long, conflicts_with = "replace")]
    pub merge: bool,

    /// Replace the whole running configuration (default)
    #[arg(long)]
    pub replace: bool,

    /// Stage and diff only, never commit
    #[arg(long)]
    pub check: bool,
}

/// Result of a diff or apply run
#[derive(Debug, Serialize)]
struct ChangeReport {
    device: String,
    mode: ConfigMode,
    session: Option<String>,
    diff: String,
    committed: bool,
    snapshot: Option<String>,
}

fn selected_mode(merge: bool) -> ConfigMode {
    if merge {
        ConfigMode::Merge
    } else {
        ConfigMode::Replace
    }
}

/// Stage `file` and return the session name (merge only) and the diff.
async fn stage_and_diff(
    ctx: &CommandContext,
    driver: &mut EosDriver<EapiChannel>,
    file: &Path,
    mode: ConfigMode,
) -> Result<(Option<String>, String)> {
    let source = ConfigSource::File(file.to_path_buf());
    ctx.output
        .info(&format!("Staging {} as {} candidate", file.display(), mode));

    let session = match mode {
        ConfigMode::Merge => Some(driver.stage_merge(source).await?),
        ConfigMode::Replace => {
            driver.stage_replace(source).await?;
            None
        }
    };

    let diff = driver.diff().await?;
    ctx.output.section("Pending changes");
    ctx.output.config_diff(&diff);
    Ok((session, diff))
}

/// Discard after a failed step without hiding the original error.
async fn discard_after_failure(ctx: &CommandContext, driver: &mut EosDriver<EapiChannel>) {
    if let Err(e) = driver.discard().await {
        ctx.output.warning(&format!("discard failed: {}", e));
    }
}

impl DiffArgs {
    /// Execute the diff command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let mut driver = ctx.connect().await?;
        let mode = selected_mode(self.merge);

        let (session, diff) = match stage_and_diff(ctx, &mut driver, &self.file, mode).await {
            Ok(staged) => staged,
            Err(e) => {
                discard_after_failure(ctx, &mut driver).await;
                return Err(e);
            }
        };
        driver.discard().await?;

        ctx.output.data(&ChangeReport {
            device: driver.channel().url().to_string(),
            mode,
            session,
            diff,
            committed: false,
            snapshot: None,
        })?;
        Ok(0)
    }
}

impl ApplyArgs {
    /// Execute the apply command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let mut driver = ctx.connect().await?;
        let mode = selected_mode(self.merge);

        let (session, diff) = match stage_and_diff(ctx, &mut driver, &self.file, mode).await {
            Ok(staged) => staged,
            Err(e) => {
                discard_after_failure(ctx, &mut driver).await;
                return Err(e);
            }
        };

        let mut report = ChangeReport {
            device: driver.channel().url().to_string(),
            mode,
            session,
            committed: false,
            snapshot: None,
            diff,
        };

        if report.diff.trim().is_empty() || self.check {
            driver.discard().await?;
            if self.check {
                ctx.output.hint("check mode, nothing committed");
            } else {
                ctx.output.success("no changes to commit");
            }
            ctx.output.data(&report)?;
            return Ok(0);
        }

        let committed = driver.commit().await;
        report.committed = match &committed {
            Ok(()) => true,
            Err(e) => e.is_warning(),
        };
        if mode == ConfigMode::Merge && driver.snapshot().is_available() {
            report.snapshot = Some(driver.snapshot().slot().to_string());
        }
        ctx.output.data(&report)?;
        committed?;

        ctx.output.success(&format!("{} committed and saved", mode));
        ctx.output.elapsed();
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_selection() {
        assert_eq!(selected_mode(true), ConfigMode::Merge);
        assert_eq!(selected_mode(false), ConfigMode::Replace);
    }
}
