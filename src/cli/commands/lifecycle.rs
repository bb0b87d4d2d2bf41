//! Discard and rollback commands

use super::CommandContext;
use anyhow::Result;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct DiscardReport {
    aborted: Vec<String>,
}

#[derive(Debug, Serialize)]
struct RollbackReport {
    slot: String,
    persisted: bool,
}

/// Abort the pending session and any leftover sessions with our prefix.
pub async fn discard(ctx: &mut CommandContext) -> Result<i32> {
    let mut driver = ctx.connect().await?;

    let mut aborted = Vec::new();
    if let Some(name) = driver.discard().await? {
        aborted.push(name);
    }

    if aborted.is_empty() {
        ctx.output.success("no pending session");
    } else {
        ctx.output.list("Aborted sessions", &aborted);
    }
    ctx.output.data(&DiscardReport { aborted })?;
    Ok(0)
}

/// Restore the snapshot taken before the last merge commit.
pub async fn rollback(ctx: &mut CommandContext) -> Result<i32> {
    let mut driver = ctx.connect().await?;
    let slot = driver.snapshot().slot().to_string();

    ctx.output.banner("ROLLBACK");
    ctx.output.info(&format!("Restoring running-config from {}", slot));

    let not_persisted = match driver.rollback().await {
        Ok(()) => None,
        Err(e) if e.is_warning() => Some(e),
        Err(e) => return Err(e.into()),
    };

    ctx.output.data(&RollbackReport {
        slot: slot.clone(),
        persisted: not_persisted.is_none(),
    })?;
    if let Some(e) = not_persisted {
        return Err(e.into());
    }

    ctx.output.success(&format!("running-config restored from {}", slot));
    Ok(0)
}
