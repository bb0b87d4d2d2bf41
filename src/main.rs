//! netcommit - staged configuration changes for Arista EOS
//!
//! This is the main entry point for the netcommit CLI.

mod cli;

use anyhow::{Context, Result};
use cli::commands::{inventory, lifecycle, CommandContext};
use cli::{Cli, Commands};
use netcommit::config::Config;
use netcommit::telemetry::LoggingBuilder;

/// Application version information
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    let config = Config::load(cli.config.as_ref()).context("failed to load configuration")?;

    init_logging(&cli, &config)?;
    tracing::debug!(version = VERSION, "netcommit starting");

    let mut ctx = CommandContext::new(&cli, config);

    let exit_code = match run(&cli.command, &mut ctx).await {
        Ok(code) => code,
        Err(e) => report(&ctx, &e),
    };
    ctx.output.flush();

    std::process::exit(exit_code);
}

async fn run(command: &Commands, ctx: &mut CommandContext) -> Result<i32> {
    match command {
        Commands::Diff(args) => args.execute(ctx).await,
        Commands::Apply(args) => args.execute(ctx).await,
        Commands::Discard => lifecycle::discard(ctx).await,
        Commands::Rollback => lifecycle::rollback(ctx).await,
        Commands::Facts => inventory::facts(ctx).await,
        Commands::Interfaces => inventory::interfaces(ctx).await,
        Commands::Bgp => inventory::bgp(ctx).await,
        Commands::Lldp => inventory::lldp(ctx).await,
    }
}

/// Initialize logging from the `[logging]` section and `-v` flags
fn init_logging(cli: &Cli, config: &Config) -> Result<()> {
    LoggingBuilder::from_config(&config.logging)?
        .with_verbosity(cli.verbosity())
        .with_ansi(!cli.no_color)
        .with_spans(cli.verbosity() >= 3)
        .init()?;
    Ok(())
}

/// Print a failed command and pick the exit status.
fn report(ctx: &CommandContext, error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<netcommit::Error>() {
        Some(e) if e.is_warning() => {
            ctx.output.warning(&e.to_string());
            ctx.output
                .hint("running and startup configurations differ until 'write memory' succeeds");
            e.exit_code()
        }
        Some(e) => {
            ctx.output.error(&format!("{:#}", error));
            if matches!(e, netcommit::Error::CommitSequence { snapshot_taken: true, .. }) {
                ctx.output.hint("run 'netcommit rollback' to restore the snapshot");
            }
            e.exit_code()
        }
        None => {
            ctx.output.error(&format!("{:#}", error));
            1
        }
    }
}
