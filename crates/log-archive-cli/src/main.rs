mod config;
mod console;
mod schedule;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log_archive::{CancellationToken, Orchestrator, RunOutcome, StatusSink};
use tracing_subscriber::EnvFilter;

use crate::config::Overrides;
use crate::console::{ConsoleMode, ConsoleSink};
use crate::schedule::Trigger;

#[derive(Parser)]
#[command(name = "log-archive", version)]
#[command(about = "Archive the log files of a directory tree, once or on a schedule")]
struct Cli {
    /// Source log directory
    #[arg(short = 'd', long)]
    directory: Option<PathBuf>,
    /// Destination directory for archives
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,
    /// Archive format (tar.gz | zip | gz) [default: tar.gz]
    #[arg(short = 'f', long)]
    format: Option<String>,
    /// Cron expression; runs repeatedly until interrupted
    #[arg(short = 's', long)]
    schedule: Option<String>,
    /// Config file (defaults to ./.logarchiverc.json, then the user config dir)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,
    /// More log output (-v info, -vv debug). RUST_LOG takes precedence
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Only report failures
    #[arg(short = 'q', long)]
    quiet: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            directory: self.directory.clone(),
            output: self.output.clone(),
            format: self.format.clone(),
            schedule: self.schedule.clone(),
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Cancel `token` on Ctrl-C so the schedule stops and a run in flight winds down.
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling");
            token.cancel();
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let file_config = config::load_config(cli.config.as_deref())?;
    let options = Arc::new(config::resolve(cli.overrides(), file_config)?);

    let orchestrator = Arc::new(Orchestrator::new());
    let sink: Arc<dyn StatusSink> = Arc::new(ConsoleSink::new(ConsoleMode::detect(cli.quiet)));
    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    if let Some(expr) = options.schedule() {
        let schedule = schedule::parse(expr)
            .with_context(|| format!("invalid schedule expression: {expr}"))?;
        println!("Scheduled at: {expr}");

        let trigger = Trigger {
            orchestrator,
            options: Arc::clone(&options),
            sink,
            cancel,
        };
        schedule::run_on_schedule(schedule, trigger).await;
        return Ok(());
    }

    let outcome = tokio::task::spawn_blocking(move || {
        orchestrator.run_once(&options, sink.as_ref(), &cancel)
    })
    .await
    .context("archive run panicked")??;

    if let RunOutcome::Completed(summary) = outcome
        && summary.groups_archived == 0
        && summary.failures > 0
    {
        anyhow::bail!("all {} archive(s) failed", summary.failures);
    }

    Ok(())
}
