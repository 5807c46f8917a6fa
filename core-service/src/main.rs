//! Blob Sidecar command line
//!
//! Usage:
//!     blob-sidecar [--config config.json] [sync]
//!     blob-sidecar [--config config.json] pending [--json]

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use core_runtime::config::SidecarConfig;
use core_runtime::events::{SyncEvent, SyncPhase};
use core_runtime::logging::{init_logging, redact_sas, LogFormat, LogLevel, LoggingConfig};
use core_service::{bootstrap_desktop, CoreService};
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(
    name = "blob-sidecar",
    version,
    about = "Mirror blob container objects into local sidecar records"
)]
struct Args {
    /// Configuration file
    #[arg(long, short, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormatArg::Compact, global = true)]
    log_format: LogFormatArg,

    /// Debug-level logging for the sync crates
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Reconcile the container with its sidecar records (default)
    Sync,
    /// List records still waiting for annotation
    Pending {
        /// Print the list as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormatArg {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
            LogFormatArg::Compact => LogFormat::Compact,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    init_logging(
        LoggingConfig::default()
            .with_format(args.log_format.into())
            .with_level(level),
    )?;

    let config = SidecarConfig::from_json_file(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;

    info!(
        container = %redact_sas(&config.container_url),
        extensions = ?config.extensions,
        sidecar_root = %config.sidecar_root.display(),
        "Configuration loaded"
    );

    let service = bootstrap_desktop(config)?;

    match args.command.unwrap_or(Command::Sync) {
        Command::Sync => run_sync(&service).await,
        Command::Pending { json } => list_pending(&service, json).await,
    }
}

async fn run_sync(service: &CoreService) -> anyhow::Result<()> {
    let mut events = service.events().subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(line) = render(&event) {
                        println!("{}", line);
                    }
                    if event.is_terminal() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Progress display fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    match service.sync().await {
        Ok(summary) => {
            let _ = printer.await;
            if !summary.is_clean() {
                println!(
                    "{} object(s) could not be processed; see the log for details",
                    summary.failed
                );
            }
            Ok(())
        }
        Err(e) => {
            printer.abort();
            Err(e).context("Sync run failed")
        }
    }
}

async fn list_pending(service: &CoreService, json: bool) -> anyhow::Result<()> {
    let pending = service.pending().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&pending)?);
        return Ok(());
    }

    for record in &pending {
        println!(
            "{}\t{}",
            record.path.display(),
            record.link.as_deref().unwrap_or("-")
        );
    }
    println!("{} unprocessed record(s)", pending.len());
    Ok(())
}

/// One display line per event worth showing.
fn render(event: &SyncEvent) -> Option<String> {
    match event {
        SyncEvent::RunStarted { run_stamp } => Some(format!("Sync run {} started", run_stamp)),
        SyncEvent::PhaseStarted {
            phase: SyncPhase::Counting,
        } => Some("Counting remote objects...".to_string()),
        SyncEvent::PhaseStarted { .. } => None,
        SyncEvent::TotalCounted { total } => Some(format!("Total: {} files", total)),
        SyncEvent::Progress {
            phase: SyncPhase::Reconcile,
            processed,
            total,
        } => Some(match total {
            Some(total) => format!(
                "Create JSON Processing... {}/{} files processed",
                processed, total
            ),
            None => format!("Create JSON Processing... {} files processed", processed),
        }),
        SyncEvent::Progress {
            phase: SyncPhase::Sweep,
            processed,
            ..
        } => Some(format!(
            "Delete Not Exists JSON Processing... {} records checked",
            processed
        )),
        SyncEvent::Progress { .. } => None,
        SyncEvent::PhaseCompleted {
            phase,
            processed,
            changed,
            failed,
            duration_ms,
        } => match phase {
            SyncPhase::Counting => None,
            SyncPhase::Reconcile => Some(format!(
                "Create JSON Finish! {} processed, {} created, {} failed ({} ms)",
                processed, changed, failed, duration_ms
            )),
            SyncPhase::Sweep => Some(format!(
                "Delete Not Exists JSON Finish! {} checked, {} deleted, {} failed ({} ms)",
                processed, changed, failed, duration_ms
            )),
        },
        SyncEvent::RunCompleted {
            created,
            restamped,
            deleted,
            failed,
            duration_ms,
            ..
        } => Some(format!(
            "Done: {} created, {} restamped, {} deleted, {} failed in {} ms",
            created, restamped, deleted, failed, duration_ms
        )),
        SyncEvent::RunFailed { message, .. } => Some(format!("Sync failed: {}", message)),
    }
}
