//! binexport
//!
//! Exports a time-indexed MongoDB collection as size-bounded, compressed
//! JSON Lines files plus a CSV manifest.
//!
//! # Usage
//!
//! ```bash
//! binexport -d telemetry -t events \
//!     --start 2024-01-01T00:00:00Z --end 2024-02-01T00:00:00Z \
//!     --max-records 250000 -o ./export
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use binexport::backend::MongoBackend;
use binexport::cli::CliInterface;
use binexport::connection::ConnectionManager;
use binexport::error::Result;
use binexport::executor::{ExportPipeline, RunReport};
use binexport::formatter::{PlanTableFormatter, StatsFormatter};

/// Application entry point
#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Main application logic
///
/// 1. Parse command-line arguments and load configuration
/// 2. Initialize logging
/// 3. Handle subcommands or run the export
///
/// # Returns
/// * `Result<bool>` - Whether every bin was exported
async fn run() -> Result<bool> {
    let cli = CliInterface::new()?;

    initialize_logging(&cli);

    if cli.handle_subcommand().await? {
        return Ok(true);
    }

    let settings = cli.export_settings()?;
    let plan_only = settings.plan_only;
    settings.prepare_output_dir()?;

    let mut conn_manager = ConnectionManager::new(cli.config().connection.clone());
    conn_manager.connect().await?;

    let collection = conn_manager.get_collection(&settings.database, &settings.collection)?;
    let backend = MongoBackend::new(
        collection,
        settings.time_field.clone(),
        settings.filter.clone(),
        settings.retry.timeout,
    );

    let cancel_token = CancellationToken::new();
    let ctrl_c_handle = spawn_ctrl_c_listener(cancel_token.clone());

    let result = ExportPipeline::new(Arc::new(backend), settings)
        .with_cancellation(cancel_token)
        .run()
        .await;

    ctrl_c_handle.abort();
    conn_manager.disconnect().await?;

    let report = result?;
    print_report(&report, plan_only, cli.args().quiet);
    Ok(report.succeeded())
}

/// Cancel the export between bins on Ctrl+C
fn spawn_ctrl_c_listener(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, stopping after the current bin");
                token.cancel();
            }
            Err(err) => {
                eprintln!("Failed to listen for Ctrl+C: {}", err);
            }
        }
    })
}

/// Print the plan and the run statistics
fn print_report(report: &RunReport, plan_only: bool, quiet: bool) {
    let stats = StatsFormatter::default();

    if plan_only {
        println!("{}", PlanTableFormatter::new().format(&report.consolidated_bins));
    }
    if !quiet || plan_only {
        println!(
            "{}",
            stats.format_plan(&report.plan, report.consolidated_bins.len())
        );
    }

    if let Some(summary) = &report.summary {
        if !quiet || !summary.is_clean() {
            println!("{}", stats.format_export(summary));
        }
        info!("Run finished");
    }
}

/// Initialize logging system based on the effective log level
///
/// `RUST_LOG`, when set, takes precedence over the configured level.
///
/// # Arguments
/// * `cli` - CLI interface with logging settings
fn initialize_logging(cli: &CliInterface) {
    let level: Level = cli.config().logging.level.to_tracing_level();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::default().add_directive(LevelFilter::from_level(level).into())
    });

    // Build subscriber with level filter
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    // Configure timestamps
    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
