//! mysql-table-diff CLI - chunked table comparison between two MySQL databases.

use clap::Parser;
use mysql_table_diff::{Config, Diff, DiffError, DiffOutcome};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "mysql-table-diff")]
#[command(about = "Chunked table diff between two MySQL-protocol databases")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output the JSON report to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(outcome) => match outcome {
            DiffOutcome::Pass => ExitCode::SUCCESS,
            DiffOutcome::Fail => ExitCode::from(1),
        },
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<DiffOutcome, DiffError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(DiffError::Config)?;

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    let cancel_token = setup_signal_handler();
    let summary_file = config.check.summary_file.clone();

    let diff = Diff::new(config, cancel_token).await?;
    let report = diff.equal().await?;

    report.log_summary();
    if let Some(path) = summary_file {
        report.commit_summary(&path)?;
    }
    if cli.output_json {
        println!("{}", report.to_json()?);
    }

    let outcome = report.outcome();
    match outcome {
        DiffOutcome::Pass => info!("Check passed: all tables are equal"),
        DiffOutcome::Fail => info!("Check failed: differences were found"),
    }
    Ok(outcome)
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM. Returns a CancellationToken
/// that will be cancelled when a signal is received.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    let token_int = cancel_token.clone();
    let token_term = cancel_token.clone();

    tokio::spawn(async move {
        if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
            sigint.recv().await;
            eprintln!("\nReceived SIGINT. Shutting down gracefully...");
            token_int.cancel();
        }
    });

    tokio::spawn(async move {
        if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
            sigterm.recv().await;
            eprintln!("\nReceived SIGTERM. Shutting down gracefully...");
            token_term.cancel();
        }
    });

    cancel_token
}

/// Setup signal handler for Windows (only SIGINT/Ctrl-C).
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Shutting down gracefully...");
            token.cancel();
        }
    });

    cancel_token
}
