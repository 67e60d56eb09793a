//! Filter optimizer - main entry point
//!
//! This binary provides three subcommands:
//! - optimize: Score every filter combination for an instrument and print the ranked results
//! - import: Load a CSV export of trades into the store
//! - init: Register a configuration from a JSON settings file

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use filter_optimizer::Priority;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

const DB_ENV: &str = "OPTIMIZER_DB";
const DEFAULT_DB: &str = "data/optimizer.db";

#[derive(Parser, Debug)]
#[command(name = "filter-optimizer")]
#[command(about = "Combinatorial backtesting of trade filter combinations", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// SQLite database path (falls back to $OPTIMIZER_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
}

/// Where progress percentages go during an optimize run
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProgressTarget {
    /// job_progress table in the store
    Db,
    /// Progress bar on stderr
    Bar,
    /// Log file only
    Log,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Optimize filter combinations for an instrument
    Optimize {
        /// Instrument identifier, e.g. EURUSD
        instrument: String,

        /// Configuration id in the store
        config_id: i64,

        /// Job identifier used for progress reporting
        job_id: String,

        /// Worker pool width
        #[arg(short, long, value_enum, default_value_t = Priority::Normal)]
        priority: Priority,

        /// Progress destination
        #[arg(long, value_enum, default_value_t = ProgressTarget::Db)]
        progress: ProgressTarget,

        /// Progress interval in seconds
        #[arg(long, default_value = "2")]
        interval: u64,
    },

    /// Import trades from a CSV export
    Import {
        /// Instrument identifier, e.g. EURUSD
        instrument: String,

        /// Timeframe sheet name the trades belong to
        timeframe: String,

        /// Path to the CSV file
        csv: PathBuf,
    },

    /// Register a configuration from a JSON settings file
    Init {
        /// Configuration name
        name: String,

        /// Path to the settings JSON
        settings: PathBuf,
    },
}

fn setup_logging(verbose: bool, command_name: &str, file_only: bool) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    // {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    let level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if file_only {
        // stdout carries the JSON result, stderr the progress bar
        let file_appender = tracing_appender::rolling::never("logs", &log_filename);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    } else {
        let console_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(true);

        // Same format as the console, without ANSI colors
        let file_appender = tracing_appender::rolling::never("logs", &log_filename);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        info!("Logging initialized");
        info!("Log file: {}", log_path.display());
    }

    Ok(())
}

fn database_path(cli_db: Option<PathBuf>) -> PathBuf {
    cli_db
        .or_else(|| std::env::var_os(DB_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB))
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let (command_name, file_only) = match &cli.command {
        Commands::Optimize { .. } => ("optimize", true),
        Commands::Import { .. } => ("import", false),
        Commands::Init { .. } => ("init", false),
    };

    setup_logging(cli.verbose, command_name, file_only)?;
    let db = database_path(cli.db);

    match cli.command {
        Commands::Optimize {
            instrument,
            config_id,
            job_id,
            priority,
            progress,
            interval,
        } => commands::optimize::run(db, instrument, config_id, job_id, priority, progress, interval),

        Commands::Import {
            instrument,
            timeframe,
            csv,
        } => commands::import::run(db, instrument, timeframe, csv),

        Commands::Init { name, settings } => commands::init::run(db, name, settings),
    }
}
