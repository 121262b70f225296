//! shuttle - pickup and dropoff tracking for care-facility shuttles.
//!
//! Drivers check riders on and off from the terminal. Every change is kept
//! locally and delivered when the backend is reachable.

mod app;
mod cli;
mod commands;

use std::io;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shuttlecache_core::Config;

use app::App;
use cli::{AdminCommand, Cli, Commands};
use commands::{admin, driver};

/// Log file name prefix; the appender adds the date.
const LOG_FILE_PREFIX: &str = "shuttle.log";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr, filtered by `RUST_LOG` (default `warn`). With
/// `log_to_file` set they are also written to a daily file; the returned
/// guard must live until exit so buffered lines are flushed.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match config.log_to_file.then(Config::data_dir) {
        Some(Ok(dir)) => {
            let appender = tracing_appender::rolling::daily(dir.join("logs"), LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

async fn run(cli: Cli, app: &App) -> Result<()> {
    match cli.command {
        Commands::Config(args) => driver::config(app, args),
        Commands::Init { admin } => driver::init(app, admin).await,
        Commands::Setup(args) => driver::setup(app, args).await,
        Commands::Vehicles { all } => driver::vehicles(app, all).await,
        Commands::Schedule { filter, refresh } => driver::schedule(app, filter, refresh).await,
        Commands::Check { schedule_id } => driver::check(app, &schedule_id).await,
        Commands::Status {
            schedule_id,
            status,
            note,
        } => driver::status(app, &schedule_id, &status, note).await,
        Commands::Sync { watch, interval } => driver::sync(app, watch, interval).await,
        Commands::Pending => driver::pending(app).await,
        Commands::ApiInfo => driver::api_info(app).await,
        Commands::Admin(command) => match command {
            AdminCommand::Status { refresh } => admin::status(app, refresh).await,
            AdminCommand::Templates { course } => admin::templates(app, course).await,
            AdminCommand::Edit(command) => admin::edit(app, command).await,
            AdminCommand::Register {
                template_ids,
                vehicle,
            } => admin::register(app, template_ids, vehicle).await,
            AdminCommand::Master(command) => admin::master(app, command).await,
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: {:#}; using defaults", e);
            Config::default()
        }
    };
    let _guard = init_tracing(&config);
    info!("shuttle starting");

    let app = App::open(config, cli.data_dir.clone(), cli.offline, cli.json)?;
    if let Err(e) = run(cli, &app).await {
        warn!(error = %e, "Command failed");
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}
