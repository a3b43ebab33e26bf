mod args;
mod commands;

use std::{
    fs::{self, OpenOptions},
    process::ExitCode,
};

use anyhow::Result;
use clap::Parser;
use shoestock_core::{
    config::{self, AppConfig},
    AppContext,
};
use tracing::debug;
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::{
    args::Cli,
    commands::{Reported, Runner},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if !err.is::<Reported>() {
                eprintln!("error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose)?;

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => {
            config::ensure_default_config()?;
            AppConfig::load()?
        }
    };

    debug!(
        api = %config.api_base_url,
        storage = %config.storage_path.display(),
        "configuration loaded"
    );

    let context = AppContext::open(config)?;
    let mut runner = Runner::new(context, cli.json)?;
    runner.handle(cli.command).await
}

fn init_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("shoestock.log");

    let fallback = if verbose { "debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr);

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;
    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .compact()
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(())
}
