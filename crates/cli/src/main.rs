mod app;

use std::{
    fs::{self, OpenOptions},
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{prelude::*, EnvFilter};
use uttt_core::{
    config::{self, AppConfig},
    FileStore, RoomService,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = app::Cli::parse();
    init_logging()?;

    config::ensure_default_config()?;
    let mut config = AppConfig::load()?;
    if let Some(root) = &cli.data_root {
        config.data_root = root.clone();
    }

    let service = Arc::new(RoomService::new(FileStore::new(&config.data_root), &config));
    app::run(cli, service).await
}

fn init_logging() -> Result<()> {
    let log_dir = config::default_log_dir();
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;
    let log_path = log_dir.join("uttt.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    let env_filter = EnvFilter::from_default_env();

    // stdout carries room JSON, so console logs go to stderr.
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(())
}
