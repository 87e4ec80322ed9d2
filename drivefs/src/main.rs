mod commands;
mod settings;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use drivefs_adapter::{DriveAdapter, DriveClient};

use commands::Command;
use settings::Settings;

const DEFAULT_CONFIG_PATH: &str = "drivefs.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so `cat` output stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (config_path, rest) = match args.first().map(String::as_str) {
        Some("--config") | Some("-c") => {
            let path = args.get(1).context("--config needs a file")?;
            (Some(PathBuf::from(path)), &args[2..])
        }
        _ => (None, &args[..]),
    };
    let command = Command::parse(rest)?;

    let settings = match config_path {
        Some(path) => Settings::load(&path)?,
        None if PathBuf::from(DEFAULT_CONFIG_PATH).exists() => {
            Settings::load(&PathBuf::from(DEFAULT_CONFIG_PATH))?
        }
        None => {
            debug!("No config file, using defaults");
            Settings::default()
        }
    };
    info!(root = %settings.adapter.root, cache = ?settings.cache, "drivefs starting");

    let client = DriveClient::with_urls(
        settings::access_token()?,
        &settings.remote.api_url,
        &settings.remote.upload_url,
    )?;
    let adapter = DriveAdapter::new(Arc::new(client), settings.open_pool()?, settings.adapter.clone());

    let mut out = std::io::stdout().lock();
    commands::run(&adapter, command, &mut out).await
}
