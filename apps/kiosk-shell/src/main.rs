//! Kiosk Shell - headless host
//!
//! Resolves the storage directory, the instance identity and its settings,
//! runs one window session and prints a JSON summary of it to stdout.

mod logging;
mod shell;

use anyhow::{Context, Result};
use kiosk_settings::{ShellSettings, StorageLocation};
use tracing::{info, warn};

use crate::logging::LoggingSystem;
use crate::shell::KioskShell;

#[tokio::main]
async fn main() -> Result<()> {
    let location = StorageLocation::detect().context("Failed to determine storage directory")?;

    let (settings, settings_error) = match ShellSettings::load(&location).await {
        Ok(settings) => (settings, None),
        Err(e) => (ShellSettings::default(), Some(e)),
    };
    let _logging = LoggingSystem::initialize(&settings.logging, &location.log_dir())?;

    info!("Starting Kiosk Shell (headless) v{}", env!("CARGO_PKG_VERSION"));
    info!(
        dir = %location.dir().display(),
        source = ?location.source(),
        "Using storage directory"
    );
    if let Some(e) = settings_error {
        warn!("Failed to load shell settings, using defaults: {}", e);
    }

    let shell = KioskShell::bootstrap(&location).await?;
    let summary = shell.run_headless().await?;

    println!(
        "{}",
        serde_json::to_string(&summary).context("Failed to serialize session summary")?
    );
    info!("Kiosk Shell exited cleanly");
    Ok(())
}
