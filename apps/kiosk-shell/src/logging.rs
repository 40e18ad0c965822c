use anyhow::Result;
use kiosk_settings::{LogRotation, LoggingSettings};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use tracing::Level;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

pub const LOG_FILE_NAME: &str = "kiosk-shell.log";

/// Keeps the background log writer alive; drop it last to flush the file
#[derive(Debug)]
pub struct LoggingSystem {
    _file_guard: Option<non_blocking::WorkerGuard>,
}

impl LoggingSystem {
    /// Install the global subscriber. Console output goes to stderr so that
    /// stdout stays reserved for the session summary.
    pub fn initialize(settings: &LoggingSettings, log_dir: &Path) -> Result<Self> {
        let level: Level = settings.level.parse().unwrap_or(Level::INFO);
        let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

        if settings.console {
            let console_layer = fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(true)
                .with_writer(io::stderr);

            if settings.json {
                layers.push(console_layer.json().with_filter(env_filter(level)?).boxed());
            } else {
                layers.push(console_layer.with_filter(env_filter(level)?).boxed());
            }
        }

        let mut file_guard = None;
        let mut file_error = None;
        if settings.file {
            match file_writer(log_dir, settings.rotation) {
                Ok((writer, guard)) => {
                    let file_layer = fmt::layer()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_file(true)
                        .with_line_number(true)
                        .with_ansi(false)
                        .with_writer(writer);

                    if settings.json {
                        layers.push(file_layer.json().with_filter(env_filter(level)?).boxed());
                    } else {
                        layers.push(file_layer.with_filter(env_filter(level)?).boxed());
                    }
                    file_guard = Some(guard);
                }
                Err(e) => file_error = Some(e),
            }
        }

        Registry::default().with(layers).try_init()?;

        if let Some(e) = file_error {
            tracing::warn!(dir = %log_dir.display(), "File logging disabled: {}", e);
        }
        tracing::debug!(
            level = %level,
            console = settings.console,
            json = settings.json,
            file = file_guard.is_some(),
            "Logging system initialized"
        );

        Ok(Self {
            _file_guard: file_guard,
        })
    }
}

fn env_filter(level: Level) -> Result<EnvFilter> {
    Ok(EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env()?)
}

fn file_writer(
    log_dir: &Path,
    rotation: LogRotation,
) -> io::Result<(non_blocking::NonBlocking, non_blocking::WorkerGuard)> {
    fs::create_dir_all(log_dir)?;

    Ok(match rotation {
        LogRotation::Never => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_dir.join(LOG_FILE_NAME))?;
            non_blocking(file)
        }
        LogRotation::Hourly => non_blocking(rolling::hourly(log_dir, LOG_FILE_NAME)),
        LogRotation::Daily => non_blocking(rolling::daily(log_dir, LOG_FILE_NAME)),
    })
}
