//! Structured logging setup.
//!
//! JSON formatting for production, pretty formatting for development, and
//! optional rotating file output. The returned guard must be held for the
//! process lifetime or buffered log lines are lost on exit.

use anyhow::Result;
use std::env;
use std::io;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Configuration for logging setup.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log format: "json" or "pretty"
    pub format: LogFormat,
    /// Log output: "stdout", "stderr", or "file"
    pub output: LogOutput,
    /// Directory for log files (when output is "file")
    pub log_dir: PathBuf,
    /// Log file name prefix
    pub log_file_prefix: String,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logging (production)
    Json,
    /// Human-readable pretty output (development)
    Pretty,
}

/// Log output destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    File,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            output: LogOutput::Stderr,
            log_dir: PathBuf::from("logs"),
            log_file_prefix: "ocpi-node".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Read the logging setup from `OCPI_NODE_LOG_*` environment variables,
    /// falling back to development defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(format) = env::var("OCPI_NODE_LOG_FORMAT") {
            config.format = match format.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            };
        }
        if let Ok(output) = env::var("OCPI_NODE_LOG_OUTPUT") {
            config.output = match output.to_ascii_lowercase().as_str() {
                "stdout" => LogOutput::Stdout,
                "file" => LogOutput::File,
                _ => LogOutput::Stderr,
            };
        }
        if let Ok(dir) = env::var("OCPI_NODE_LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }

        config
    }
}

/// Install the global subscriber. `RUST_LOG` controls the filter, default
/// `info` with this crate at `debug`.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ocpi_node=debug"));

    match config.output {
        LogOutput::File => {
            std::fs::create_dir_all(&config.log_dir)?;
            let appender =
                tracing_appender::rolling::daily(&config.log_dir, &config.log_file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            install(config.format, filter, writer, false)?;
            Ok(Some(guard))
        }
        LogOutput::Stdout => {
            install(config.format, filter, io::stdout, true)?;
            Ok(None)
        }
        LogOutput::Stderr => {
            install(config.format, filter, io::stderr, true)?;
            Ok(None)
        }
    }
}

fn install<W>(format: LogFormat, filter: EnvFilter, writer: W, ansi: bool) -> Result<()>
where
    W: for<'a> fmt::MakeWriter<'a> + Send + Sync + 'static,
{
    let layer = match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_current_span(false)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(ansi)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()?;
    Ok(())
}
