//! Tracing setup.
//!
//! Console output goes to stderr (stdout is reserved for command output such
//! as `resolve` JSON), optionally mirrored as JSON lines into a daily rolling
//! file under the configured log directory. `RUST_LOG` overrides the
//! configured level.

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{LogFormat, LoggingSection};

pub const LOG_FILE_PREFIX: &str = "changes-dash.log";

/// Keep alive for as long as logs should be written; dropping it flushes the
/// file writer.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Filter directive used when `RUST_LOG` is unset.
pub fn default_directive(level: &str, verbose: bool) -> String {
    if verbose {
        "debug".to_string()
    } else if level.trim().is_empty() {
        "info".to_string()
    } else {
        level.trim().to_string()
    }
}

pub fn init_logging(settings: &LoggingSection, verbose: bool) -> Result<LoggingGuard> {
    let directive = default_directive(&settings.level, verbose);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive));

    let (file_writer, file_guard) = if settings.dir.as_os_str().is_empty() {
        (None, None)
    } else {
        std::fs::create_dir_all(&settings.dir)
            .with_context(|| format!("Failed to create log directory: {}", settings.dir.display()))?;
        let appender = tracing_appender::rolling::daily(&settings.dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (Some(writer), Some(guard))
    };

    let json = settings.format == LogFormat::Json;
    let pretty_console = (!json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });
    let json_console = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });
    let file_layer = file_writer.map(|writer| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_ansi(false)
            .with_writer(writer)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty_console)
        .with(json_console)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}
