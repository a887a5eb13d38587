//! Tracing setup for Sectional
//!
//! Console logs at a user-chosen level, plus an optional file capturing
//! everything at trace level for debugging hydration runs after the fact.

use std::fs::{File, create_dir_all};
use std::path::Path;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Initialize tracing with console output and an optional trace-level log file.
///
/// `RUST_LOG` overrides `console_level` for the console layer when set.
/// Logs go to stderr so stdout stays free for event output.
///
/// # Errors
///
/// - `Box<dyn std::error::Error>` - If the log file's directory cannot be created or the file cannot be opened
pub fn init_tracing(
    console_level: Level,
    log_file: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_level.to_string()));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                create_dir_all(parent)?;
            }
            let file = File::create(path)?;

            Some(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_ansi(false) // No color codes in files
                    .with_writer(std::sync::Mutex::new(file))
                    .with_filter(EnvFilter::new("trace")),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::debug!(
        "Tracing initialized: console={}, log_file={}",
        console_level,
        log_file.map(|p| p.display().to_string()).unwrap_or_else(|| "none".to_string())
    );

    Ok(())
}

/// CLI log levels for user control
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliLogLevel {
    /// Only error messages
    Error,
    /// Warning and error messages
    Warn,
    /// Informational, warning, and error messages
    Info,
    /// Debug, informational, warning, and error messages
    Debug,
    /// All messages including detailed tracing
    Trace,
}

impl CliLogLevel {
    /// Converts CLI log level to tracing Level enum.
    ///
    /// # Examples
    /// ```
    /// use sectional_core::tracing_setup::CliLogLevel;
    ///
    /// let level = CliLogLevel::Warn.as_tracing_level();
    /// assert_eq!(level, tracing::Level::WARN);
    /// ```
    pub fn as_tracing_level(self) -> Level {
        match self {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}

impl std::fmt::Display for CliLogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliLogLevel::Error => write!(f, "error"),
            CliLogLevel::Warn => write!(f, "warn"),
            CliLogLevel::Info => write!(f, "info"),
            CliLogLevel::Debug => write!(f, "debug"),
            CliLogLevel::Trace => write!(f, "trace"),
        }
    }
}
