//! Structured logging setup using tracing.

use crate::config::{FileLoggingConfig, LogFormat, LogRotation, LoggingConfig};
use std::fs;
use std::io;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Guard that must be kept alive for the duration of the program.
/// When dropped, flushes and closes the file writer.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the logging system based on configuration.
/// Returns a guard that must be kept alive for file logging to work.
pub fn init_logging(config: &LoggingConfig) -> LogGuard {
    if !config.log_requests {
        return LogGuard { _file_guard: None };
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match (&config.format, &config.file) {
        // Text to stdout only
        (LogFormat::Text, None) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(io::stdout))
                .init();
            LogGuard { _file_guard: None }
        }

        // JSON to stdout only
        (LogFormat::Json, None) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(io::stdout))
                .init();
            LogGuard { _file_guard: None }
        }

        // Text to stdout + JSON to file
        (LogFormat::Text, Some(file_config)) => {
            let (file_writer, guard) = create_file_writer(file_config);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(io::stdout))
                .with(fmt::layer().json().with_writer(file_writer))
                .init();
            LogGuard {
                _file_guard: Some(guard),
            }
        }

        // JSON to stdout + JSON to file
        (LogFormat::Json, Some(file_config)) => {
            let (file_writer, guard) = create_file_writer(file_config);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(io::stdout))
                .with(fmt::layer().json().with_writer(file_writer))
                .init();
            LogGuard {
                _file_guard: Some(guard),
            }
        }
    }
}

fn create_file_writer(
    config: &FileLoggingConfig,
) -> (tracing_appender::non_blocking::NonBlocking, WorkerGuard) {
    // Ensure log directory exists
    fs::create_dir_all(&config.log_dir).ok();

    let rotation = match config.rotation {
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Never => Rotation::NEVER,
    };

    let file_appender = RollingFileAppender::new(rotation, &config.log_dir, &config.file_prefix);

    tracing_appender::non_blocking(file_appender)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_default() {
        assert_eq!(LogFormat::default(), LogFormat::Text);
    }

    #[test]
    fn test_log_rotation_default() {
        assert_eq!(LogRotation::default(), LogRotation::Daily);
    }

    #[test]
    fn test_file_logging_config_default() {
        let config = FileLoggingConfig::default();
        assert_eq!(config.log_dir, "logs");
        assert_eq!(config.file_prefix, "burrow.log");
    }

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert!(config.log_requests);
        assert_eq!(config.format, LogFormat::Text);
        assert!(config.file.is_none());
    }
}
