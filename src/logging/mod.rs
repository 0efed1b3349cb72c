//! Logging subsystem
//!
//! Structured logging via tracing with JSON (production) and plaintext
//! (development) output formats.
//!
//! # Log Targets
//!
//! - `sdk` - extension lifecycle
//! - `http` - HTTP server
//! - `auth` - webhook signature verification
//! - `config` - manifest loading and configuration resolution
//! - `dispatch` - handler routing
//! - `telemetry` - telemetry delivery
//!
//! # Environment Variables
//!
//! - `KIKET_LOG` - Primary log level/filter (takes precedence)
//! - `RUST_LOG` - Fallback log level/filter
//!
//! # Examples
//!
//! ```no_run
//! use kiket_sdk::logging::{init_logging, LogConfig, LogFormat, LogOutput};
//!
//! init_logging(LogConfig {
//!     format: LogFormat::Json,
//!     output: LogOutput::File("/var/log/extension.log".into()),
//!     default_level: tracing::Level::INFO,
//! }).unwrap();
//! ```

use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use tracing::Level;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::{EnvSource, ProcessEnv};

/// Primary filter variable.
pub const ENV_LOG_FILTER: &str = "KIKET_LOG";

/// Fallback filter variable.
pub const ENV_RUST_LOG: &str = "RUST_LOG";

static INIT_GUARD: OnceLock<()> = OnceLock::new();

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// JSON format for production (structured logs)
    Json,
    /// Human-readable plaintext for development
    #[default]
    Plaintext,
}

/// Log output destination
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    /// Write to a file at the given path (truncated on open)
    File(PathBuf),
}

/// Configuration for the logging subsystem
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    pub output: LogOutput,
    /// Default log level when no env filter is set
    pub default_level: Level,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Plaintext,
            output: LogOutput::Stderr,
            default_level: Level::INFO,
        }
    }
}

impl LogConfig {
    /// Plaintext to stderr at debug level.
    pub fn development() -> Self {
        Self {
            default_level: Level::DEBUG,
            ..Self::default()
        }
    }

    /// JSON to stdout at info level.
    pub fn production() -> Self {
        Self {
            format: LogFormat::Json,
            output: LogOutput::Stdout,
            default_level: Level::INFO,
        }
    }
}

/// Error type for logging initialization
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to create log file: {0}")]
    FileCreation(#[from] io::Error),
    #[error("failed to parse log filter: {0}")]
    FilterParse(#[from] tracing_subscriber::filter::ParseError),
    #[error("logging already initialized")]
    AlreadyInitialized,
    #[error("failed to initialize subscriber: {0}")]
    TryInit(#[from] tracing_subscriber::util::TryInitError),
}

/// Build an EnvFilter: `KIKET_LOG`, then `RUST_LOG`, then the default level
/// applied to every SDK target.
fn build_env_filter(default_level: Level, env: &dyn EnvSource) -> Result<EnvFilter, LoggingError> {
    let explicit = [ENV_LOG_FILTER, ENV_RUST_LOG]
        .into_iter()
        .find_map(|key| env.get(key).filter(|v| !v.trim().is_empty()));
    if let Some(filter) = explicit {
        return Ok(EnvFilter::try_new(filter)?);
    }

    let level = default_level.as_str().to_lowercase();
    let mut directives = vec![level.clone()];
    directives.extend(targets::ALL.iter().map(|t| format!("{t}={level}")));
    Ok(EnvFilter::try_new(directives.join(","))?)
}

fn make_writer(output: &LogOutput) -> Result<BoxMakeWriter, LoggingError> {
    Ok(match output {
        LogOutput::Stdout => BoxMakeWriter::new(io::stdout),
        LogOutput::Stderr => BoxMakeWriter::new(io::stderr),
        LogOutput::File(path) => BoxMakeWriter::new(Mutex::new(File::create(path)?)),
    })
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn build_layer(format: LogFormat, writer: BoxMakeWriter, filter: EnvFilter) -> BoxedLayer {
    // RFC 3339 timestamps in UTC
    let timer = UtcTime::rfc_3339();
    match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_timer(timer)
            .with_target(true)
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
        LogFormat::Plaintext => tracing_subscriber::fmt::layer()
            .with_timer(timer)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_file(false)
            .with_line_number(false)
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
    }
}

/// Initialize the logging subsystem.
///
/// Call once at startup. Subsequent calls return
/// [`LoggingError::AlreadyInitialized`].
pub fn init_logging(config: LogConfig) -> Result<(), LoggingError> {
    if INIT_GUARD.set(()).is_err() {
        return Err(LoggingError::AlreadyInitialized);
    }

    let filter = build_env_filter(config.default_level, &ProcessEnv)?;
    let writer = make_writer(&config.output)?;
    tracing_subscriber::registry()
        .with(build_layer(config.format, writer, filter))
        .try_init()?;
    Ok(())
}

/// Initialize logging for tests.
///
/// Plaintext at debug level through the test harness writer. Safe to call
/// from many tests; only the first call installs a subscriber.
pub fn init_test_logging() {
    let Ok(filter) = build_env_filter(Level::DEBUG, &ProcessEnv) else {
        return;
    };
    let writer = BoxMakeWriter::new(tracing_subscriber::fmt::TestWriter::new());
    let _ = tracing_subscriber::registry()
        .with(build_layer(LogFormat::Plaintext, writer, filter))
        .try_init();
}

/// Log target constants for consistent naming across the codebase
pub mod targets {
    pub const SDK: &str = "sdk";
    pub const HTTP: &str = "http";
    pub const AUTH: &str = "auth";
    pub const CONFIG: &str = "config";
    pub const DISPATCH: &str = "dispatch";
    pub const TELEMETRY: &str = "telemetry";

    pub const ALL: &[&str] = &[SDK, HTTP, AUTH, CONFIG, DISPATCH, TELEMETRY];
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::NamedTempFile;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_log_config_presets() {
        let config = LogConfig::default();
        assert_eq!(config.format, LogFormat::Plaintext);
        assert_eq!(config.output, LogOutput::Stderr);
        assert_eq!(config.default_level, Level::INFO);

        assert_eq!(LogConfig::development().default_level, Level::DEBUG);

        let config = LogConfig::production();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.output, LogOutput::Stdout);
    }

    #[test]
    fn test_env_filter_default_covers_targets() {
        let filter = build_env_filter(Level::WARN, &env(&[])).unwrap();
        let rendered = filter.to_string();
        for target in targets::ALL {
            assert!(rendered.contains(&format!("{target}=warn")), "{rendered}");
        }
    }

    #[test]
    fn test_env_filter_kiket_log_takes_precedence() {
        let filter = build_env_filter(
            Level::INFO,
            &env(&[("KIKET_LOG", "dispatch=trace"), ("RUST_LOG", "debug")]),
        )
        .unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("dispatch=trace"));
        assert!(!rendered.contains("debug"));
    }

    #[test]
    fn test_env_filter_rust_log_fallback() {
        let filter =
            build_env_filter(Level::INFO, &env(&[("KIKET_LOG", " "), ("RUST_LOG", "auth=debug")]))
                .unwrap();
        assert!(filter.to_string().contains("auth=debug"));
    }

    #[test]
    fn test_env_filter_invalid_directive() {
        let err = build_env_filter(Level::INFO, &env(&[("KIKET_LOG", "auth=notalevel")]));
        assert!(matches!(err, Err(LoggingError::FilterParse(_))));
    }

    #[test]
    fn test_file_writer_creates_file() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_path_buf();
        std::fs::remove_file(&path).unwrap();

        make_writer(&LogOutput::File(path.clone())).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_file_writer_bad_path() {
        let result = make_writer(&LogOutput::File("/nonexistent-dir/x/y.log".into()));
        assert!(matches!(result, Err(LoggingError::FileCreation(_))));
    }

    #[test]
    fn test_logging_error_display() {
        assert_eq!(
            LoggingError::AlreadyInitialized.to_string(),
            "logging already initialized"
        );
    }

    #[test]
    fn test_json_layer_builds() {
        let filter = EnvFilter::try_new("info").unwrap();
        let _layer = build_layer(LogFormat::Json, BoxMakeWriter::new(io::sink), filter);
    }

    #[test]
    fn test_init_test_logging_is_idempotent() {
        init_test_logging();
        init_test_logging();
        tracing::info!(target: "sdk", "still alive");
    }
}
