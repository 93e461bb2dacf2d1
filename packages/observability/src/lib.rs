//! # Observability
//!
//! Tracing setup shared by every binary in the session coordination workspace.
//!
//! Library crates only ever use the `tracing` macros. Binaries call
//! [`init`] or [`init_with_config`] once at startup to decide where those
//! events go:
//!
//! - a compact human-readable layer on stderr
//! - optionally, a JSONL file appended through [`CentralLogWriter`], one
//!   flushed line per event so several tabs/processes can share the file
//!
//! `RUST_LOG` always wins over the configured default level.
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init_with_config(observability::LogConfig {
//!         service_name: "sessionctl".into(),
//!         default_level: "debug".into(),
//!         ..Default::default()
//!     });
//!     tracing::info!("ready");
//! }
//! ```

mod file_writer;

use std::io;
use std::path::PathBuf;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub use file_writer::{CentralLogWriter, WriterFactory};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service (e.g. "sessionctl"). Logged once at startup.
    pub service_name: String,

    /// Default filter directive (e.g. "debug", "info,auth_engine=trace").
    /// Overridden by `RUST_LOG`.
    pub default_level: String,

    /// Optional JSONL file that receives every event.
    pub log_path: Option<PathBuf>,

    /// Keep the stderr layer when a log file is configured.
    /// Without a log file stderr is always used.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: true,
        }
    }
}

/// Default JSONL location for a service: `<data_local_dir>/session-coordinator/logs/<service>.jsonl`.
pub fn default_log_path(service_name: &str) -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| {
        dir.join("session-coordinator")
            .join("logs")
            .join(format!("{service_name}.jsonl"))
    })
}

/// Initialize with defaults: stderr only, `info` unless `RUST_LOG` is set.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize the global subscriber from `config`.
///
/// A second call is a no-op, which keeps test binaries that initialize
/// logging from several tests well-behaved. A log file that cannot be opened
/// degrades to stderr-only output instead of aborting the process.
pub fn init_with_config(config: LogConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_level));

    let mut open_error = None;
    let file_writer = match config.log_path.as_ref().map(CentralLogWriter::new) {
        Some(Ok(writer)) => Some(writer),
        Some(Err(e)) => {
            open_error = Some(e);
            None
        }
        None => None,
    };
    let emit_stderr = config.also_stderr || file_writer.is_none();

    let file_layer = file_writer.map(|writer| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .with_writer(WriterFactory::new(writer))
    });

    let stderr_layer = emit_stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(io::stderr)
    });

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init();

    if installed.is_ok() {
        tracing::info!(
            service = %config.service_name,
            log_path = ?config.log_path,
            "observability initialized"
        );
        if let Some(e) = open_error {
            tracing::warn!(error = %e, "log file unavailable, logging to stderr only");
        }
    }
}

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, instrument, trace, warn};

/// Re-export Level for advanced filtering.
pub use tracing::Level;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.service_name, "unknown");
        assert_eq!(config.default_level, "info");
        assert!(config.log_path.is_none());
        assert!(config.also_stderr);
    }

    #[test]
    fn test_default_log_path_is_per_service() {
        if let Some(path) = default_log_path("sessionctl") {
            assert!(path.ends_with("session-coordinator/logs/sessionctl.jsonl"));
        }
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init("first");
        init("second");
        tracing::debug!("still alive");
    }
}
