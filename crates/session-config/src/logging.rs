//! Logging initialization for session binaries.
//!
//! Thin wrappers over [`observability::init_with_config`] that pick the
//! service name and, when asked, a JSONL file under [`Paths::logs_dir`].

use crate::Paths;

/// Initialize stderr logging for the default `sessionctl` service.
///
/// ```ignore
/// init_logging("info");
/// tracing::info!("tab started");
/// ```
pub fn init_logging(level: &str) {
    init_logging_for_service("sessionctl", level, None);
}

/// Initialize logging for a named service, optionally mirroring every event
/// to `<paths.logs_dir()>/<service>.jsonl`.
pub fn init_logging_for_service(service_name: &str, level: &str, paths: Option<&Paths>) {
    observability::init_with_config(observability::LogConfig {
        service_name: service_name.into(),
        default_level: level.into(),
        log_path: paths.map(|p| p.log_file(service_name)),
        also_stderr: true,
    });
}
