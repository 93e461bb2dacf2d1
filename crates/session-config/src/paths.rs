//! File system locations used by the CLI and file-backed stores.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Directory name under the platform's local data directory.
const APP_DIR_NAME: &str = "session-coordinator";

/// Resolves every on-disk location from a single base directory.
#[derive(Debug, Clone)]
pub struct Paths {
    base_dir: PathBuf,
}

impl Paths {
    /// Use `<data_local_dir>/session-coordinator`, falling back to
    /// `~/.session-coordinator` on platforms without a data directory.
    pub fn new() -> CoreResult<Self> {
        let base_dir = match dirs::data_local_dir() {
            Some(dir) => dir.join(APP_DIR_NAME),
            None => dirs::home_dir()
                .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?
                .join(format!(".{APP_DIR_NAME}")),
        };
        Ok(Self { base_dir })
    }

    /// Create a Paths instance rooted at a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// `<base>/config.json`
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// `<base>/storage`
    pub fn storage_dir(&self) -> PathBuf {
        self.base_dir.join("storage")
    }

    /// Origin-wide store shared by every tab (cross-tab signal lives here).
    pub fn shared_storage_file(&self) -> PathBuf {
        self.storage_dir().join("shared.json")
    }

    /// Store private to one tab (last known path lives here).
    pub fn tab_storage_file(&self, tab_id: &str) -> PathBuf {
        self.storage_dir().join(format!("tab-{tab_id}.json"))
    }

    /// `<base>/logs`
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// `<base>/logs/<service>.jsonl`
    pub fn log_file(&self, service_name: &str) -> PathBuf {
        self.logs_dir().join(format!("{service_name}.jsonl"))
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.storage_dir())?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_paths_with_base_dir() {
        let base = PathBuf::from("/tmp/session-coordinator-test");
        let paths = Paths::with_base_dir(base.clone());

        assert_eq!(paths.base_dir(), &base);
        assert_eq!(paths.config_file(), base.join("config.json"));
        assert_eq!(paths.shared_storage_file(), base.join("storage/shared.json"));
        assert_eq!(paths.tab_storage_file("a1"), base.join("storage/tab-a1.json"));
        assert_eq!(paths.log_file("sessionctl"), base.join("logs/sessionctl.jsonl"));
    }

    #[test]
    fn test_ensure_dirs_creates_tree() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().join("nested"));

        paths.ensure_dirs().unwrap();

        assert!(paths.storage_dir().is_dir());
        assert!(paths.logs_dir().is_dir());
    }

    #[test]
    fn test_new_resolves_app_dir() {
        if let Ok(paths) = Paths::new() {
            assert!(paths
                .base_dir()
                .to_string_lossy()
                .contains("session-coordinator"));
        }
    }
}
