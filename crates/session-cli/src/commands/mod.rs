//! CLI command implementations.

mod journal;
mod login;
mod status;
mod watch;

pub use journal::journal;
pub use login::login;
pub use status::status;
pub use watch::watch;

use anyhow::Result;
use auth_engine::{HttpAuthGateway, SessionClient};
use navigation_engine::MemoryRouter;
use session_config::{Config, Paths};
use session_coordinator::{TabConfig, TabSession};
use session_storage::{JsonFileStore, SharedStorage};
use std::sync::Arc;
use tracing::debug;

/// Loaded configuration plus the directories it came from.
pub struct Context {
    pub config: Config,
    pub paths: Paths,
}

impl Context {
    pub fn load(paths: Paths) -> Result<Self> {
        paths.ensure_dirs()?;
        let config = Config::load(&paths)?;
        Ok(Self { config, paths })
    }

    pub fn gateway(&self) -> Result<Arc<HttpAuthGateway>> {
        let base_url = self.config.api_base_url()?;
        debug!(%base_url, "using auth backend");
        Ok(Arc::new(HttpAuthGateway::new(base_url)?))
    }

    /// Open a file-backed tab at `href` with a live client attached.
    pub fn open_tab(&self, tab_id: &str, href: &str) -> Result<(TabSession, MemoryRouter)> {
        let shared = SharedStorage::new(Arc::new(JsonFileStore::open(
            self.paths.shared_storage_file(),
        )?));
        let tab_store = Arc::new(JsonFileStore::open(self.paths.tab_storage_file(tab_id))?);
        let router = MemoryRouter::new(href);

        let tab = TabSession::builder(
            TabConfig::from_config(&self.config, tab_id),
            shared,
            Arc::new(router.clone()),
        )
        .tab_store(tab_store)
        .spawn();
        tab.attach_client(SessionClient::new(self.gateway()?))?;
        Ok((tab, router))
    }
}
