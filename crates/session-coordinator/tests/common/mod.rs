#![allow(dead_code)]

use async_trait::async_trait;
use auth_engine::testing::ScriptedGateway;
use auth_engine::SessionClient;
use navigation_engine::{MemoryRouter, Router};
use session_coordinator::{SessionHooks, TabConfig, TabSession};
use session_storage::{MemoryStore, SharedStorage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Tabs of one origin: shared storage plus one backend.
pub struct Origin {
    pub shared: SharedStorage,
    pub gateway: Arc<ScriptedGateway>,
}

impl Origin {
    pub fn new() -> Self {
        Self {
            shared: SharedStorage::new(Arc::new(MemoryStore::new())),
            gateway: Arc::new(ScriptedGateway::new()),
        }
    }

    pub fn signed_in(email: &str) -> Self {
        let origin = Self::new();
        origin
            .gateway
            .set_status(Ok(auth_engine::testing::authenticated(email)));
        origin
    }

    /// Open a tab at `href` and attach a client to it.
    pub fn open_tab(&self, tab_id: &str, href: &str) -> (TabSession, MemoryRouter) {
        self.open_tab_with(TabConfig::new(tab_id), href, Arc::new(CountingHooks::default()))
    }

    pub fn open_tab_with(
        &self,
        config: TabConfig,
        href: &str,
        hooks: Arc<dyn SessionHooks>,
    ) -> (TabSession, MemoryRouter) {
        let router = MemoryRouter::new(href);
        let tab = TabSession::builder(config, self.shared.clone(), Arc::new(router.clone()))
            .hooks(hooks)
            .spawn();
        tab.attach_client(SessionClient::new(self.gateway.clone()))
            .expect("auth service should be running");
        (tab, router)
    }
}

/// Let every task run until the runtime is idle. Needs paused time.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(500)).await;
}

pub fn pathname(router: &MemoryRouter) -> String {
    router.current_pathname()
}

#[derive(Default)]
pub struct CountingHooks {
    pub logged_out: AtomicUsize,
    pub resumed: AtomicUsize,
}

impl CountingHooks {
    pub fn logged_out(&self) -> usize {
        self.logged_out.load(Ordering::SeqCst)
    }

    pub fn resumed(&self) -> usize {
        self.resumed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionHooks for CountingHooks {
    async fn on_logged_out(&self) {
        self.logged_out.fetch_add(1, Ordering::SeqCst);
    }

    async fn on_session_resumed(&self) {
        self.resumed.fetch_add(1, Ordering::SeqCst);
    }
}
