//! Per-tab wiring.
//!
//! A [`TabSession`] owns three tasks:
//! - the auth interpreter ([`AuthService`])
//! - the navigation executor loop
//! - the coordination loop below, which publishes and follows the cross-tab
//!   signal, runs logout cleanup and session hooks, and fires proactive refreshes

use crate::cross_tab::{CrossTabAuthSynchronizer, SyncAction, SyncInputs};
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::hooks::{NoopHooks, SessionHooks};
use crate::refresh::{refresh_delay, refresh_target};
use auth_engine::{
    AuthError, AuthHandle, AuthResult, AuthService, AuthServiceConfig, AuthSnapshot, AuthState, Credentials,
    SessionClient,
};
use chrono::{DateTime, Utc};
use navigation_engine::{
    NavigationEffectExecutor, NavigationResult, NavigationStatus, RoutePolicy, Router, SetupStatus,
};
use session_config::Config;
use session_journal::{Journal, ObserverSet, TransitionObserver};
use session_storage::{
    CrossTabSignal, KeyValueStore, LastKnownPathStore, MemoryStore, SharedStorage, StorageChange,
    StorageHandle, StorageKeys,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Settings for one tab.
#[derive(Debug, Clone)]
pub struct TabConfig {
    /// Origin tag on this tab's shared-storage writes.
    pub tab_id: String,
    pub policy: RoutePolicy,
    pub auth: AuthServiceConfig,
    pub journal_capacity: usize,
    /// `None` disables proactive refresh.
    pub proactive_refresh_margin: Option<Duration>,
}

impl TabConfig {
    pub fn new(tab_id: impl Into<String>) -> Self {
        Self::from_config(&Config::default(), tab_id)
    }

    pub fn from_config(config: &Config, tab_id: impl Into<String>) -> Self {
        Self {
            tab_id: tab_id.into(),
            policy: RoutePolicy::new(config.login_path.clone(), config.home_path.clone()),
            auth: AuthServiceConfig {
                rpc_timeout: config.rpc_timeout(),
                response_log_window: config.response_log_window(),
                response_log_capacity: config.response_log_capacity,
            },
            journal_capacity: config.journal_capacity,
            proactive_refresh_margin: config.proactive_refresh_margin(),
        }
    }
}

pub struct TabSessionBuilder {
    config: TabConfig,
    shared: SharedStorage,
    router: Arc<dyn Router>,
    tab_store: Arc<dyn KeyValueStore>,
    hooks: Arc<dyn SessionHooks>,
    observers: ObserverSet,
    setup: SetupStatus,
}

impl TabSessionBuilder {
    /// Per-tab store; defaults to an in-memory one.
    pub fn tab_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.tab_store = store;
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn SessionHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Extra observer next to the tab's own journal.
    pub fn observer(mut self, observer: Arc<dyn TransitionObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Setup status the tab starts with; defaults to "no setup required".
    pub fn setup(mut self, status: SetupStatus) -> Self {
        self.setup = status;
        self
    }

    /// Start the tab's tasks. Must be called inside a tokio runtime.
    pub fn spawn(self) -> TabSession {
        let TabSessionBuilder {
            config,
            shared,
            router,
            tab_store,
            hooks,
            mut observers,
            setup,
        } = self;

        let journal = Arc::new(Journal::new(config.journal_capacity).with_store(tab_store.clone()));
        observers.push(journal.clone());

        let auth = AuthService::spawn(config.auth.clone(), observers.clone());
        let last_path = LastKnownPathStore::new(tab_store);
        let storage = shared.handle(config.tab_id.clone());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (client_tx, client_rx) = watch::channel(false);
        let (setup_tx, setup_rx) = watch::channel(setup);

        let executor = NavigationEffectExecutor::new(
            config.policy.clone(),
            router.clone(),
            last_path.clone(),
            auth.clone(),
            observers,
        );
        let navigation = executor.subscribe();
        let navigation_task = tokio::spawn(executor.run(setup_rx, shutdown_rx.clone()));

        let coordination = TabLoop {
            auth: auth.clone(),
            signal: CrossTabSignal::new(Arc::new(storage.clone())),
            storage,
            last_path: last_path.clone(),
            hooks,
            sync: CrossTabAuthSynchronizer::new(),
            refresh_margin: config.proactive_refresh_margin,
            signal_epoch: 0,
            resumed_epoch: 0,
            cleaning_up: false,
            refresh_at: None,
            scheduled_for: None,
            refreshed_for: None,
        };
        let coordination_task = tokio::spawn(coordination.run(client_rx, shutdown_rx));

        info!(tab_id = %config.tab_id, "tab session started");
        TabSession {
            tab_id: config.tab_id,
            auth,
            journal,
            router,
            last_path,
            navigation,
            client: client_tx,
            setup: setup_tx,
            shutdown: shutdown_tx,
            navigation_task,
            coordination_task,
        }
    }
}

/// One running tab.
pub struct TabSession {
    tab_id: String,
    auth: AuthHandle,
    journal: Arc<Journal>,
    router: Arc<dyn Router>,
    last_path: LastKnownPathStore,
    navigation: watch::Receiver<NavigationStatus>,
    client: watch::Sender<bool>,
    setup: watch::Sender<SetupStatus>,
    shutdown: watch::Sender<bool>,
    navigation_task: JoinHandle<NavigationResult<()>>,
    coordination_task: JoinHandle<CoordinatorResult<()>>,
}

impl TabSession {
    pub fn builder(config: TabConfig, shared: SharedStorage, router: Arc<dyn Router>) -> TabSessionBuilder {
        TabSessionBuilder {
            config,
            shared,
            router,
            tab_store: Arc::new(MemoryStore::new()),
            hooks: Arc::new(NoopHooks),
            observers: ObserverSet::new(),
            setup: SetupStatus::ready(None),
        }
    }

    pub fn tab_id(&self) -> &str {
        &self.tab_id
    }

    pub fn auth(&self) -> &AuthHandle {
        &self.auth
    }

    pub fn journal(&self) -> &Arc<Journal> {
        &self.journal
    }

    pub fn router(&self) -> &Arc<dyn Router> {
        &self.router
    }

    pub fn auth_snapshot(&self) -> AuthSnapshot {
        self.auth.snapshot()
    }

    pub fn navigation(&self) -> NavigationStatus {
        self.navigation.borrow().clone()
    }

    pub fn subscribe_navigation(&self) -> watch::Receiver<NavigationStatus> {
        self.navigation.clone()
    }

    pub fn last_known_path(&self) -> CoordinatorResult<Option<String>> {
        Ok(self.last_path.get()?)
    }

    /// Hand the tab an RPC client. Starts the initial status check.
    pub fn attach_client(&self, client: SessionClient) -> AuthResult<()> {
        self.auth.client_ready(client)?;
        self.client.send_replace(true);
        Ok(())
    }

    /// Withdraw the RPC client, e.g. while it is being rebuilt.
    pub fn detach_client(&self) -> AuthResult<()> {
        self.client.send_replace(false);
        self.auth.client_unready()
    }

    pub fn login(&self, credentials: Credentials) -> AuthResult<()> {
        self.auth.login(credentials)
    }

    pub fn logout(&self) -> AuthResult<()> {
        self.auth.logout()
    }

    pub fn refresh(&self) -> AuthResult<()> {
        self.auth.refresh()
    }

    pub fn check(&self) -> AuthResult<()> {
        self.auth.check()
    }

    pub fn set_setup_status(&self, status: SetupStatus) {
        self.setup.send_replace(status);
    }

    /// Wait until the navigation status satisfies `predicate`.
    pub async fn wait_for_navigation(
        &self,
        predicate: impl FnMut(&NavigationStatus) -> bool,
    ) -> Option<NavigationStatus> {
        let mut rx = self.navigation.clone();
        let status = rx.wait_for(predicate).await.ok().map(|s| s.clone());
        status
    }

    /// Stop the tab's loops and wait for them to finish.
    pub async fn shutdown(self) -> CoordinatorResult<()> {
        self.shutdown.send_replace(true);
        let navigation = self
            .navigation_task
            .await
            .map_err(|e| CoordinatorError::Task(e.to_string()))?;
        let coordination = self
            .coordination_task
            .await
            .map_err(|e| CoordinatorError::Task(e.to_string()))?;
        navigation?;
        coordination?;
        info!(tab_id = %self.tab_id, "tab session stopped");
        Ok(())
    }
}

struct TabLoop {
    auth: AuthHandle,
    signal: CrossTabSignal,
    storage: StorageHandle,
    last_path: LastKnownPathStore,
    hooks: Arc<dyn SessionHooks>,
    sync: CrossTabAuthSynchronizer,
    refresh_margin: Option<Duration>,
    signal_epoch: u64,
    resumed_epoch: u64,
    cleaning_up: bool,
    refresh_at: Option<Instant>,
    scheduled_for: Option<DateTime<Utc>>,
    refreshed_for: Option<DateTime<Utc>>,
}

impl TabLoop {
    async fn run(
        self,
        client: watch::Receiver<bool>,
        shutdown: watch::Receiver<bool>,
    ) -> CoordinatorResult<()> {
        match self.drive(client, shutdown).await {
            Err(CoordinatorError::Auth(AuthError::ServiceStopped)) => {
                debug!("auth service stopped, coordination loop exiting");
                Ok(())
            }
            other => other,
        }
    }

    /// Storage failures are logged where they happen; only a stopped auth
    /// service ends the loop early.
    async fn drive(
        mut self,
        mut client: watch::Receiver<bool>,
        mut shutdown: watch::Receiver<bool>,
    ) -> CoordinatorResult<()> {
        let mut snapshots = self.auth.subscribe();
        let mut changes = self.storage.subscribe();

        let initial = snapshots.borrow_and_update().clone();
        self.signal_epoch = initial.signal_epoch;
        self.resumed_epoch = initial.resumed_epoch;
        self.on_snapshot(&initial).await?;
        let ready = *client.borrow_and_update();
        self.follow_signal(ready)?;

        loop {
            tokio::select! {
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        debug!("auth service stopped, coordination loop exiting");
                        return Ok(());
                    }
                    let snapshot = snapshots.borrow_and_update().clone();
                    self.on_snapshot(&snapshot).await?;
                }
                changed = client.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                    let ready = *client.borrow_and_update();
                    self.follow_signal(ready)?;
                }
                change = changes.recv() => {
                    let ready = *client.borrow();
                    match change {
                        Ok(change) => self.on_storage_change(&change, ready)?,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "missed storage notifications, re-reading signal");
                            self.follow_signal(ready)?;
                        }
                        Err(broadcast::error::RecvError::Closed) => return Ok(()),
                    }
                }
                _ = sleep_until(self.refresh_at) => {
                    self.refresh_at = None;
                    self.refreshed_for = self.scheduled_for.take();
                    info!("access token close to expiry, refreshing");
                    self.auth.refresh()?;
                }
                _ = shutdown.changed() => {
                    debug!("coordination loop shutting down");
                    return Ok(());
                }
            }
        }
    }

    async fn on_snapshot(&mut self, snapshot: &AuthSnapshot) -> CoordinatorResult<()> {
        if snapshot.signal_epoch > self.signal_epoch {
            self.signal_epoch = snapshot.signal_epoch;
            match self.signal.publish() {
                Ok(written) => {
                    self.sync.note_local_write(written);
                    debug!(signal = written, "published cross-tab signal");
                }
                Err(e) => warn!(error = %e, "could not publish cross-tab signal"),
            }
        }

        if snapshot.resumed_epoch > self.resumed_epoch {
            self.resumed_epoch = snapshot.resumed_epoch;
            self.hooks.on_session_resumed().await;
        }

        if snapshot.state == AuthState::Unauthenticated && snapshot.session.just_logged_out {
            if !self.cleaning_up {
                self.cleaning_up = true;
                if let Err(e) = self.last_path.set(None) {
                    warn!(error = %e, "could not clear last known path on logout");
                }
                self.hooks.on_logged_out().await;
                self.auth.ack_logout_cleanup()?;
                debug!("logout cleanup done");
            }
        } else {
            self.cleaning_up = false;
        }

        self.schedule_refresh(snapshot);
        Ok(())
    }

    fn on_storage_change(&mut self, change: &StorageChange, ready: bool) -> CoordinatorResult<()> {
        if change.key != StorageKeys::AUTH_CHANGE_TRIGGER || change.origin == self.storage.origin() {
            return Ok(());
        }
        self.follow_signal(ready)
    }

    fn follow_signal(&mut self, rpc_client_ready: bool) -> CoordinatorResult<()> {
        let signal = match self.signal.read() {
            Ok(signal) => signal,
            Err(e) => {
                warn!(error = %e, "could not read cross-tab signal");
                return Ok(());
            }
        };
        let action = self.sync.observe(SyncInputs {
            client_mounted: true,
            rpc_client_ready,
            signal,
        });
        if let SyncAction::Revalidate(signal) = action {
            info!(signal, "auth changed in another tab, revalidating");
            self.auth.check()?;
        }
        Ok(())
    }

    fn schedule_refresh(&mut self, snapshot: &AuthSnapshot) {
        self.refresh_at = None;
        self.scheduled_for = None;

        let (Some(margin), Some(expires_at)) = (self.refresh_margin, refresh_target(snapshot)) else {
            return;
        };
        if self.refreshed_for == Some(expires_at) {
            return;
        }
        let delay = refresh_delay(expires_at, Utc::now(), margin);
        debug!(delay_secs = delay.as_secs(), %expires_at, "proactive refresh scheduled");
        self.refresh_at = Some(Instant::now() + delay);
        self.scheduled_for = Some(expires_at);
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
