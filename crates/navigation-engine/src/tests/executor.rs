//! The executor against a memory router and a scripted auth service.

use super::*;
use crate::executor::{NavigationEffectExecutor, SetupStatus};
use crate::login_ui::LoginView;
use crate::router::{MemoryRouter, Router};
use auth_engine::testing::{self, Op, ScriptedGateway};
use auth_engine::{AuthHandle, AuthService, AuthServiceConfig, Credentials, SessionClient};
use session_journal::{MachineId, ObserverSet, RecordingObserver};
use session_storage::{KeyValueStore, LastKnownPathStore, MemoryStore, StorageError, StorageResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

struct Tab {
    router: MemoryRouter,
    paths: LastKnownPathStore,
    auth: AuthHandle,
    recorder: Arc<RecordingObserver>,
    executor: NavigationEffectExecutor,
}

/// Memory store whose first write fails.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    failed_once: AtomicBool,
}

impl KeyValueStore for FlakyStore {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        if !self.failed_once.swap(true, Ordering::SeqCst) {
            return Err(StorageError::Backend("disk hiccup".into()));
        }
        self.inner.set(key, value)
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.inner.get(key)
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        self.inner.delete(key)
    }
}

async fn tab(href: &str, gateway: &Arc<ScriptedGateway>) -> Tab {
    tab_with_store(href, gateway, Arc::new(MemoryStore::new())).await
}

async fn tab_with_store(
    href: &str,
    gateway: &Arc<ScriptedGateway>,
    store: Arc<dyn KeyValueStore>,
) -> Tab {
    let router = MemoryRouter::new(href);
    let paths = LastKnownPathStore::new(store);
    let recorder = Arc::new(RecordingObserver::new());

    let auth = AuthService::spawn(AuthServiceConfig::default(), ObserverSet::new());
    auth.client_ready(SessionClient::new(gateway.clone())).unwrap();
    auth.settled().await.unwrap();

    let executor = NavigationEffectExecutor::new(
        RoutePolicy::default(),
        Arc::new(router.clone()),
        paths.clone(),
        auth.clone(),
        ObserverSet::new().with(recorder.clone()),
    );
    Tab {
        router,
        paths,
        auth,
        recorder,
        executor,
    }
}

fn signed_in_gateway() -> Arc<ScriptedGateway> {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.set_status(Ok(testing::authenticated("ada@example.test")));
    gateway
}

#[tokio::test]
async fn signed_out_tab_saves_path_and_lands_on_login() {
    let gateway = Arc::new(ScriptedGateway::new());
    let mut tab = tab("/dashboard?tab=units", &gateway).await;

    let auth = tab.auth.snapshot();
    tab.executor
        .sync(&auth, &SetupStatus::ready(None))
        .await
        .unwrap();

    assert_eq!(tab.router.current_pathname(), "/login");
    assert_eq!(
        tab.paths.get().unwrap().as_deref(),
        Some("/dashboard?tab=units")
    );
    assert_eq!(tab.executor.machine().state(), &NavState::Idle);
    assert_eq!(tab.executor.login_view(), LoginView::ShowingForm);

    let navigations = tab.recorder.navigations();
    assert_eq!(navigations.len(), 1);
    assert_eq!(navigations[0].from_path, "/dashboard");
    assert_eq!(navigations[0].target_path, "/login");
    assert_eq!(navigations[0].state, "redirectingToLogin");

    assert!(tab
        .recorder
        .transitions()
        .iter()
        .any(|r| r.machine == MachineId::LoginUi && r.to == "showingForm"));
}

#[tokio::test]
async fn signed_in_tab_on_login_page_returns_to_saved_path() {
    let gateway = signed_in_gateway();
    let mut tab = tab("/login", &gateway).await;
    tab.paths.set(Some("/dashboard")).unwrap();

    let auth = tab.auth.snapshot();
    tab.executor
        .sync(&auth, &SetupStatus::ready(None))
        .await
        .unwrap();

    assert_eq!(tab.router.current_pathname(), "/dashboard");
    assert_eq!(tab.paths.get().unwrap(), None);
    assert_eq!(tab.executor.machine().state(), &NavState::Idle);
    assert_eq!(tab.executor.login_view(), LoginView::Idle);

    let visited: Vec<String> = tab
        .recorder
        .transitions()
        .into_iter()
        .filter(|r| r.machine == MachineId::Navigation)
        .map(|r| r.to)
        .collect();
    assert!(visited.ends_with(&[
        "evaluating".to_string(),
        "clearingLastKnownPathBeforeRedirect".to_string(),
        "redirectingFromLogin".to_string(),
        "idle".to_string(),
    ]));
}

#[tokio::test]
async fn setup_path_takes_over_home() {
    let gateway = signed_in_gateway();
    let mut tab = tab("/", &gateway).await;

    let auth = tab.auth.snapshot();
    tab.executor
        .sync(&auth, &SetupStatus::ready(Some("/getting-started")))
        .await
        .unwrap();

    assert_eq!(tab.router.current_pathname(), "/getting-started");
    assert_eq!(tab.executor.machine().state(), &NavState::Idle);
}

#[tokio::test]
async fn login_page_waits_while_setup_loads() {
    let gateway = signed_in_gateway();
    let mut tab = tab("/login", &gateway).await;

    let auth = tab.auth.snapshot();
    tab.executor
        .sync(&auth, &SetupStatus::default())
        .await
        .unwrap();

    assert_eq!(tab.router.current_pathname(), "/login");
    assert_eq!(tab.executor.login_view(), LoginView::Finalizing);
    assert!(tab.recorder.navigations().is_empty());
}

#[tokio::test]
async fn unchanged_inputs_are_not_pushed() {
    let gateway = signed_in_gateway();
    let mut tab = tab("/dashboard", &gateway).await;
    let auth = tab.auth.snapshot();
    let setup = SetupStatus::ready(None);
    tab.executor.sync(&auth, &setup).await.unwrap();

    let inputs = tab.executor.gather(&auth, &setup).unwrap();
    assert!(tab.executor.push_context(inputs).is_none());
}

#[tokio::test]
async fn context_only_changes_are_journaled_while_waiting() {
    let gateway = signed_in_gateway();
    let mut tab = tab("/", &gateway).await;
    let auth = tab.auth.snapshot();
    let setup = SetupStatus::ready(Some("/getting-started"));

    let inputs = tab.executor.gather(&auth, &setup).unwrap();
    tab.executor.push_context(inputs.clone()).unwrap();
    assert_eq!(tab.executor.machine().state(), &NavState::RedirectingToSetup);

    let mut moved = inputs;
    moved.last_known_path = Some("/units".to_string());
    let step = tab.executor.push_context(moved).unwrap();
    assert!(step.transitions.is_empty());

    let last = tab.recorder.transitions().pop().unwrap();
    assert_eq!(last.machine, MachineId::Navigation);
    assert_eq!(last.from, "redirectingToSetup");
    assert_eq!(last.to, "redirectingToSetup");
    assert_eq!(last.changed_fields, vec!["lastKnownPath".to_string()]);
}

#[tokio::test]
async fn commands_apply_once_per_sequence_number() {
    let gateway = Arc::new(ScriptedGateway::new());
    let mut tab = tab("/dashboard", &gateway).await;
    let save = PendingSideEffect {
        seq: 7,
        command: SideEffectCommand::SavePath,
    };

    tab.executor.apply(&save).await.unwrap();
    tab.router.push("/units");
    tab.executor.apply(&save).await.unwrap();

    assert_eq!(tab.paths.get().unwrap().as_deref(), Some("/dashboard"));
}

#[tokio::test]
async fn save_path_skips_login_page() {
    let gateway = Arc::new(ScriptedGateway::new());
    let mut tab = tab("/login?next=1", &gateway).await;

    tab.executor
        .apply(&PendingSideEffect {
            seq: 1,
            command: SideEffectCommand::SavePath,
        })
        .await
        .unwrap();

    assert_eq!(tab.paths.get().unwrap(), None);
}

#[tokio::test]
async fn navigating_to_current_path_does_nothing() {
    let gateway = Arc::new(ScriptedGateway::new());
    let mut tab = tab("/login", &gateway).await;
    let mut location = tab.router.subscribe();
    location.mark_unchanged();

    tab.executor
        .apply(&PendingSideEffect {
            seq: 1,
            command: navigate("/login"),
        })
        .await
        .unwrap();

    assert!(tab.recorder.navigations().is_empty());
    assert!(!location.has_changed().unwrap());
}

#[tokio::test]
async fn revalidate_sends_check() {
    let gateway = signed_in_gateway();
    let mut tab = tab("/dashboard", &gateway).await;
    assert_eq!(gateway.calls(Op::Status), 1);

    tab.executor
        .apply(&PendingSideEffect {
            seq: 1,
            command: SideEffectCommand::RevalidateAuth,
        })
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while gateway.calls(Op::Status) < 2 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn run_loop_follows_login() {
    let gateway = Arc::new(ScriptedGateway::new());
    let Tab {
        router,
        paths,
        auth,
        executor,
        ..
    } = tab("/dashboard", &gateway).await;
    let (_setup_tx, setup_rx) = watch::channel(SetupStatus::ready(None));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut location = router.subscribe();
    let mut status = executor.subscribe();

    let task = tokio::spawn(executor.run(setup_rx, shutdown_rx));

    location.wait_for(|l| l.pathname == "/login").await.unwrap();
    status
        .wait_for(|s| s.login_view == LoginView::ShowingForm)
        .await
        .unwrap();

    auth.login(Credentials::new("ada@example.test", "pw")).unwrap();
    location
        .wait_for(|l| l.pathname == "/dashboard")
        .await
        .unwrap();
    status.wait_for(|s| s.state == NavState::Idle && s.pathname == "/dashboard").await.unwrap();

    shutdown_tx.send(true).unwrap();
    task.await.unwrap().unwrap();
    assert_eq!(paths.get().unwrap(), None);
}

#[tokio::test]
async fn navigation_waits_one_turn_before_pushing() {
    let gateway = Arc::new(ScriptedGateway::new());
    let mut tab = tab("/dashboard", &gateway).await;

    let router = tab.router.clone();
    let seen = tokio::spawn(async move { router.current_pathname() });
    tab.executor
        .apply(&PendingSideEffect {
            seq: 1,
            command: navigate("/login"),
        })
        .await
        .unwrap();

    assert_eq!(seen.await.unwrap(), "/dashboard");
    assert_eq!(tab.router.current_pathname(), "/login");
}

#[tokio::test]
async fn failed_path_write_still_redirects() {
    let gateway = Arc::new(ScriptedGateway::new());
    let Tab {
        router,
        paths,
        executor,
        ..
    } = tab_with_store("/dashboard", &gateway, Arc::new(FlakyStore::default())).await;
    let (_setup_tx, setup_rx) = watch::channel(SetupStatus::ready(None));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut location = router.subscribe();

    let task = tokio::spawn(executor.run(setup_rx, shutdown_rx));

    location.wait_for(|l| l.pathname == "/login").await.unwrap();
    assert_eq!(paths.get().unwrap(), None);

    router.push("/other");
    location.wait_for(|l| l.pathname == "/login").await.unwrap();
    assert_eq!(paths.get().unwrap().as_deref(), Some("/other"));
    assert!(!task.is_finished());

    shutdown_tx.send(true).unwrap();
    task.await.unwrap().unwrap();
}
