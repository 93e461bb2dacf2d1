//! Tokio interpreter for [`AuthSessionMachine`].
//!
//! One task owns the machine and processes external events and actor
//! completions one at a time, in arrival order. Actors run in their own
//! tasks under the configured RPC bound and report back over a channel.
//! After every step the interpreter notifies observers and publishes an
//! [`AuthSnapshot`] on a watch channel.

use crate::coalesce::SessionClient;
use crate::error::{AuthError, AuthResult, GatewayError};
use crate::fsm::AuthState;
use crate::machine::{
    ActorCompletion, ActorOutcome, ActorRequest, AuthEvent, AuthSessionMachine, Invocation, Step,
};
use crate::response_log::{TimeWindowedLog, DEFAULT_CAPACITY, DEFAULT_WINDOW};
use crate::snapshot::AuthSnapshot;
use crate::status::Credentials;
use session_journal::{MachineId, ObserverSet, TransitionObserver, TransitionRecord};
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct AuthServiceConfig {
    /// Upper bound for each actor call, canary included.
    pub rpc_timeout: Duration,
    pub response_log_window: Duration,
    pub response_log_capacity: usize,
}

impl Default for AuthServiceConfig {
    fn default() -> Self {
        Self {
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
            response_log_window: DEFAULT_WINDOW,
            response_log_capacity: DEFAULT_CAPACITY,
        }
    }
}

pub struct AuthService;

impl AuthService {
    /// Spawn the interpreter. It runs until every [`AuthHandle`] is dropped.
    pub fn spawn(config: AuthServiceConfig, observers: ObserverSet) -> AuthHandle {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(AuthSnapshot::default());

        let machine = AuthSessionMachine::with_response_log(TimeWindowedLog::new(
            config.response_log_window,
            config.response_log_capacity,
        ));
        let interpreter = Interpreter {
            machine,
            observers,
            snapshot_tx,
            completions_tx,
            rpc_timeout: config.rpc_timeout,
            signal_epoch: 0,
            resumed_epoch: 0,
        };
        tokio::spawn(interpreter.run(events_rx, completions_rx));

        AuthHandle {
            events: events_tx,
            snapshot: snapshot_rx,
        }
    }
}

struct Interpreter {
    machine: AuthSessionMachine,
    observers: ObserverSet,
    snapshot_tx: watch::Sender<AuthSnapshot>,
    completions_tx: mpsc::UnboundedSender<ActorCompletion>,
    rpc_timeout: Duration,
    signal_epoch: u64,
    resumed_epoch: u64,
}

impl Interpreter {
    async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<AuthEvent>,
        mut completions: mpsc::UnboundedReceiver<ActorCompletion>,
    ) {
        loop {
            let step = tokio::select! {
                maybe_event = events.recv() => match maybe_event {
                    Some(event) => self.machine.handle(event),
                    None => break,
                },
                Some(completion) = completions.recv() => self.machine.complete(completion),
            };
            self.commit(step);
        }
        debug!("auth service stopped");
    }

    fn commit(&mut self, step: Step) {
        if step.canary_confirmed {
            self.observers.on_transition(&TransitionRecord::canary_confirmed());
        }
        for t in &step.transitions {
            let record = TransitionRecord::state_change(
                MachineId::Auth,
                t.from.as_str(),
                t.to.as_str(),
                t.event.as_deref(),
            );
            self.observers.on_transition(&record);
            if t.from == AuthState::BackgroundRefreshing && t.to == AuthState::Stable {
                self.resumed_epoch += 1;
            }
        }
        if step.signal_change {
            self.signal_epoch += 1;
        }
        if let Some(invocation) = step.invoke {
            self.spawn_actor(invocation);
        }

        let next = AuthSnapshot {
            state: self.machine.state(),
            session: self.machine.session().clone(),
            signal_epoch: self.signal_epoch,
            resumed_epoch: self.resumed_epoch,
        };
        self.snapshot_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn spawn_actor(&self, invocation: Invocation) {
        let completions = self.completions_tx.clone();
        let bound = self.rpc_timeout;
        tokio::spawn(async move {
            let Invocation { id, request, client } = invocation;
            let outcome = run_actor(&request, &client, bound).await;
            if completions
                .send(ActorCompletion {
                    invocation: id,
                    outcome,
                })
                .is_err()
            {
                debug!(invocation = id, "auth service gone, completion discarded");
            }
        });
    }
}

async fn bounded<T>(
    bound: Duration,
    call: impl Future<Output = Result<T, GatewayError>>,
) -> Result<T, GatewayError> {
    match tokio::time::timeout(bound, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!(?bound, "auth rpc timed out");
            Err(GatewayError::Timeout(bound))
        }
    }
}

async fn run_actor(request: &ActorRequest, client: &SessionClient, bound: Duration) -> ActorOutcome {
    match request {
        ActorRequest::CheckStatus => ActorOutcome::Status(bounded(bound, client.check_status()).await),
        ActorRequest::RefreshAndCanary => {
            ActorOutcome::Refreshed(client.refresh_and_canary_within(bound).await)
        }
        ActorRequest::LoginAndCanary(credentials) => {
            ActorOutcome::LoggedIn(bounded(bound, client.login_and_canary(credentials)).await)
        }
        ActorRequest::Logout => ActorOutcome::LoggedOut(bounded(bound, client.logout()).await),
    }
}

/// Cloneable handle to a running auth service.
#[derive(Clone)]
pub struct AuthHandle {
    events: mpsc::UnboundedSender<AuthEvent>,
    snapshot: watch::Receiver<AuthSnapshot>,
}

impl AuthHandle {
    pub fn send(&self, event: AuthEvent) -> AuthResult<()> {
        self.events.send(event).map_err(|_| AuthError::ServiceStopped)
    }

    pub fn client_ready(&self, client: SessionClient) -> AuthResult<()> {
        self.send(AuthEvent::ClientReady(client))
    }

    pub fn client_unready(&self) -> AuthResult<()> {
        self.send(AuthEvent::ClientUnready)
    }

    pub fn check(&self) -> AuthResult<()> {
        self.send(AuthEvent::Check)
    }

    pub fn refresh(&self) -> AuthResult<()> {
        self.send(AuthEvent::Refresh)
    }

    pub fn login(&self, credentials: Credentials) -> AuthResult<()> {
        self.send(AuthEvent::Login(credentials))
    }

    pub fn logout(&self) -> AuthResult<()> {
        self.send(AuthEvent::Logout)
    }

    pub fn ack_logout_cleanup(&self) -> AuthResult<()> {
        self.send(AuthEvent::AckLogoutCleanup)
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.snapshot.clone()
    }

    /// Wait until the published snapshot satisfies `predicate`.
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&AuthSnapshot) -> bool,
    ) -> AuthResult<AuthSnapshot> {
        let mut rx = self.subscribe();
        let snapshot = rx
            .wait_for(predicate)
            .await
            .map_err(|_| AuthError::ServiceStopped)?;
        Ok(snapshot.clone())
    }

    /// Wait until the machine settles in `stable` or `idle_unauthenticated`.
    pub async fn settled(&self) -> AuthResult<AuthSnapshot> {
        self.wait_for(AuthSnapshot::is_stable).await
    }

    pub fn is_running(&self) -> bool {
        !self.events.is_closed()
    }
}
