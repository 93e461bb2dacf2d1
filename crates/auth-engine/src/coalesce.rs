//! Refresh coalescing and the client handle the auth machine is given.

use crate::error::GatewayError;
use crate::gateway::{login_and_canary, refresh_and_canary, AuthGateway, ConfirmedReply, RpcReply};
use crate::service::DEFAULT_RPC_TIMEOUT;
use crate::status::Credentials;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

type SharedRefresh = Shared<BoxFuture<'static, Result<ConfirmedReply, GatewayError>>>;

/// Ensures at most one `refresh_and_canary` is in flight per gateway.
///
/// Callers arriving while a refresh is running await that same flight and
/// observe its outcome; the slot is released once the flight settles.
/// The deadline belongs to the flight, so a hung backend settles it with
/// [`GatewayError::Timeout`] for every waiter instead of pinning the slot.
pub struct RefreshCoalescer {
    gateway: Arc<dyn AuthGateway>,
    in_flight: Mutex<Option<(u64, SharedRefresh)>>,
    generation: AtomicU64,
}

impl RefreshCoalescer {
    pub fn new(gateway: Arc<dyn AuthGateway>) -> Self {
        Self {
            gateway,
            in_flight: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub async fn refresh(&self) -> Result<ConfirmedReply, GatewayError> {
        self.refresh_within(DEFAULT_RPC_TIMEOUT).await
    }

    /// Joins the running flight, or starts one that gives up after `bound`.
    pub async fn refresh_within(&self, bound: Duration) -> Result<ConfirmedReply, GatewayError> {
        let (generation, flight) = {
            let mut slot = self.in_flight.lock();
            match slot.as_ref() {
                Some((generation, flight)) => {
                    debug!(generation, "joining in-flight refresh");
                    (*generation, flight.clone())
                }
                None => {
                    let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                    let gateway = Arc::clone(&self.gateway);
                    let flight = async move {
                        match tokio::time::timeout(bound, refresh_and_canary(gateway.as_ref())).await {
                            Ok(outcome) => outcome,
                            Err(_) => {
                                warn!(generation, ?bound, "refresh timed out");
                                Err(GatewayError::Timeout(bound))
                            }
                        }
                    }
                    .boxed()
                    .shared();
                    *slot = Some((generation, flight.clone()));
                    debug!(generation, "starting refresh");
                    (generation, flight)
                }
            }
        };

        let outcome = flight.await;

        let mut slot = self.in_flight.lock();
        if matches!(slot.as_ref(), Some((current, _)) if *current == generation) {
            *slot = None;
        }
        outcome
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight.lock().is_some()
    }
}

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// RPC client handed to the auth machine on `CLIENT_READY`.
///
/// Clones share one gateway and one [`RefreshCoalescer`], so a refresh
/// started by the machine and one started by a 401 handler are the same call.
#[derive(Clone)]
pub struct SessionClient {
    id: u64,
    gateway: Arc<dyn AuthGateway>,
    refresher: Arc<RefreshCoalescer>,
}

impl SessionClient {
    pub fn new(gateway: Arc<dyn AuthGateway>) -> Self {
        Self {
            id: NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed),
            refresher: Arc::new(RefreshCoalescer::new(Arc::clone(&gateway))),
            gateway,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn gateway(&self) -> &Arc<dyn AuthGateway> {
        &self.gateway
    }

    pub async fn check_status(&self) -> Result<RpcReply, GatewayError> {
        self.gateway.check_status().await
    }

    /// Coalesced refresh followed by a canary.
    pub async fn refresh_and_canary(&self) -> Result<ConfirmedReply, GatewayError> {
        self.refresher.refresh().await
    }

    /// Coalesced refresh whose flight, if this call starts it, is cut off after `bound`.
    pub async fn refresh_and_canary_within(&self, bound: Duration) -> Result<ConfirmedReply, GatewayError> {
        self.refresher.refresh_within(bound).await
    }

    /// Entry point for data-layer code that got a 401: joins any refresh
    /// already in flight instead of issuing a second one.
    pub async fn refresh_on_unauthorized(&self) -> Result<ConfirmedReply, GatewayError> {
        self.refresher.refresh().await
    }

    pub async fn login_and_canary(&self, credentials: &Credentials) -> Result<ConfirmedReply, GatewayError> {
        login_and_canary(self.gateway.as_ref(), credentials).await
    }

    pub async fn logout(&self) -> Result<RpcReply, GatewayError> {
        self.gateway.logout().await
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresher.is_refreshing()
    }
}

impl fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionClient").field("id", &self.id).finish_non_exhaustive()
    }
}

impl PartialEq for SessionClient {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
