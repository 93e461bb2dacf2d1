//! Cross-tab auth synchronizer.
//!
//! Decides, from the tab's readiness flags and the persisted signal, whether
//! this tab should revalidate. The first activation only adopts the current
//! signal: the initial status fetch belongs to the auth machine's own
//! startup, so revalidating here would double it.

use tracing::debug;

/// Inputs the decision depends on. Nothing else may trigger it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncInputs {
    pub client_mounted: bool,
    pub rpc_client_ready: bool,
    pub signal: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Not mounted or no client yet.
    Inactive,
    /// First activation; the signal was taken as already handled.
    Adopted(u64),
    /// Another tab changed auth; send `CHECK`.
    Revalidate(u64),
    UpToDate,
}

#[derive(Debug, Default)]
pub struct CrossTabAuthSynchronizer {
    last_seen: Option<u64>,
    last_inputs: Option<SyncInputs>,
}

impl CrossTabAuthSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal value this tab has handled, `None` before the first activation.
    pub fn last_seen(&self) -> Option<u64> {
        self.last_seen
    }

    pub fn observe(&mut self, inputs: SyncInputs) -> SyncAction {
        if self.last_inputs == Some(inputs) {
            return SyncAction::UpToDate;
        }
        self.last_inputs = Some(inputs);

        if !(inputs.client_mounted && inputs.rpc_client_ready) {
            return SyncAction::Inactive;
        }

        match self.last_seen {
            None => {
                self.last_seen = Some(inputs.signal);
                debug!(signal = inputs.signal, "adopted cross-tab signal");
                SyncAction::Adopted(inputs.signal)
            }
            // Ties and older values are ignored.
            Some(seen) if inputs.signal > seen => {
                self.last_seen = Some(inputs.signal);
                SyncAction::Revalidate(inputs.signal)
            }
            Some(_) => SyncAction::UpToDate,
        }
    }

    /// Record a value this tab wrote so it never revalidates on its own write.
    pub fn note_local_write(&mut self, signal: u64) {
        self.last_seen = Some(self.last_seen.map_or(signal, |seen| seen.max(signal)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(signal: u64) -> SyncInputs {
        SyncInputs {
            client_mounted: true,
            rpc_client_ready: true,
            signal,
        }
    }

    #[test]
    fn waits_for_both_readiness_flags() {
        let mut sync = CrossTabAuthSynchronizer::new();
        let unmounted = SyncInputs {
            client_mounted: false,
            ..ready(5)
        };
        let no_client = SyncInputs {
            rpc_client_ready: false,
            ..ready(5)
        };

        assert_eq!(sync.observe(unmounted), SyncAction::Inactive);
        assert_eq!(sync.observe(no_client), SyncAction::Inactive);
        assert_eq!(sync.last_seen(), None);
    }

    #[test]
    fn first_activation_adopts_without_revalidating() {
        let mut sync = CrossTabAuthSynchronizer::new();
        assert_eq!(sync.observe(ready(1_000)), SyncAction::Adopted(1_000));
        assert_eq!(sync.last_seen(), Some(1_000));
    }

    #[test]
    fn newer_signal_revalidates_exactly_once() {
        let mut sync = CrossTabAuthSynchronizer::new();
        sync.observe(ready(1_000));

        assert_eq!(sync.observe(ready(2_000)), SyncAction::Revalidate(2_000));
        assert_eq!(sync.observe(ready(2_000)), SyncAction::UpToDate);
        assert_eq!(sync.last_seen(), Some(2_000));
    }

    #[test]
    fn older_or_equal_signal_is_ignored() {
        let mut sync = CrossTabAuthSynchronizer::new();
        sync.observe(ready(2_000));

        assert_eq!(sync.observe(ready(1_500)), SyncAction::UpToDate);
        assert_eq!(sync.last_seen(), Some(2_000));
    }

    #[test]
    fn client_swap_does_not_revalidate_on_stale_signal() {
        let mut sync = CrossTabAuthSynchronizer::new();
        sync.observe(ready(1_000));
        assert_eq!(
            sync.observe(SyncInputs {
                rpc_client_ready: false,
                ..ready(1_000)
            }),
            SyncAction::Inactive
        );

        assert_eq!(sync.observe(ready(1_000)), SyncAction::UpToDate);
    }

    #[test]
    fn local_writes_are_not_revalidated() {
        let mut sync = CrossTabAuthSynchronizer::new();
        sync.observe(ready(1_000));
        sync.note_local_write(3_000);

        assert_eq!(sync.observe(ready(3_000)), SyncAction::UpToDate);
        assert_eq!(sync.observe(ready(3_001)), SyncAction::Revalidate(3_001));
    }
}
