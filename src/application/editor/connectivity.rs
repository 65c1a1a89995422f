//! Shared online/offline state with edge-triggered transitions.

use std::sync::Arc;

use tokio::sync::watch;

/// Connectivity flag shared between the probe loop and the engine.
///
/// Writers report probe results and learn whether the value actually flipped;
/// observers subscribe for change notifications. Collapsing identical reports
/// here is what keeps reconciliation to one run per offline-to-online
/// transition.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    state: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    pub fn new(online: bool) -> Self {
        let (state, _) = watch::channel(online);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Record a probe result. Returns whether the value changed.
    pub fn set_online(&self, online: bool) -> bool {
        self.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}
