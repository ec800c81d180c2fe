//! # Connectivity Monitor
//!
//! Tracks a single online/offline boolean for the offline subsystem. The
//! embedding platform pushes "online"/"offline" transition events into
//! `set_online`; there is no polling and no heartbeat. Consumers either read
//! the current value or subscribe to transitions.

use std::sync::Arc;
use tokio::sync::watch;

/// Connectivity state holder.
///
/// Cheap to clone; clones observe and feed the same state.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    sender: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    /// Create a monitor with the platform's current connectivity signal
    pub fn new(initially_online: bool) -> Self {
        let (sender, _) = watch::channel(initially_online);
        Self { sender: Arc::new(sender) }
    }

    /// Current connectivity
    pub fn is_online(&self) -> bool {
        *self.sender.borrow()
    }

    /// Record a connectivity transition event
    pub fn set_online(&self, online: bool) {
        self.sender.send_replace(online);
    }

    /// Subscribe to connectivity transitions
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}
