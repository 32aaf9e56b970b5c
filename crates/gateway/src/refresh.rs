use std::sync::Arc;

use tokio::sync::watch;

/// "Refresh everything now" trigger shared by every view.
///
/// Pollers created with [`crate::PollOptions::with_refresh`] issue a
/// refetch each time [`RefreshSignal::trigger`] is called.
#[derive(Debug, Clone)]
pub struct RefreshSignal {
    tx: Arc<watch::Sender<u64>>,
}

impl Default for RefreshSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        self.tx.send_modify(|tick| *tick += 1);
    }

    /// How many times the signal has fired.
    pub fn ticks(&self) -> u64 {
        *self.tx.borrow()
    }

    /// Receiver that sees only triggers issued after this call.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}
