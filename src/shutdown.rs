//! Ctrl+C handling for long listings
//!
//! A [`ShutdownSignal`] is shared between the signal handler and whatever is
//! consuming pages. Consumers either check [`ShutdownSignal::is_requested`]
//! between pages or race a page fetch against [`ShutdownSignal::wait`]; the
//! `records list` command does the latter, dropping the read in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::warn;

/// Shared handle to a shutdown signal
pub type SharedShutdown = Arc<ShutdownSignal>;

/// One-shot flag with async notification
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    requested: AtomicBool,
    notify: Notify,
}

impl ShutdownSignal {
    /// Signal that has not fired
    pub fn new() -> Self {
        Self::default()
    }

    /// New signal wrapped in [`Arc`]
    pub fn shared() -> SharedShutdown {
        Arc::new(Self::new())
    }

    /// Fire the signal; waking waiters happens once
    pub fn request(&self) {
        if !self.requested.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    /// Whether the signal fired
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Resolve once the signal fires; immediately if it already has
    pub async fn wait(&self) {
        let notified = self.notify.notified();
        if self.is_requested() {
            return;
        }
        notified.await;
    }
}

/// Fire `signal` on the first Ctrl+C
pub fn spawn_ctrl_c_handler(signal: SharedShutdown) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, stopping after the current page");
                signal.request();
            }
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl+C"),
        }
    })
}
