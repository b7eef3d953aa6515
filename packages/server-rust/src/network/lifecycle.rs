//! Communication state of a served host and in-flight request tracking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::watch;
use tracing::info;

/// Created -> Opened -> Closing -> Closed, or Faulted from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommunicationState {
    Created,
    Opened,
    Closing,
    Closed,
    Faulted,
}

impl CommunicationState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Opened => "opened",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Faulted => "faulted",
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Faulted)
    }
}

/// Shared by the network module and every handler.
///
/// State is swapped lock-free; metadata requests hold an [`ExchangeGuard`]
/// so closing can wait for them to finish.
#[derive(Debug)]
pub struct HostLifecycle {
    state: ArcSwap<CommunicationState>,
    close_signal: watch::Sender<bool>,
    in_flight: Arc<AtomicU64>,
}

impl HostLifecycle {
    #[must_use]
    pub fn new() -> Self {
        let (close_signal, _) = watch::channel(false);
        Self {
            state: ArcSwap::from_pointee(CommunicationState::Created),
            close_signal,
            in_flight: Arc::new(AtomicU64::new(0)),
        }
    }

    #[must_use]
    pub fn state(&self) -> CommunicationState {
        **self.state.load()
    }

    /// Moves `Created` to `Opened`. Returns `false` from any other state.
    pub fn mark_opened(&self) -> bool {
        let previous = self.state.rcu(|state| match **state {
            CommunicationState::Created => CommunicationState::Opened,
            other => other,
        });
        *previous == CommunicationState::Created
    }

    /// Begins closing and wakes every close listener. A no-op once the host
    /// has closed or faulted.
    pub fn begin_close(&self) {
        if self.state().is_terminal() {
            return;
        }
        self.state.store(Arc::new(CommunicationState::Closing));
        let _ = self.close_signal.send(true);
        info!(in_flight = self.in_flight_count(), "host closing");
    }

    pub fn mark_faulted(&self) {
        self.state.store(Arc::new(CommunicationState::Faulted));
        let _ = self.close_signal.send(true);
    }

    #[must_use]
    pub fn close_receiver(&self) -> watch::Receiver<bool> {
        self.close_signal.subscribe()
    }

    /// Resolves once [`begin_close`](Self::begin_close) or
    /// [`mark_faulted`](Self::mark_faulted) has been called.
    pub async fn closed(&self) {
        let mut receiver = self.close_receiver();
        // An error means the sender is gone, which only happens on drop.
        let _ = receiver.wait_for(|closing| *closing).await;
    }

    #[must_use]
    pub fn exchange_guard(&self) -> ExchangeGuard {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        ExchangeGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    #[must_use]
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Waits up to `timeout` for in-flight exchanges to finish. On success the
    /// host moves to `Closed`; on timeout it stays `Closing`.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.in_flight_count() > 0 {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        if self.state() != CommunicationState::Faulted {
            self.state.store(Arc::new(CommunicationState::Closed));
        }
        true
    }
}

impl Default for HostLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts one in-flight metadata exchange until dropped.
#[derive(Debug)]
pub struct ExchangeGuard {
    in_flight: Arc<AtomicU64>,
}

impl Drop for ExchangeGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}
