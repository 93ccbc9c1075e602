use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{info, warn};

pub const OFFLINE_BANNER: &str = "You are currently offline. Some features may not be available.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Online,
    Offline,
}

/// Shared, observable online/offline flag. Cloning yields another handle to
/// the same flag; only a [`ConnectivityGate`] writes to it.
#[derive(Debug, Clone)]
pub struct ConnectivityState {
    tx: Arc<watch::Sender<Connectivity>>,
}

impl ConnectivityState {
    pub fn new(initial: Connectivity) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> Connectivity {
        *self.tx.borrow()
    }

    pub fn is_offline(&self) -> bool {
        self.current() == Connectivity::Offline
    }

    pub fn subscribe(&self) -> ConnectivitySubscription {
        ConnectivitySubscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    fn set(&self, value: Connectivity) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        })
    }
}

/// Live view of the connectivity flag. Dropping it, or calling
/// [`ConnectivitySubscription::unsubscribe`], ends the subscription.
#[derive(Debug)]
pub struct ConnectivitySubscription {
    rx: watch::Receiver<Connectivity>,
}

impl ConnectivitySubscription {
    pub fn current(&self) -> Connectivity {
        *self.rx.borrow()
    }

    /// Waits for the next transition. Returns `None` once every writer is gone.
    pub async fn changed(&mut self) -> Option<Connectivity> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }

    pub fn unsubscribe(self) {}
}

/// Applies connectivity signals from the hosting environment to the shared
/// flag. Going offline never cancels submissions that are already in flight.
#[derive(Debug, Clone)]
pub struct ConnectivityGate {
    state: ConnectivityState,
}

impl ConnectivityGate {
    pub fn new(state: &ConnectivityState) -> Self {
        Self {
            state: state.clone(),
        }
    }

    pub fn state(&self) -> &ConnectivityState {
        &self.state
    }

    pub fn is_offline(&self) -> bool {
        self.state.is_offline()
    }

    /// Returns `true` when the signal changed the flag.
    pub fn observe(&self, signal: Connectivity) -> bool {
        let changed = self.state.set(signal);
        if changed {
            match signal {
                Connectivity::Offline => warn!("connectivity lost; new uploads will be held back"),
                Connectivity::Online => info!("connectivity restored"),
            }
        }
        changed
    }

    pub fn banner(&self) -> Option<&'static str> {
        self.is_offline().then_some(OFFLINE_BANNER)
    }

    /// Feeds `signals` into the gate until the stream ends.
    pub fn follow<S>(&self, signals: S) -> JoinHandle<()>
    where
        S: Stream<Item = Connectivity> + Send + 'static,
    {
        let gate = self.clone();
        tokio::spawn(async move {
            let mut signals = Box::pin(signals);
            while let Some(signal) = signals.next().await {
                gate.observe(signal);
            }
        })
    }
}

#[cfg(test)]
#[path = "tests/connectivity_tests.rs"]
mod tests;
