//! Connection state shared between an execution client and whoever
//! drives the connect action.
//!
//! DISCONNECTED -> CONNECTING -> CONNECTED. A failed handshake falls back to
//! DISCONNECTED so the connect action can be retried.

use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::constants::events;
use crate::error::ExecutionFailure;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionStatus::Disconnected => "DISCONNECTED",
            ConnectionStatus::Connecting => "CONNECTING",
            ConnectionStatus::Connected => "CONNECTED",
        };
        f.write_str(s)
    }
}

/// Cheap to clone; all clones observe the same state.
#[derive(Clone, Debug)]
pub struct ConnectionState {
    tx: Arc<watch::Sender<ConnectionStatus>>,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectionStatus::Disconnected);
        Self { tx: Arc::new(tx) }
    }

    /// A state that starts out CONNECTED (tests, or backends with no handshake).
    pub fn connected() -> Self {
        let state = Self::new();
        state.tx.send_replace(ConnectionStatus::Connected);
        state
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.tx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.tx.subscribe()
    }

    /// Run `handshake` between the CONNECTING and CONNECTED transitions.
    ///
    /// Already connected is a no-op; a connect racing another in flight is
    /// refused rather than queued.
    pub async fn connect_with<F, Fut>(
        &self,
        backend: &str,
        handshake: F,
    ) -> Result<ConnectionStatus, ExecutionFailure>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), ExecutionFailure>>,
    {
        let mut current = ConnectionStatus::Disconnected;
        let started = self.tx.send_if_modified(|status| {
            current = *status;
            if *status == ConnectionStatus::Disconnected {
                *status = ConnectionStatus::Connecting;
                true
            } else {
                false
            }
        });

        if !started {
            return match current {
                ConnectionStatus::Connected => Ok(ConnectionStatus::Connected),
                _ => Err(ExecutionFailure::connect_in_progress()),
            };
        }

        info!(event = events::CONNECTING, backend, "🔌 [CONNECT] Connecting to {}...", backend);

        // Reverts CONNECTING if this future is dropped mid-handshake
        let guard = ConnectingGuard { tx: &self.tx };
        let outcome = handshake().await;
        std::mem::forget(guard);

        match outcome {
            Ok(()) => {
                self.tx.send_replace(ConnectionStatus::Connected);
                info!(event = events::CONNECTED, backend, "✅ [CONNECT] Connected to {}", backend);
                Ok(ConnectionStatus::Connected)
            }
            Err(e) => {
                self.tx.send_replace(ConnectionStatus::Disconnected);
                warn!(event = events::CONNECT_FAILED, backend, "⚠️ [CONNECT] {} handshake failed: {}", backend, e);
                Err(e)
            }
        }
    }
}

struct ConnectingGuard<'a> {
    tx: &'a watch::Sender<ConnectionStatus>,
}

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        let reverted = self.tx.send_if_modified(|status| {
            if *status == ConnectionStatus::Connecting {
                *status = ConnectionStatus::Disconnected;
                true
            } else {
                false
            }
        });
        if reverted {
            warn!(event = events::CONNECT_FAILED, "⚠️ [CONNECT] Handshake abandoned, back to DISCONNECTED");
        }
    }
}
