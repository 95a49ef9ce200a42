//! Read-only view of the live session handed to components, and the
//! transport seam they send requests through.

use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::types::{OutboundRequest, PowerStatus};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("not connected")]
    Disconnected,
    #[error("connection task has stopped")]
    Closed,
}

/// Outbound half of the daemon connection. Sends are fire-and-forget.
pub trait Transport {
    fn send(&self, req: OutboundRequest) -> Result<(), TransportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionState {
    pub connected: bool,
    pub has_session: bool,
}

impl ConnectionState {
    pub fn usable(&self) -> bool {
        self.connected && self.has_session
    }
}

/// Snapshot of shared session state for one UI tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionView {
    pub connection: ConnectionState,
    pub status: Option<PowerStatus>,
    pub transferring: bool,
    /// Between `install started` and `install completed`.
    pub installing: bool,
}

impl SessionView {
    /// Missing status is shown as offline.
    pub fn is_offline(&self) -> bool {
        matches!(self.status, None | Some(PowerStatus::Offline))
    }

    /// Why power actions are unavailable, if they are.
    pub fn lock_notice(&self) -> Option<&'static str> {
        if self.installing {
            Some("This server is currently running its installation process and most actions are unavailable.")
        } else if self.transferring {
            Some("This server is currently being transferred to another node and all actions are unavailable.")
        } else {
            None
        }
    }
}

/// Keeps sent requests in memory instead of writing to a socket.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    sent: Arc<Mutex<Vec<OutboundRequest>>>,
    refuse: bool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose every send fails as disconnected.
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<OutboundRequest> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl Transport for MemoryTransport {
    fn send(&self, req: OutboundRequest) -> Result<(), TransportError> {
        if self.refuse {
            return Err(TransportError::Disconnected);
        }
        if let Ok(mut v) = self.sent.lock() {
            v.push(req);
        }
        Ok(())
    }
}
