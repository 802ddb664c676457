//! # Connection Watcher
//!
//! Maps tunnel status to a refresh mode.
//!
//! ```text
//!                 Connected
//!   ┌────────┐ ───────────────► ┌────────┐
//!   │ Local  │                  │ Remote │
//!   └────────┘ ◄─────────────── └────────┘
//!               anything else
//!
//! Local:  cancel the general refresh, recompute from cached data
//! Remote: start a general refresh against the ledger
//! ```

use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::coordinator::CoordinatorHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TunnelStatus {
    Connecting,
    Connected,
    Disconnecting,
    Disconnected,
    Reconnecting,
    Restarting,
    Invalid,
}

impl std::fmt::Display for TunnelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TunnelStatus::Connecting => "connecting",
            TunnelStatus::Connected => "connected",
            TunnelStatus::Disconnecting => "disconnecting",
            TunnelStatus::Disconnected => "disconnected",
            TunnelStatus::Reconnecting => "reconnecting",
            TunnelStatus::Restarting => "restarting",
            TunnelStatus::Invalid => "invalid",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshMode {
    /// Recompute from cached ledger state only.
    #[default]
    Local,
    /// Refresh against the remote ledger.
    Remote,
}

impl RefreshMode {
    pub fn for_status(status: TunnelStatus) -> Self {
        match status {
            TunnelStatus::Connected => RefreshMode::Remote,
            _ => RefreshMode::Local,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct ConnectionWatcher {
    mode: RefreshMode,
}

impl ConnectionWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `status` and returns the mode to run.
    pub fn on_status(&mut self, status: TunnelStatus) -> RefreshMode {
        let next = RefreshMode::for_status(status);
        if next != self.mode {
            info!(%status, from = ?self.mode, to = ?next, "Refresh mode changed");
        } else {
            debug!(%status, mode = ?next, "Tunnel status received");
        }
        self.mode = next;
        next
    }
}

/// Feeds every status from `statuses` to the coordinator until the stream
/// ends or the coordinator stops.
pub fn forward_tunnel_status<S>(statuses: S, handle: CoordinatorHandle) -> JoinHandle<()>
where
    S: Stream<Item = TunnelStatus> + Send + 'static,
{
    tokio::spawn(async move {
        futures_util::pin_mut!(statuses);
        while let Some(status) = statuses.next().await {
            if handle.tunnel_status(status).is_err() {
                debug!("Coordinator stopped, no longer forwarding tunnel status");
                break;
            }
        }
    })
}
