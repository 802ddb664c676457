//! # boost-sync: State Sync and Purchase Engine for the Boost Client
//!
//! Keeps the locally published reward/entitlement model in step with the
//! remote ledger, runs Speed Boost purchases, and reconciles entitlements
//! the tunnel process has marked expired.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          boost-sync Engine                              │
//! │                                                                         │
//! │   tunnel status stream          UI                                      │
//! │          │                       │ refresh / purchase / subscribe       │
//! │          ▼                       ▼                                      │
//! │   forward_tunnel_status ──► CoordinatorHandle                           │
//! │                                  │ Command                              │
//! │                                  ▼                                      │
//! │   ┌─────────────────────────────────────────────────────────────────┐  │
//! │   │                 SyncCoordinator (one tokio task)                │  │
//! │   │                                                                 │  │
//! │   │  ConnectionWatcher   RefreshEngine        PurchaseEngine        │  │
//! │   │   Local / Remote      retry + backoff      single flight        │  │
//! │   │         │                  │                     │              │  │
//! │   │         └──────────┬───────┴─────────────────────┘              │  │
//! │   │                    ▼                                            │  │
//! │   │         StagingArea (boost-core) ──commit──► ModelPublisher     │  │
//! │   └─────────────────────────────────────────────────────────────────┘  │
//! │              │                                  │                       │
//! │              ▼                                  ▼                       │
//! │   Ledger (network + cache)        SharedStore (expired marks,          │
//! │                                    container authorizations)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`coordinator`] - `SyncCoordinator` actor, its handle and builder
//! - [`refresh`] - Retrying `refresh_state` driver
//! - [`purchase`] - Purchase transactions and failure taxonomy
//! - [`watcher`] - Tunnel status to refresh mode
//! - [`publisher`] - Replaying snapshot and reward-token channels
//! - [`policy`] - Refresh policies and retry delays
//! - [`messages`] - Localizable user messages
//! - [`ledger`] / [`store`] - Seams to the ledger library and shared store
//! - [`config`] - Engine configuration
//! - [`error`] - Sync error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use boost_sync::{BoostConfig, SyncCoordinatorBuilder, forward_tunnel_status};
//!
//! let config = BoostConfig::load_or_default(None);
//! let (coordinator, handle) = SyncCoordinatorBuilder::new(config)
//!     .with_ledger(ledger)
//!     .with_store(shared_store)
//!     .build()?;
//! coordinator.spawn();
//!
//! forward_tunnel_status(tunnel_statuses, handle.clone());
//!
//! let mut models = handle.subscribe_models();
//! while let Some(model) = models.next().await {
//!     println!("balance: {}", model.value.balance);
//! }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod messages;
pub mod policy;
pub mod publisher;
pub mod purchase;
pub mod refresh;
pub mod store;
pub mod watcher;

mod context;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{BalancePollSettings, BoostConfig, CatalogSettings, PublisherSettings, RefreshSettings};
pub use coordinator::{CoordinatorHandle, EngineEvent, SyncCoordinator, SyncCoordinatorBuilder, Ticket};
pub use error::{SyncError, SyncResult};
pub use ledger::{Ledger, LedgerError, PurchaseResponse};
pub use messages::{MessageKey, UserMessage};
pub use policy::{RefreshKind, RefreshPolicy, RetryDelay, SuccessCondition};
pub use publisher::{Published, Subscription};
pub use purchase::{FailureDetail, PurchaseOutcome};
pub use refresh::RefreshOutcome;
pub use store::{MemorySharedStore, SharedStore};
pub use watcher::{forward_tunnel_status, RefreshMode, TunnelStatus};
