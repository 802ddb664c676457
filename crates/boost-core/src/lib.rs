//! # boost-core: Pure Domain Logic for the Boost Client
//!
//! This crate holds everything about rewards, credits and Speed Boost
//! entitlements that can be expressed without touching the network, the
//! shared store or a clock source.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Boost Client Architecture                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 boost-sync (engine, tokio)                      │   │
//! │  │   Coordinator ──► RefreshEngine / PurchaseEngine ──► Publisher  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ stage / commit                         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ boost-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │  credits  │  │   model   │  │  catalog  │  │ reconcile │  │   │
//! │  │   │  Credits  │  │ClientModel│  │ SpeedBoost│  │  expired  │  │   │
//! │  │   │           │  │StagingArea│  │  Product  │  │  marks    │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO ASYNC • NO NETWORK • PURE FUNCTIONS               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`credits`] - Integer credit amounts
//! - [`types`] - Purchases, SKUs, token kinds, ledger status codes
//! - [`authorization`] - Decoding of signed authorization tokens
//! - [`catalog`] - Speed Boost catalog construction and filtering
//! - [`model`] - Immutable `ClientModel` and its `StagingArea` builder
//! - [`reconcile`] - Merging local purchases with externally expired marks
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use boost_core::{ClientModel, Credits, StagingArea};
//!
//! let mut staging = StagingArea::new(ClientModel::default());
//! staging.set_balance(Credits::from_units(300));
//! staging.set_refresh_pending(true);
//!
//! let model = staging.commit();
//! assert_eq!(model.balance, Credits::from_units(300));
//! assert!(model.refresh_pending);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod authorization;
pub mod catalog;
pub mod credits;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod types;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use authorization::{Authorization, SignedAuthorization};
pub use catalog::{CatalogBuild, SpeedBoostProduct};
pub use credits::Credits;
pub use error::{CoreError, CoreResult};
pub use model::{ClientModel, SourceState, StagingArea};
pub use reconcile::{reconcile, Reconciliation};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Transaction class shared by every Speed Boost purchase.
///
/// The ledger uses the same string as the access type of the authorization
/// it issues for the purchase.
pub const SPEED_BOOST_CLASS: &str = "speed-boost";

/// Distinguishers the client offers for sale.
///
/// Anything else the ledger advertises under [`SPEED_BOOST_CLASS`] is
/// dropped from the catalog.
pub const DEFAULT_TARGET_DISTINGUISHERS: &[&str] =
    &["1hr", "2hr", "3hr", "4hr", "5hr", "6hr", "7hr", "8hr", "9hr"];
