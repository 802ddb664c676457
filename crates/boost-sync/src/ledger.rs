//! # Ledger Seam
//!
//! The remote ledger library is opaque to this crate. It keeps its own
//! in-memory view of balance, token kinds, prices and purchases, and exposes
//! a handful of network operations that update that view.
//!
//! ```text
//! ┌──────────────────────┐        ┌──────────────────────────────────────┐
//! │   boost-sync engine  │        │        Ledger implementation         │
//! │                      │  sync  │                                      │
//! │  stage_from_source ──┼───────►│  balance() / purchases() / ...       │
//! │                      │        │  (in-memory, never blocks)           │
//! │                      │ async  │                                      │
//! │  refresh attempt   ──┼───────►│  refresh_state(classes)              │
//! │  purchase          ──┼───────►│  new_expiring_purchase_transaction   │
//! │  landing page      ──┼───────►│  modify_landing_page(url)            │
//! └──────────────────────┘        └──────────────────────────────────────┘
//! ```
//!
//! Async calls are issued from spawned tasks; results are handed back to the
//! coordinator before any state is read or staged.

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use boost_core::{Credits, LedgerStatus, Purchase, PurchasePrice, TokenKind};

/// Failure of the ledger call itself, with no status code attached.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("network: {0}")]
    Network(String),

    #[error("library: {0}")]
    Library(String),
}

/// Result of `new_expiring_purchase_transaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseResponse {
    pub status: LedgerStatus,
    /// Present only when `status` is `Success`.
    pub purchase: Option<Purchase>,
}

impl PurchaseResponse {
    pub fn success(purchase: Purchase) -> Self {
        PurchaseResponse {
            status: LedgerStatus::Success,
            purchase: Some(purchase),
        }
    }

    pub fn failed(status: LedgerStatus) -> Self {
        PurchaseResponse {
            status,
            purchase: None,
        }
    }
}

/// Operations the engine needs from the ledger library.
#[async_trait]
pub trait Ledger: Send + Sync {
    // =========================================================================
    // In-memory reads
    // =========================================================================

    fn balance(&self) -> Credits;

    fn valid_token_kinds(&self) -> Vec<TokenKind>;

    fn purchase_prices(&self) -> Vec<PurchasePrice>;

    fn purchases(&self) -> Vec<Purchase>;

    /// Deletes purchases from the local store by purchase id.
    fn remove_purchases(&self, ids: &[String]) -> Result<(), LedgerError>;

    /// Opaque token describing rewarded activity, if any.
    fn rewarded_activity_data(&self) -> Result<Option<String>, LedgerError>;

    // =========================================================================
    // Network operations
    // =========================================================================

    /// Pulls fresh state for the given transaction classes.
    async fn refresh_state(&self, transaction_classes: &[String])
        -> Result<LedgerStatus, LedgerError>;

    async fn new_expiring_purchase_transaction(
        &self,
        transaction_class: &str,
        distinguisher: &str,
        expected_price: Credits,
    ) -> Result<PurchaseResponse, LedgerError>;

    async fn modify_landing_page(&self, url: &Url) -> Result<Url, LedgerError>;
}
