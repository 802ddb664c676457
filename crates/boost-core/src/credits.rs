//! # Credits Module
//!
//! Provides the `Credits` type for ledger balances and SKU prices.
//!
//! ## Why Integer Credits?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PRICE COMPARISON MUST BE EXACT                                         │
//! │                                                                         │
//! │  The ledger rejects a purchase whose expected price differs from its    │
//! │  own by a single unit (TransactionAmountMismatch). The client then      │
//! │  decides between "catalog stale" and "price changed" by comparing the   │
//! │  staged price with the new one. Floating point would make that          │
//! │  comparison unreliable, so every amount is an i64 of ledger units.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Credits Type
// =============================================================================

/// An amount of ledger credit, in the ledger's smallest unit.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Credits(i64);

impl Credits {
    /// Creates an amount from raw ledger units.
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Credits(units)
    }

    /// Returns the raw ledger units.
    #[inline]
    pub const fn units(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Credits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
