//! # Domain Types
//!
//! Core domain types shared by the engine and its collaborators.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Purchase     │   │      Sku        │   │  PurchasePrice  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  distinguisher  │   │  class          │       │
//! │  │  class          │   │  price          │   │  distinguisher  │       │
//! │  │  distinguisher  │   └─────────────────┘   │  price          │       │
//! │  │  authorization  │                         └─────────────────┘       │
//! │  │  expiry         │                                                    │
//! │  └─────────────────┘                                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   TokenKind     │   │  LedgerStatus   │   │ FailureStatus   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  Earner         │   │  raw library    │   │  what the user  │       │
//! │  │  Indicator      │   │  status code    │   │  is told about  │       │
//! │  │  Spender        │   │                 │   │                 │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::authorization::SignedAuthorization;
use crate::credits::Credits;

// =============================================================================
// Credential Kinds
// =============================================================================

/// A kind of ledger credential the client may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Earner,
    Indicator,
    Spender,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Earner => write!(f, "earner"),
            TokenKind::Indicator => write!(f, "indicator"),
            TokenKind::Spender => write!(f, "spender"),
        }
    }
}

/// The set of credential kinds the ledger currently reports as valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthPackage {
    kinds: BTreeSet<TokenKind>,
}

impl AuthPackage {
    /// Builds a package from whatever kinds the ledger reported.
    pub fn from_kinds(kinds: impl IntoIterator<Item = TokenKind>) -> Self {
        AuthPackage {
            kinds: kinds.into_iter().collect(),
        }
    }

    /// The empty package, used when the ledger reports no valid tokens.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn has(&self, kind: TokenKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Returns true if the client can spend credits at all.
    pub fn can_spend(&self) -> bool {
        self.has(TokenKind::Spender)
    }

    pub fn kinds(&self) -> impl Iterator<Item = TokenKind> + '_ {
        self.kinds.iter().copied()
    }
}

// =============================================================================
// Catalog Entries
// =============================================================================

/// A price the ledger advertises for a transaction class / distinguisher.
///
/// This is the unfiltered form; the catalog keeps only the entries the
/// client knows how to sell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchasePrice {
    pub transaction_class: String,
    pub distinguisher: String,
    pub price: Credits,
}

/// A purchasable Speed Boost SKU.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Sku {
    /// Identifier such as "1hr".
    pub distinguisher: String,
    /// Price in ledger units.
    pub price: Credits,
}

impl Sku {
    pub fn new(distinguisher: impl Into<String>, price: Credits) -> Self {
        Sku {
            distinguisher: distinguisher.into(),
            price,
        }
    }
}

// =============================================================================
// Purchase
// =============================================================================

/// A purchase recorded in the local ledger store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Purchase {
    /// Ledger-assigned transaction id.
    pub id: String,
    pub transaction_class: String,
    pub distinguisher: String,
    /// Signed credential granting the entitlement.
    pub authorization: Option<SignedAuthorization>,
    /// Local expiry as reported by the ledger.
    pub expiry: Option<DateTime<Utc>>,
}

impl Purchase {
    /// Id of the authorization attached to this purchase, if it decodes.
    pub fn authorization_id(&self) -> Option<String> {
        self.authorization
            .as_ref()
            .and_then(|auth| auth.decode().ok())
            .map(|auth| auth.id)
    }

    /// Returns true if the local expiry has passed at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= now)
    }
}

// =============================================================================
// Ledger Status
// =============================================================================

/// Status code returned by the ledger library for a completed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerStatus {
    Invalid,
    Success,
    ExistingTransaction,
    InsufficientBalance,
    TransactionAmountMismatch,
    TransactionTypeNotFound,
    InvalidTokens,
    ServerError,
    /// A code this client does not know about.
    Unrecognized(i32),
}

impl LedgerStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, LedgerStatus::Success)
    }

    /// Maps a non-success status into the user-facing failure taxonomy.
    ///
    /// Returns `None` for [`LedgerStatus::Success`].
    pub fn failure(&self) -> Option<FailureStatus> {
        let status = match self {
            LedgerStatus::Success => return None,
            LedgerStatus::Invalid => FailureStatus::Invalid,
            LedgerStatus::ExistingTransaction => FailureStatus::ExistingTransaction,
            LedgerStatus::InsufficientBalance => FailureStatus::InsufficientBalance,
            LedgerStatus::TransactionAmountMismatch => FailureStatus::TransactionAmountMismatch,
            LedgerStatus::TransactionTypeNotFound => FailureStatus::TransactionTypeNotFound,
            LedgerStatus::InvalidTokens => FailureStatus::InvalidTokens,
            LedgerStatus::ServerError => FailureStatus::ServerError,
            LedgerStatus::Unrecognized(_) => FailureStatus::Unexpected,
        };
        Some(status)
    }
}

impl fmt::Display for LedgerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerStatus::Unrecognized(code) => write!(f, "unrecognized({code})"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Terminal failure categories for a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureStatus {
    ExistingTransaction,
    InsufficientBalance,
    TransactionAmountMismatch,
    TransactionTypeNotFound,
    /// Credentials are unusable; only a reset recovers from this.
    InvalidTokens,
    ServerError,
    Invalid,
    /// Unknown status code, or a success that carried no purchase.
    Unexpected,
}

impl fmt::Display for FailureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
