//! # User Messages
//!
//! Messages the UI shows after an operation ends. Each carries a stable key
//! for localization lookup and at most one appended value (the new price
//! for `PriceChanged`). Raw protocol detail never reaches the user.

use std::fmt;

use serde::{Deserialize, Serialize};

use boost_core::{Credits, FailureStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKey {
    ExistingTransaction,
    InsufficientBalance,
    TransactionAmountMismatch,
    TransactionTypeNotFound,
    InvalidTokens,
    ServerError,
    InvalidRequest,
    UnexpectedStatus,
    /// Mismatch, and the SKU is gone from the catalog.
    ProductNotFound,
    /// Mismatch, same price in the catalog; a resync is under way.
    CatalogStale,
    /// Mismatch, the catalog now carries a different price.
    PriceChanged,
    /// The request never produced a status.
    TryAgainLater,
}

impl MessageKey {
    /// Stable localization identifier.
    pub fn id(&self) -> &'static str {
        match self {
            MessageKey::ExistingTransaction => "speed-boost.existing-transaction",
            MessageKey::InsufficientBalance => "speed-boost.insufficient-balance",
            MessageKey::TransactionAmountMismatch => "speed-boost.amount-mismatch",
            MessageKey::TransactionTypeNotFound => "speed-boost.type-not-found",
            MessageKey::InvalidTokens => "speed-boost.invalid-tokens",
            MessageKey::ServerError => "speed-boost.server-error",
            MessageKey::InvalidRequest => "speed-boost.invalid-request",
            MessageKey::UnexpectedStatus => "speed-boost.unexpected-status",
            MessageKey::ProductNotFound => "speed-boost.product-not-found",
            MessageKey::CatalogStale => "speed-boost.catalog-stale",
            MessageKey::PriceChanged => "speed-boost.price-changed",
            MessageKey::TryAgainLater => "speed-boost.try-again-later",
        }
    }
}

impl From<FailureStatus> for MessageKey {
    fn from(status: FailureStatus) -> Self {
        match status {
            FailureStatus::ExistingTransaction => MessageKey::ExistingTransaction,
            FailureStatus::InsufficientBalance => MessageKey::InsufficientBalance,
            FailureStatus::TransactionAmountMismatch => MessageKey::TransactionAmountMismatch,
            FailureStatus::TransactionTypeNotFound => MessageKey::TransactionTypeNotFound,
            FailureStatus::InvalidTokens => MessageKey::InvalidTokens,
            FailureStatus::ServerError => MessageKey::ServerError,
            FailureStatus::Invalid => MessageKey::InvalidRequest,
            FailureStatus::Unexpected => MessageKey::UnexpectedStatus,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMessage {
    pub key: MessageKey,
    pub value: Option<String>,
}

impl UserMessage {
    pub fn new(key: MessageKey) -> Self {
        UserMessage { key, value: None }
    }

    pub fn price_changed(new_price: Credits) -> Self {
        UserMessage {
            key: MessageKey::PriceChanged,
            value: Some(new_price.to_string()),
        }
    }
}

impl fmt::Display for UserMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{} {}", self.key.id(), value),
            None => write!(f, "{}", self.key.id()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_changed_appends_price() {
        let message = UserMessage::price_changed(Credits::from_units(250));
        assert_eq!(message.value.as_deref(), Some("250"));
        assert_eq!(message.to_string(), "speed-boost.price-changed 250");
    }

    #[test]
    fn test_every_failure_has_a_key() {
        let statuses = [
            FailureStatus::ExistingTransaction,
            FailureStatus::InsufficientBalance,
            FailureStatus::TransactionAmountMismatch,
            FailureStatus::TransactionTypeNotFound,
            FailureStatus::InvalidTokens,
            FailureStatus::ServerError,
            FailureStatus::Invalid,
            FailureStatus::Unexpected,
        ];
        let ids: std::collections::HashSet<_> =
            statuses.iter().map(|s| MessageKey::from(*s).id()).collect();
        assert_eq!(ids.len(), statuses.len());
    }
}
