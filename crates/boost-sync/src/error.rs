//! # Sync Error Types
//!
//! Error types for refresh and purchase operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │    Transient    │  │      Terminal           │ │
//! │  │                 │  │  (retried)      │  │                         │ │
//! │  │  InvalidConfig  │  │  Network        │  │  LedgerStatus           │ │
//! │  │  ConfigLoad     │  │  Predicate      │  │  RetriesExhausted       │ │
//! │  │  ConfigSave     │  │   Unsatisfied   │  │  (InvalidTokens is      │ │
//! │  └─────────────────┘  └─────────────────┘  │   never retried)        │ │
//! │                                             └─────────────────────────┘ │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │   Shared Store  │  │    Internal     │                              │
//! │  │                 │  │                 │                              │
//! │  │  StoreFailed    │  │  ShuttingDown   │                              │
//! │  │                 │  │                 │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use boost_core::LedgerStatus;
use thiserror::Error;

use crate::ledger::LedgerError;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering refresh, purchase and configuration failures.
///
/// Errors are `Clone` because terminal outcomes are delivered both to the
/// caller's ticket and to every event subscriber.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Ledger Errors
    // =========================================================================
    /// The request failed outright; nothing usable came back.
    #[error("Network error: {0}")]
    Network(String),

    /// The request completed but the ledger reported a non-success status.
    #[error("Ledger returned status {0}")]
    LedgerStatus(LedgerStatus),

    /// The round-trip succeeded but the caller's success condition is not
    /// met yet.
    #[error("Refresh succeeded but its success condition is not met")]
    PredicateUnsatisfied,

    /// Every allowed attempt failed.
    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<SyncError> },

    // =========================================================================
    // Shared Store Errors
    // =========================================================================
    /// Writing to the shared store failed.
    #[error("Shared store error: {0}")]
    StoreFailed(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// The coordinator is shutting down.
    #[error("Sync coordinator is shutting down")]
    ShuttingDown,
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<LedgerError> for SyncError {
    fn from(err: LedgerError) -> Self {
        SyncError::Network(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl SyncError {
    /// Returns true if a refresh should try again after this error.
    ///
    /// ## Retryable Errors
    /// - Network failures
    /// - Success conditions not met yet
    /// - Ledger statuses other than `InvalidTokens`
    ///
    /// ## Non-Retryable Errors
    /// - `InvalidTokens` (needs a reset, retrying cannot help)
    /// - Configuration and internal errors
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Network(_) | SyncError::PredicateUnsatisfied => true,
            SyncError::LedgerStatus(status) => *status != LedgerStatus::InvalidTokens,
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }

    /// The innermost error, looking through `RetriesExhausted`.
    pub fn root_cause(&self) -> &SyncError {
        match self {
            SyncError::RetriesExhausted { last, .. } => last.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::Network("timeout".into()).is_retryable());
        assert!(SyncError::PredicateUnsatisfied.is_retryable());
        assert!(SyncError::LedgerStatus(LedgerStatus::ServerError).is_retryable());

        assert!(!SyncError::LedgerStatus(LedgerStatus::InvalidTokens).is_retryable());
        assert!(!SyncError::InvalidConfig("bad".into()).is_retryable());
        assert!(!SyncError::ShuttingDown.is_retryable());
    }

    #[test]
    fn test_root_cause_unwraps_exhaustion() {
        let err = SyncError::RetriesExhausted {
            attempts: 3,
            last: Box::new(SyncError::Network("unreachable".into())),
        };
        assert_eq!(err.root_cause(), &SyncError::Network("unreachable".into()));
        assert!(err.to_string().contains("3 attempts"));
    }

    #[test]
    fn test_ledger_error_maps_to_network() {
        let err: SyncError = LedgerError::Network("reset by peer".into()).into();
        assert!(matches!(err, SyncError::Network(_)));
    }
}
