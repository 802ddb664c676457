//! # Error Types
//!
//! Domain-specific error types for boost-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  boost-core errors (this file)                                         │
//! │  └── CoreError        - Authorization decoding / validation failures   │
//! │                                                                         │
//! │  boost-sync errors (separate crate)                                    │
//! │  └── SyncError        - Network, ledger status, retry exhaustion       │
//! │                                                                         │
//! │  Flow: CoreError → logged by the purchase engine, never fails a        │
//! │        purchase the ledger has already committed                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Domain errors raised while interpreting ledger data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The authorization token is not valid base64.
    #[error("Authorization is not valid base64: {0}")]
    AuthorizationEncoding(String),

    /// The decoded authorization envelope is not the expected JSON shape.
    #[error("Authorization payload is malformed: {0}")]
    AuthorizationPayload(String),

    /// The authorization grants a different access type than the purchase
    /// was made for.
    ///
    /// ## When This Occurs
    /// - Ledger returned an authorization for another product family
    /// - Server-side catalog misconfiguration
    #[error("Authorization access type '{actual}' does not match expected '{expected}'")]
    AccessTypeMismatch { expected: String, actual: String },

    /// A purchase that should carry an authorization has none.
    #[error("Purchase {purchase_id} has no authorization")]
    MissingAuthorization { purchase_id: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::AccessTypeMismatch {
            expected: "speed-boost".to_string(),
            actual: "other".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Authorization access type 'other' does not match expected 'speed-boost'"
        );

        let err = CoreError::MissingAuthorization {
            purchase_id: "p-1".to_string(),
        };
        assert_eq!(err.to_string(), "Purchase p-1 has no authorization");
    }
}
