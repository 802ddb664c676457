//! # Shared Store Seam
//!
//! The shared key-value store is written by the tunnel process and read by
//! this client. Only two entries matter here: the authorization ids the
//! tunnel has seen rejected as expired, and the authorizations the tunnel
//! should present.

use std::collections::HashSet;
use std::sync::RwLock;

use boost_core::SignedAuthorization;

use crate::error::{SyncError, SyncResult};

pub trait SharedStore: Send + Sync {
    /// Authorization ids marked expired by the tunnel process.
    fn marked_expired_authorization_ids(&self) -> HashSet<String>;

    /// Replaces the authorizations handed to the tunnel process.
    fn set_container_authorizations(&self, authorizations: &[SignedAuthorization])
        -> SyncResult<()>;
}

// =============================================================================
// In-Memory Store
// =============================================================================

/// `SharedStore` held in process memory.
#[derive(Debug, Default)]
pub struct MemorySharedStore {
    expired: RwLock<HashSet<String>>,
    authorizations: RwLock<Vec<SignedAuthorization>>,
}

impl MemorySharedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks an authorization id as expired.
    pub fn mark_expired(&self, authorization_id: impl Into<String>) {
        if let Ok(mut expired) = self.expired.write() {
            expired.insert(authorization_id.into());
        }
    }

    /// The authorizations last written by the engine.
    pub fn container_authorizations(&self) -> Vec<SignedAuthorization> {
        self.authorizations
            .read()
            .map(|a| a.clone())
            .unwrap_or_default()
    }
}

impl SharedStore for MemorySharedStore {
    fn marked_expired_authorization_ids(&self) -> HashSet<String> {
        self.expired.read().map(|e| e.clone()).unwrap_or_default()
    }

    fn set_container_authorizations(
        &self,
        authorizations: &[SignedAuthorization],
    ) -> SyncResult<()> {
        let mut stored = self
            .authorizations
            .write()
            .map_err(|e| SyncError::StoreFailed(e.to_string()))?;
        *stored = authorizations.to_vec();
        Ok(())
    }
}
