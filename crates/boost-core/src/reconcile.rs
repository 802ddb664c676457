//! # Expiry Reconciliation
//!
//! Two sources of truth decide whether a Speed Boost is still active:
//! the local ledger store (expiry computed from the device clock) and the
//! shared store, where the tunnel process marks authorizations the server
//! has already rejected as expired.
//!
//! ```text
//! active = local purchases − { p : authorization_id(p) ∈ marked_expired }
//! ```
//!
//! The shared store wins. Purchases it has marked are returned in
//! `removed_ids` so the caller can delete them from the ledger store as
//! well, which keeps the next pass from seeing them again.

use std::collections::{BTreeSet, HashSet};

use crate::types::Purchase;

/// Output of a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Purchases that remain active.
    pub active: BTreeSet<Purchase>,
    /// Ledger ids of purchases to delete from the local store.
    pub removed_ids: Vec<String>,
}

impl Reconciliation {
    pub fn removed_any(&self) -> bool {
        !self.removed_ids.is_empty()
    }
}

/// Drops every purchase whose authorization id is in `marked_expired`.
///
/// Purchases without a decodable authorization cannot be matched and are
/// kept.
pub fn reconcile<'a>(
    local: impl IntoIterator<Item = &'a Purchase>,
    marked_expired: &HashSet<String>,
) -> Reconciliation {
    let mut out = Reconciliation::default();

    for purchase in local {
        let expired = purchase
            .authorization_id()
            .is_some_and(|id| marked_expired.contains(&id));

        if expired {
            out.removed_ids.push(purchase.id.clone());
        } else {
            out.active.insert(purchase.clone());
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::{Authorization, SignedAuthorization};
    use chrono::{Duration, Utc};

    fn purchase(id: &str, auth_id: Option<&str>) -> Purchase {
        let authorization = auth_id.map(|auth_id| {
            SignedAuthorization::encode(
                &Authorization {
                    id: auth_id.to_string(),
                    access_type: "speed-boost".into(),
                    expires: Utc::now() + Duration::hours(1),
                },
                "key",
                "sig",
            )
            .unwrap()
        });
        Purchase {
            id: id.into(),
            transaction_class: "speed-boost".into(),
            distinguisher: "1hr".into(),
            authorization,
            expiry: None,
        }
    }

    fn expired(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_removes_marked_purchases() {
        let local = vec![purchase("p1", Some("a1")), purchase("p2", Some("a2"))];
        let result = reconcile(&local, &expired(&["a2"]));

        assert_eq!(result.active.len(), 1);
        assert!(result.active.iter().any(|p| p.id == "p1"));
        assert_eq!(result.removed_ids, vec!["p2".to_string()]);
    }

    #[test]
    fn test_matches_on_authorization_id_not_purchase_id() {
        let local = vec![purchase("a1", Some("zz"))];
        let result = reconcile(&local, &expired(&["a1"]));
        assert_eq!(result.active.len(), 1);
        assert!(!result.removed_any());
    }

    #[test]
    fn test_purchase_without_authorization_is_kept() {
        let local = vec![purchase("p1", None)];
        let result = reconcile(&local, &expired(&["p1"]));
        assert_eq!(result.active.len(), 1);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let local = vec![
            purchase("p1", Some("a1")),
            purchase("p2", Some("a2")),
            purchase("p3", Some("a3")),
        ];
        let marks = expired(&["a1", "a3"]);

        let first = reconcile(&local, &marks);
        let second = reconcile(&first.active, &marks);

        assert_eq!(first.active, second.active);
        assert!(!second.removed_any());
    }
}
