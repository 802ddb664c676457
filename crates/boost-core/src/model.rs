//! # Client Model and Staging Area
//!
//! `ClientModel` is the immutable snapshot the UI renders. It is never
//! mutated after it is committed; every change goes through a
//! `StagingArea`, which layers field-level edits over the current model and
//! produces a complete new snapshot on `commit()`.
//!
//! ## Staging Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   current: Arc<ClientModel> (rev N)                                     │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   ┌──────────────────────────┐                                          │
//! │   │ overlay                  │  set_refresh_pending(true)               │
//! │   │  balance:          None  │  stage_source(ledger state)              │
//! │   │  refresh_pending:  true  │  set_pending_purchases({sku})            │
//! │   │  ...                     │                                          │
//! │   └────────────┬─────────────┘                                          │
//! │                │ commit()                                               │
//! │                ▼                                                        │
//! │   current: Arc<ClientModel> (rev N+1) = base ⊕ overlay                  │
//! │   overlay cleared                                                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::authorization::SignedAuthorization;
use crate::catalog::SpeedBoostProduct;
use crate::credits::Credits;
use crate::types::{AuthPackage, Purchase, Sku};

// =============================================================================
// Client Model
// =============================================================================

/// Immutable view of reward and entitlement state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientModel {
    /// Current credit balance.
    pub balance: Credits,

    /// Valid credential kinds; empty when the ledger reported none.
    pub auth_package: AuthPackage,

    /// Purchasable SKUs; `None` if the catalog is unavailable.
    pub speed_boost_product: Option<SpeedBoostProduct>,

    /// Purchases already reconciled against the expired marks.
    pub active_purchases: BTreeSet<Purchase>,

    /// SKUs with a purchase transaction in flight.
    pub pending_purchases: BTreeSet<Sku>,

    /// True while a refresh is in flight.
    pub refresh_pending: bool,
}

impl ClientModel {
    /// The unexpired purchase with the latest expiry, if any.
    pub fn active_speed_boost(&self, now: DateTime<Utc>) -> Option<&Purchase> {
        self.active_purchases
            .iter()
            .filter(|p| !p.is_expired_at(now))
            .max_by_key(|p| p.expiry)
    }

    pub fn is_purchase_pending(&self) -> bool {
        !self.pending_purchases.is_empty()
    }

    /// Signed authorizations of every active purchase, in purchase order.
    pub fn container_authorizations(&self) -> Vec<SignedAuthorization> {
        self.active_purchases
            .iter()
            .filter_map(|p| p.authorization.clone())
            .collect()
    }
}

// =============================================================================
// Source State
// =============================================================================

/// Authoritative data read from the ledger for one staging pass.
///
/// `active_purchases` must already be reconciled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceState {
    pub balance: Credits,
    pub auth_package: AuthPackage,
    pub speed_boost_product: Option<SpeedBoostProduct>,
    pub active_purchases: BTreeSet<Purchase>,
}

// =============================================================================
// Staging Area
// =============================================================================

#[derive(Debug, Clone, Default)]
struct Overlay {
    balance: Option<Credits>,
    auth_package: Option<AuthPackage>,
    speed_boost_product: Option<Option<SpeedBoostProduct>>,
    active_purchases: Option<BTreeSet<Purchase>>,
    pending_purchases: Option<BTreeSet<Sku>>,
    refresh_pending: Option<bool>,
}

impl Overlay {
    fn is_empty(&self) -> bool {
        self.balance.is_none()
            && self.auth_package.is_none()
            && self.speed_boost_product.is_none()
            && self.active_purchases.is_none()
            && self.pending_purchases.is_none()
            && self.refresh_pending.is_none()
    }
}

/// Mutable builder for the next `ClientModel`.
#[derive(Debug, Clone)]
pub struct StagingArea {
    current: Arc<ClientModel>,
    overlay: Overlay,
}

impl StagingArea {
    pub fn new(initial: ClientModel) -> Self {
        StagingArea {
            current: Arc::new(initial),
            overlay: Overlay::default(),
        }
    }

    /// The last committed model.
    pub fn current(&self) -> &Arc<ClientModel> {
        &self.current
    }

    /// Returns true if there are staged edits not yet committed.
    pub fn is_dirty(&self) -> bool {
        !self.overlay.is_empty()
    }

    pub fn set_balance(&mut self, balance: Credits) -> &mut Self {
        self.overlay.balance = Some(balance);
        self
    }

    pub fn set_auth_package(&mut self, auth_package: AuthPackage) -> &mut Self {
        self.overlay.auth_package = Some(auth_package);
        self
    }

    pub fn set_speed_boost_product(&mut self, product: Option<SpeedBoostProduct>) -> &mut Self {
        self.overlay.speed_boost_product = Some(product);
        self
    }

    pub fn set_active_purchases(&mut self, purchases: BTreeSet<Purchase>) -> &mut Self {
        self.overlay.active_purchases = Some(purchases);
        self
    }

    pub fn set_pending_purchases(&mut self, skus: BTreeSet<Sku>) -> &mut Self {
        self.overlay.pending_purchases = Some(skus);
        self
    }

    pub fn set_refresh_pending(&mut self, pending: bool) -> &mut Self {
        self.overlay.refresh_pending = Some(pending);
        self
    }

    /// Stages every ledger-derived field from `source`.
    ///
    /// `refresh_pending` and `pending_purchases` are left alone; callers set
    /// them explicitly.
    pub fn stage_source(&mut self, source: SourceState) -> &mut Self {
        self.overlay.balance = Some(source.balance);
        self.overlay.auth_package = Some(source.auth_package);
        self.overlay.speed_boost_product = Some(source.speed_boost_product);
        self.overlay.active_purchases = Some(source.active_purchases);
        self
    }

    /// The catalog as it would be committed right now.
    pub fn staged_catalog(&self) -> Option<&SpeedBoostProduct> {
        match &self.overlay.speed_boost_product {
            Some(staged) => staged.as_ref(),
            None => self.current.speed_boost_product.as_ref(),
        }
    }

    /// The full model as it would be committed right now.
    pub fn preview(&self) -> ClientModel {
        let base = &*self.current;
        let o = &self.overlay;
        ClientModel {
            balance: o.balance.unwrap_or(base.balance),
            auth_package: o
                .auth_package
                .clone()
                .unwrap_or_else(|| base.auth_package.clone()),
            speed_boost_product: o
                .speed_boost_product
                .clone()
                .unwrap_or_else(|| base.speed_boost_product.clone()),
            active_purchases: o
                .active_purchases
                .clone()
                .unwrap_or_else(|| base.active_purchases.clone()),
            pending_purchases: o
                .pending_purchases
                .clone()
                .unwrap_or_else(|| base.pending_purchases.clone()),
            refresh_pending: o.refresh_pending.unwrap_or(base.refresh_pending),
        }
    }

    /// Applies the overlay, makes the result current and returns it.
    pub fn commit(&mut self) -> Arc<ClientModel> {
        let next = Arc::new(self.preview());
        self.overlay = Overlay::default();
        self.current = Arc::clone(&next);
        next
    }

    /// Drops staged edits without committing.
    pub fn discard(&mut self) {
        self.overlay = Overlay::default();
    }
}
