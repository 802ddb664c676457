//! # Engine Context
//!
//! State shared by the refresh and purchase engines. It is owned by the
//! coordinator task and only touched from there, so it needs no locks.
//!
//! ## Stage From Source
//! ```text
//! ┌───────────────┐   marked expired ids   ┌───────────────────────────┐
//! │ SharedStore   │───────────────────────►│                           │
//! └───────────────┘                        │  reconcile()              │──► active purchases
//! ┌───────────────┐   local purchases      │  (removed ids deleted     │
//! │ Ledger        │───────────────────────►│   from the ledger store)  │
//! │  (in-memory)  │                        └───────────────────────────┘
//! │               │   prices ─────────────► SpeedBoostProduct::build ──► catalog
//! │               │   token kinds ────────► AuthPackage             ──► auth package
//! │               │   balance ──────────────────────────────────────► balance
//! └───────────────┘
//!                                  all of it ──► StagingArea::stage_source
//! ```

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use boost_core::{reconcile, AuthPackage, ClientModel, SourceState, SpeedBoostProduct, StagingArea};

use crate::config::BoostConfig;
use crate::coordinator::{CommandSender, EngineEvent};
use crate::error::SyncResult;
use crate::ledger::Ledger;
use crate::publisher::ModelPublisher;
use crate::store::SharedStore;

pub(crate) struct EngineContext {
    pub config: Arc<BoostConfig>,
    pub ledger: Arc<dyn Ledger>,
    pub store: Arc<dyn SharedStore>,
    pub staging: StagingArea,
    pub publisher: ModelPublisher,
    pub events: broadcast::Sender<EngineEvent>,
    pub commands: CommandSender,
}

impl EngineContext {
    /// Stages every ledger-derived field from the ledger's in-memory state.
    ///
    /// Purchases the shared store marks as expired are dropped here and
    /// deleted from the ledger store.
    pub fn stage_from_source(&mut self) {
        let marked = self.store.marked_expired_authorization_ids();
        let local = self.ledger.purchases();
        let reconciled = reconcile(&local, &marked);

        if reconciled.removed_any() {
            match self.ledger.remove_purchases(&reconciled.removed_ids) {
                Ok(()) => info!(
                    event = "expired_purchases_removed",
                    count = reconciled.removed_ids.len(),
                    ids = ?reconciled.removed_ids,
                    "Removed purchases marked expired by the shared store"
                ),
                Err(e) => warn!(
                    event = "expired_purchases_remove_failed",
                    error = %e,
                    "Could not delete expired purchases from the ledger store"
                ),
            }
        }

        let catalog = &self.config.catalog;
        let build = SpeedBoostProduct::build(
            &self.ledger.purchase_prices(),
            &catalog.transaction_class,
            &catalog.distinguishers,
        );
        for dropped in &build.dropped {
            debug!(
                event = "catalog_entry_dropped",
                class = %dropped.transaction_class,
                distinguisher = %dropped.distinguisher,
                price = %dropped.price,
                "Ignoring price outside the offered catalog"
            );
        }

        self.staging.stage_source(SourceState {
            balance: self.ledger.balance(),
            auth_package: AuthPackage::from_kinds(self.ledger.valid_token_kinds()),
            speed_boost_product: build.product,
            active_purchases: reconciled.active,
        });
    }

    /// Commits staged edits and publishes the result.
    pub fn commit(&mut self) -> Arc<ClientModel> {
        let model = self.staging.commit();
        let revision = self.publisher.publish(Arc::clone(&model));
        debug!(
            revision,
            balance = %model.balance,
            refresh_pending = model.refresh_pending,
            pending_purchases = model.pending_purchases.len(),
            "Model committed"
        );
        model
    }

    /// Sends an event to every subscriber. Having none is fine.
    pub fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }

    /// Writes the current model's authorizations to the shared store.
    pub fn export_authorizations(&self) -> SyncResult<()> {
        let authorizations = self.staging.current().container_authorizations();
        self.store.set_container_authorizations(&authorizations)?;
        debug!(count = authorizations.len(), "Exported container authorizations");
        Ok(())
    }

    /// Transaction classes passed to `refresh_state`.
    pub fn refresh_classes(&self) -> Vec<String> {
        vec![self.config.catalog.transaction_class.clone()]
    }
}
