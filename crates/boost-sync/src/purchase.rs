//! # Purchase Engine
//!
//! Runs one Speed Boost purchase at a time and maps the ledger's answer to
//! a fixed outcome taxonomy.
//!
//! ## Failure Handling
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  status                      detail / side effect                       │
//! │  ─────────────────────────   ──────────────────────────────────────     │
//! │  TransactionAmountMismatch   SKU missing from catalog  ► ProductNotFound│
//! │                                                         + resync        │
//! │                              same price in catalog     ► CatalogStale   │
//! │                                                         + resync        │
//! │                              different price           ► PriceChanged   │
//! │                                                         (new price)     │
//! │  TransactionTypeNotFound     SKU removed from the staged catalog        │
//! │  any other failure           mapped status only                         │
//! │  no status (network)         TryAgainLater                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Every path clears `pending_purchases` and produces exactly one user
//! message and one `purchase_failed` log event.

use std::collections::BTreeSet;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use boost_core::{CoreError, Credits, FailureStatus, Purchase, Sku};

use crate::context::EngineContext;
use crate::coordinator::{Command, EngineEvent};
use crate::ledger::{LedgerError, PurchaseResponse};
use crate::messages::{MessageKey, UserMessage};

/// State of a purchase as reported to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseOutcome {
    InProgress { sku: Sku },
    Success(Purchase),
    Failure {
        /// `None` when the request produced no status at all.
        status: Option<FailureStatus>,
        detail: FailureDetail,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureDetail {
    None,
    ProductNotFound,
    CatalogStale,
    PriceChanged { new_price: Credits },
    Network(String),
}

impl FailureDetail {
    fn message(&self, status: Option<FailureStatus>) -> UserMessage {
        match (self, status) {
            (FailureDetail::ProductNotFound, _) => UserMessage::new(MessageKey::ProductNotFound),
            (FailureDetail::CatalogStale, _) => UserMessage::new(MessageKey::CatalogStale),
            (FailureDetail::PriceChanged { new_price }, _) => UserMessage::price_changed(*new_price),
            (_, Some(status)) => UserMessage::new(status.into()),
            (_, None) => UserMessage::new(MessageKey::TryAgainLater),
        }
    }
}

/// Work the coordinator should do after a purchase ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FollowUp {
    /// Start a general remote refresh.
    Resync,
    /// Re-show the landing page on the next connect.
    LandingPageReshow,
}

struct InFlightPurchase {
    op: Uuid,
    sku: Sku,
    task: JoinHandle<()>,
    reply: Option<oneshot::Sender<PurchaseOutcome>>,
}

#[derive(Default)]
pub(crate) struct PurchaseEngine {
    in_flight: Option<InFlightPurchase>,
}

impl PurchaseEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a purchase of `sku`, disposing any purchase already in flight.
    pub fn start(
        &mut self,
        ctx: &mut EngineContext,
        sku: Sku,
        reply: Option<oneshot::Sender<PurchaseOutcome>>,
    ) {
        self.cancel();

        let op = Uuid::new_v4();
        info!(%op, distinguisher = %sku.distinguisher, price = %sku.price, "Starting purchase");

        ctx.staging.set_pending_purchases(BTreeSet::from([sku.clone()]));
        ctx.commit();
        ctx.emit(EngineEvent::Purchase(PurchaseOutcome::InProgress { sku: sku.clone() }));

        let ledger = ctx.ledger.clone();
        let commands = ctx.commands.clone();
        let class = ctx.config.catalog.transaction_class.clone();
        let distinguisher = sku.distinguisher.clone();
        let price = sku.price;

        let task = tokio::spawn(async move {
            let result = ledger
                .new_expiring_purchase_transaction(&class, &distinguisher, price)
                .await;
            commands.send(Command::PurchaseDone { op, result });
        });

        self.in_flight = Some(InFlightPurchase {
            op,
            sku,
            task,
            reply,
        });
    }

    /// Disposes the in-flight purchase. Its result, if it still arrives, is
    /// dropped and its ticket resolves to `None`.
    pub fn cancel(&mut self) -> bool {
        match self.in_flight.take() {
            Some(previous) => {
                previous.task.abort();
                debug!(op = %previous.op, distinguisher = %previous.sku.distinguisher, "Purchase disposed");
                true
            }
            None => false,
        }
    }

    /// Handles the ledger's answer to the purchase transaction.
    pub fn on_done(
        &mut self,
        ctx: &mut EngineContext,
        op: Uuid,
        result: Result<PurchaseResponse, LedgerError>,
    ) -> Option<FollowUp> {
        match &self.in_flight {
            Some(current) if current.op == op => {}
            _ => {
                debug!(%op, "Dropping completion for disposed purchase");
                return None;
            }
        }
        let done = self.in_flight.take()?;

        let (outcome, follow_up) = match result {
            Ok(PurchaseResponse {
                purchase: Some(purchase),
                status,
            }) if status.is_success() => {
                Self::succeed(ctx, purchase)
            }
            Ok(response) => {
                let status = response.status.failure().unwrap_or(FailureStatus::Unexpected);
                Self::fail(ctx, &done.sku, status)
            }
            Err(e) => {
                ctx.staging.set_pending_purchases(BTreeSet::new());
                ctx.commit();

                error!(
                    event = "purchase_failed",
                    distinguisher = %done.sku.distinguisher,
                    error = %e,
                    "Purchase request failed without a status"
                );
                let detail = FailureDetail::Network(e.to_string());
                ctx.emit(EngineEvent::UserMessage(detail.message(None)));
                (
                    PurchaseOutcome::Failure {
                        status: None,
                        detail,
                    },
                    None,
                )
            }
        };

        ctx.emit(EngineEvent::Purchase(outcome.clone()));
        if let Some(reply) = done.reply {
            let _ = reply.send(outcome);
        }
        follow_up
    }

    fn succeed(ctx: &mut EngineContext, purchase: Purchase) -> (PurchaseOutcome, Option<FollowUp>) {
        let expected = &ctx.config.catalog.transaction_class;
        let checked = match &purchase.authorization {
            Some(authorization) => authorization.validate(expected).map(|_| ()),
            None => Err(CoreError::MissingAuthorization {
                purchase_id: purchase.id.clone(),
            }),
        };
        if let Err(e) = checked {
            warn!(
                event = "authorization_inconsistent",
                purchase_id = %purchase.id,
                error = %e,
                "Purchase authorization does not check out"
            );
        }

        ctx.stage_from_source();
        ctx.staging.set_pending_purchases(BTreeSet::new());
        ctx.commit();

        if let Err(e) = ctx.export_authorizations() {
            warn!(error = %e, "Failed to export container authorizations");
        }
        ctx.emit(EngineEvent::AuthorizationsUpdated);

        info!(
            event = "purchase_succeeded",
            purchase_id = %purchase.id,
            distinguisher = %purchase.distinguisher,
            "Purchase succeeded"
        );

        (
            PurchaseOutcome::Success(purchase),
            Some(FollowUp::LandingPageReshow),
        )
    }

    fn fail(
        ctx: &mut EngineContext,
        sku: &Sku,
        status: FailureStatus,
    ) -> (PurchaseOutcome, Option<FollowUp>) {
        ctx.stage_from_source();
        ctx.staging.set_pending_purchases(BTreeSet::new());

        let (detail, follow_up) = match status {
            FailureStatus::TransactionAmountMismatch => {
                match ctx.staging.staged_catalog().and_then(|c| c.find(&sku.distinguisher)) {
                    None => (FailureDetail::ProductNotFound, Some(FollowUp::Resync)),
                    Some(listed) if listed.price == sku.price => {
                        (FailureDetail::CatalogStale, Some(FollowUp::Resync))
                    }
                    Some(listed) => (
                        FailureDetail::PriceChanged {
                            new_price: listed.price,
                        },
                        None,
                    ),
                }
            }
            FailureStatus::TransactionTypeNotFound => {
                if let Some(trimmed) = ctx
                    .staging
                    .staged_catalog()
                    .map(|c| c.without(&sku.distinguisher))
                {
                    ctx.staging.set_speed_boost_product(Some(trimmed));
                }
                (FailureDetail::None, None)
            }
            _ => (FailureDetail::None, None),
        };

        ctx.commit();

        error!(
            event = "purchase_failed",
            distinguisher = %sku.distinguisher,
            price = %sku.price,
            %status,
            detail = ?detail,
            "Purchase failed"
        );
        ctx.emit(EngineEvent::UserMessage(detail.message(Some(status))));

        (
            PurchaseOutcome::Failure {
                status: Some(status),
                detail,
            },
            follow_up,
        )
    }
}
