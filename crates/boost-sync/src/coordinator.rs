//! # Sync Coordinator
//!
//! Owns the staging area, the publisher and both engines, and is the only
//! place any of them is touched. Everything else talks to it through a
//! [`CoordinatorHandle`].
//!
//! ## Coordinator Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SyncCoordinator Task                             │
//! │                                                                         │
//! │   CoordinatorHandle ──┐                                                 │
//! │   (UI, tunnel feed)   │  Command::{TunnelStatus, Refresh, Purchase}     │
//! │                       ▼                                                 │
//! │                ┌─────────────┐                                          │
//! │   spawned ────►│ mpsc queue  │──► run loop (one command at a time)      │
//! │   tasks        └─────────────┘         │                                │
//! │   (network,                            ├──► ConnectionWatcher           │
//! │    timers)                             ├──► RefreshEngine               │
//! │      ▲                                 ├──► PurchaseEngine              │
//! │      │  *Done / RetryDue (op id)       └──► EngineContext               │
//! │      └──────────────────────────────────      StagingArea ─► Publisher  │
//! │                                                                         │
//! │  PUBLISHED:                                                             │
//! │  ──────────                                                             │
//! │  models        - every committed ClientModel, replaying the latest      │
//! │  reward token  - derived token, only when it changes                    │
//! │  events        - outcomes, user messages, authorizations updated        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Spawned tasks hold only weak senders, so the loop ends once every handle
//! is dropped, or on `shutdown()`.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use boost_core::{ClientModel, Credits, LedgerStatus, Sku, StagingArea};

use crate::config::BoostConfig;
use crate::context::EngineContext;
use crate::error::{SyncError, SyncResult};
use crate::ledger::{Ledger, LedgerError, PurchaseResponse};
use crate::messages::UserMessage;
use crate::policy::{RefreshKind, RefreshPolicy};
use crate::publisher::{ModelPublisher, Published, ReplaySource, RewardTokenFn, Subscription};
use crate::purchase::{FollowUp, PurchaseEngine, PurchaseOutcome};
use crate::refresh::{RefreshEngine, RefreshOutcome};
use crate::store::{MemorySharedStore, SharedStore};
use crate::watcher::{ConnectionWatcher, RefreshMode, TunnelStatus};

// =============================================================================
// Commands and Events
// =============================================================================

pub(crate) enum Command {
    TunnelStatus(TunnelStatus),
    Refresh {
        kind: RefreshKind,
        policy: RefreshPolicy,
        reply: oneshot::Sender<RefreshOutcome>,
    },
    Purchase {
        sku: Sku,
        reply: oneshot::Sender<PurchaseOutcome>,
    },
    RefreshAttemptDone {
        kind: RefreshKind,
        op: Uuid,
        result: Result<LedgerStatus, LedgerError>,
    },
    RefreshRetryDue {
        kind: RefreshKind,
        op: Uuid,
    },
    PurchaseDone {
        op: Uuid,
        result: Result<PurchaseResponse, LedgerError>,
    },
    TakeLandingPageReshow {
        reply: oneshot::Sender<bool>,
    },
    Shutdown,
}

/// Sender used by spawned tasks. It does not keep the coordinator alive.
#[derive(Clone)]
pub(crate) struct CommandSender(mpsc::WeakUnboundedSender<Command>);

impl CommandSender {
    /// Posts `command` if the coordinator is still running.
    pub fn send(&self, command: Command) {
        if let Some(sender) = self.0.upgrade() {
            let _ = sender.send(command);
        }
    }
}

/// Notifications broadcast to every event subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Refresh {
        kind: RefreshKind,
        outcome: RefreshOutcome,
    },
    Purchase(PurchaseOutcome),
    /// Container authorizations were written to the shared store.
    AuthorizationsUpdated,
    UserMessage(UserMessage),
    /// The tunnel reconnected after a purchase; show the landing page again.
    LandingPageReshowRequested,
}

// =============================================================================
// Ticket
// =============================================================================

/// Resolves to an operation's terminal outcome, or `None` if the operation
/// was disposed before it finished.
#[derive(Debug)]
pub struct Ticket<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Ticket<T> {
    pub async fn outcome(self) -> Option<T> {
        self.rx.await.ok()
    }
}

// =============================================================================
// Coordinator
// =============================================================================

pub struct SyncCoordinator {
    ctx: EngineContext,
    refresh: RefreshEngine,
    purchase: PurchaseEngine,
    watcher: ConnectionWatcher,
    reshow_landing_page: bool,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl SyncCoordinator {
    /// Runs the coordinator on the current runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Processes commands until shutdown or until every handle is dropped.
    pub async fn run(mut self) {
        info!("Sync coordinator started");

        while let Some(command) = self.commands.recv().await {
            if !self.handle_command(command) {
                break;
            }
        }

        self.refresh.cancel_all();
        self.purchase.cancel();
        info!("Sync coordinator stopped");
    }

    /// Returns false when the loop should stop.
    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::TunnelStatus(status) => self.on_tunnel_status(status),

            Command::Refresh {
                kind,
                policy,
                reply,
            } => self.refresh.start(&mut self.ctx, kind, policy, Some(reply)),

            Command::Purchase { sku, reply } => {
                self.purchase.start(&mut self.ctx, sku, Some(reply))
            }

            Command::RefreshAttemptDone { kind, op, result } => {
                self.refresh.on_attempt_done(&mut self.ctx, kind, op, result)
            }

            Command::RefreshRetryDue { kind, op } => {
                self.refresh.on_retry_due(&mut self.ctx, kind, op)
            }

            Command::PurchaseDone { op, result } => {
                match self.purchase.on_done(&mut self.ctx, op, result) {
                    Some(FollowUp::Resync) => {
                        debug!("Catalog out of date, starting resync");
                        self.start_general_refresh();
                    }
                    Some(FollowUp::LandingPageReshow) => self.reshow_landing_page = true,
                    None => {}
                }
            }

            Command::TakeLandingPageReshow { reply } => {
                let _ = reply.send(std::mem::take(&mut self.reshow_landing_page));
            }

            Command::Shutdown => {
                info!("Sync coordinator received shutdown");
                return false;
            }
        }
        true
    }

    fn on_tunnel_status(&mut self, status: TunnelStatus) {
        match self.watcher.on_status(status) {
            RefreshMode::Remote => {
                if std::mem::take(&mut self.reshow_landing_page) {
                    self.ctx.emit(EngineEvent::LandingPageReshowRequested);
                }
                self.start_general_refresh();
            }
            RefreshMode::Local => {
                self.refresh.cancel(RefreshKind::General);
                self.ctx.stage_from_source();
                self.ctx
                    .staging
                    .set_refresh_pending(self.refresh.any_in_flight());
                self.ctx.commit();
            }
        }
    }

    fn start_general_refresh(&mut self) {
        let policy = RefreshPolicy::general(&self.ctx.config);
        self.refresh
            .start(&mut self.ctx, RefreshKind::General, policy, None);
    }
}

// =============================================================================
// Handle
// =============================================================================

/// Cloneable front end of a running coordinator.
#[derive(Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::UnboundedSender<Command>,
    models: ReplaySource<Arc<ClientModel>>,
    reward_token: ReplaySource<Option<String>>,
    events: broadcast::Sender<EngineEvent>,
    ledger: Arc<dyn Ledger>,
    config: Arc<BoostConfig>,
}

impl CoordinatorHandle {
    fn send(&self, command: Command) -> SyncResult<()> {
        self.commands
            .send(command)
            .map_err(|_| SyncError::ShuttingDown)
    }

    /// Starts a general refresh, disposing one already in flight.
    pub fn refresh(&self) -> SyncResult<Ticket<RefreshOutcome>> {
        self.refresh_with(RefreshKind::General, RefreshPolicy::general(&self.config))
    }

    /// Polls until the balance differs from `starting`.
    pub fn poll_balance_delta(&self, starting: Credits) -> SyncResult<Ticket<RefreshOutcome>> {
        self.refresh_with(
            RefreshKind::BalanceDelta,
            RefreshPolicy::balance_delta(&self.config, starting),
        )
    }

    pub fn refresh_with(
        &self,
        kind: RefreshKind,
        policy: RefreshPolicy,
    ) -> SyncResult<Ticket<RefreshOutcome>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Refresh {
            kind,
            policy,
            reply,
        })?;
        Ok(Ticket { rx })
    }

    /// Purchases `sku`, disposing any purchase already in flight.
    pub fn purchase(&self, sku: Sku) -> SyncResult<Ticket<PurchaseOutcome>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Purchase { sku, reply })?;
        Ok(Ticket { rx })
    }

    pub fn tunnel_status(&self, status: TunnelStatus) -> SyncResult<()> {
        self.send(Command::TunnelStatus(status))
    }

    /// The most recently committed model.
    pub fn current_model(&self) -> Arc<ClientModel> {
        self.models
            .latest()
            .map(|published| published.value)
            .unwrap_or_default()
    }

    pub fn subscribe_models(&self) -> Subscription<Arc<ClientModel>> {
        self.models.subscribe()
    }

    pub fn subscribe_reward_token(&self) -> Subscription<Option<String>> {
        self.reward_token.subscribe()
    }

    /// The most recently published reward token.
    pub fn reward_token(&self) -> Option<Published<Option<String>>> {
        self.reward_token.latest()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Returns true, once, if the landing page should be shown again.
    pub async fn take_landing_page_reshow(&self) -> SyncResult<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::TakeLandingPageReshow { reply })?;
        rx.await.map_err(|_| SyncError::ShuttingDown)
    }

    /// Asks the ledger to decorate a landing page URL. Falls back to `url`
    /// unchanged if the ledger cannot.
    pub async fn modify_landing_page(&self, url: &Url) -> Url {
        match self.ledger.modify_landing_page(url).await {
            Ok(modified) => modified,
            Err(e) => {
                warn!(error = %e, url = %url, "Landing page not modified");
                url.clone()
            }
        }
    }

    /// Stops the coordinator; in-flight operations are disposed.
    pub fn shutdown(&self) -> SyncResult<()> {
        self.send(Command::Shutdown)
    }
}

// =============================================================================
// Builder Pattern
// =============================================================================

pub struct SyncCoordinatorBuilder {
    config: BoostConfig,
    ledger: Option<Arc<dyn Ledger>>,
    store: Option<Arc<dyn SharedStore>>,
}

impl SyncCoordinatorBuilder {
    pub fn new(config: BoostConfig) -> Self {
        SyncCoordinatorBuilder {
            config,
            ledger: None,
            store: None,
        }
    }

    pub fn with_ledger(mut self, ledger: Arc<dyn Ledger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Sets the shared store. Defaults to an in-memory store.
    pub fn with_store(mut self, store: Arc<dyn SharedStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Builds the coordinator and publishes the first model, computed from
    /// cached ledger state.
    pub fn build(self) -> SyncResult<(SyncCoordinator, CoordinatorHandle)> {
        self.config.validate()?;

        let ledger = self
            .ledger
            .ok_or_else(|| SyncError::InvalidConfig("Ledger required".into()))?;
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemorySharedStore::new()));
        let config = Arc::new(self.config);

        let token_ledger = Arc::clone(&ledger);
        let derive_token: RewardTokenFn =
            Box::new(move |_: &ClientModel| match token_ledger.rewarded_activity_data() {
                Ok(data) => data,
                Err(e) => {
                    warn!(error = %e, "Failed to read rewarded activity data");
                    None
                }
            });

        let (tx, rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(config.publisher.channel_capacity);

        let mut ctx = EngineContext {
            config: Arc::clone(&config),
            ledger: Arc::clone(&ledger),
            store,
            staging: StagingArea::new(ClientModel::default()),
            publisher: ModelPublisher::new(derive_token),
            events: events.clone(),
            commands: CommandSender(tx.downgrade()),
        };
        ctx.stage_from_source();
        ctx.staging.set_refresh_pending(false);
        ctx.commit();

        let handle = CoordinatorHandle {
            commands: tx,
            models: ctx.publisher.models(),
            reward_token: ctx.publisher.reward_token(),
            events,
            ledger,
            config,
        };

        let coordinator = SyncCoordinator {
            ctx,
            refresh: RefreshEngine::new(),
            purchase: PurchaseEngine::new(),
            watcher: ConnectionWatcher::new(),
            reshow_landing_page: false,
            commands: rx,
        };

        Ok((coordinator, handle))
    }
}
