//! # Refresh Engine
//!
//! Drives `refresh_state` round-trips with retries, one operation per
//! [`RefreshKind`] at a time.
//!
//! ## Attempt Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  start(kind) ──► dispose previous op of kind                            │
//! │       │          stage refresh_pending = true, commit                   │
//! │       ▼                                                                 │
//! │  ┌──────────┐  spawned task   ┌──────────────────────┐                  │
//! │  │ attempt  │────────────────►│ ledger.refresh_state │                  │
//! │  └──────────┘                 └──────────┬───────────┘                  │
//! │       ▲                                  │ RefreshAttemptDone(op)       │
//! │       │                                  ▼                              │
//! │       │                    ┌──────────────────────────────┐             │
//! │       │                    │ status Success?              │             │
//! │       │                    │   stage from source          │             │
//! │       │                    │   success condition holds? ──┼──► Success  │
//! │       │                    └──────────────┬───────────────┘             │
//! │       │                                   │ no                          │
//! │       │                   InvalidTokens ──┼──────────────────► Failure  │
//! │       │                   last attempt  ──┼──► RetriesExhausted         │
//! │       │   RefreshRetryDue(op)             │                             │
//! │       └──────── sleep(next_backoff) ◄─────┘                             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Completions carry the operation id they were spawned for. A completion
//! whose id is no longer current belongs to a disposed operation and is
//! dropped.

use std::collections::HashMap;
use std::time::Duration;

use backoff::backoff::Backoff;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use boost_core::LedgerStatus;

use crate::context::EngineContext;
use crate::coordinator::{Command, EngineEvent};
use crate::error::SyncError;
use crate::ledger::LedgerError;
use crate::messages::{MessageKey, UserMessage};
use crate::policy::{RefreshKind, RefreshPolicy};

/// State of a refresh as reported to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    InProgress,
    Success,
    Failure(SyncError),
}

struct InFlightRefresh {
    op: Uuid,
    policy: RefreshPolicy,
    /// Attempts issued so far, including the one in flight.
    attempt: u32,
    backoff: Box<dyn Backoff + Send>,
    task: JoinHandle<()>,
    reply: Option<oneshot::Sender<RefreshOutcome>>,
}

#[derive(Default)]
pub(crate) struct RefreshEngine {
    in_flight: HashMap<RefreshKind, InFlightRefresh>,
}

impl RefreshEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn any_in_flight(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Starts a refresh of `kind`, disposing any previous one of that kind.
    pub fn start(
        &mut self,
        ctx: &mut EngineContext,
        kind: RefreshKind,
        policy: RefreshPolicy,
        reply: Option<oneshot::Sender<RefreshOutcome>>,
    ) {
        self.cancel(kind);

        let op = Uuid::new_v4();
        debug!(%kind, %op, max_attempts = policy.max_attempts, "Starting refresh");

        ctx.staging.set_refresh_pending(true);
        ctx.commit();
        ctx.emit(EngineEvent::Refresh {
            kind,
            outcome: RefreshOutcome::InProgress,
        });

        let task = spawn_attempt(ctx, kind, op);
        self.in_flight.insert(
            kind,
            InFlightRefresh {
                op,
                backoff: policy.delay.backoff(),
                policy,
                attempt: 1,
                task,
                reply,
            },
        );
    }

    /// Disposes the in-flight refresh of `kind`. Its caller's ticket
    /// resolves to `None`; `refresh_pending` is left for the caller to
    /// restage.
    pub fn cancel(&mut self, kind: RefreshKind) -> bool {
        match self.in_flight.remove(&kind) {
            Some(previous) => {
                previous.task.abort();
                debug!(%kind, op = %previous.op, attempt = previous.attempt, "Refresh disposed");
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        let kinds: Vec<RefreshKind> = self.in_flight.keys().copied().collect();
        for kind in kinds {
            self.cancel(kind);
        }
    }

    /// Handles the result of one `refresh_state` round-trip.
    pub fn on_attempt_done(
        &mut self,
        ctx: &mut EngineContext,
        kind: RefreshKind,
        op: Uuid,
        result: Result<LedgerStatus, LedgerError>,
    ) {
        let Some(current) = self.in_flight.get(&kind) else {
            debug!(%kind, %op, "Dropping completion for disposed refresh");
            return;
        };
        if current.op != op {
            debug!(%kind, %op, "Dropping completion for superseded refresh");
            return;
        }

        let failure = match result {
            Ok(status) if status.is_success() => {
                ctx.stage_from_source();
                if current.policy.success.is_satisfied(&ctx.staging.preview()) {
                    None
                } else {
                    Some(SyncError::PredicateUnsatisfied)
                }
            }
            Ok(status) => Some(SyncError::LedgerStatus(status)),
            Err(e) => Some(SyncError::from(e)),
        };

        let Some(err) = failure else {
            self.finish(ctx, kind, RefreshOutcome::Success);
            return;
        };

        if !err.is_retryable() {
            if err == SyncError::LedgerStatus(LedgerStatus::InvalidTokens) {
                ctx.emit(EngineEvent::UserMessage(UserMessage::new(
                    MessageKey::InvalidTokens,
                )));
            }
            self.finish(ctx, kind, RefreshOutcome::Failure(err));
            return;
        }

        let Some(current) = self.in_flight.get_mut(&kind) else {
            return;
        };

        if current.attempt >= current.policy.max_attempts {
            let attempts = current.attempt;
            self.finish(
                ctx,
                kind,
                RefreshOutcome::Failure(SyncError::RetriesExhausted {
                    attempts,
                    last: Box::new(err),
                }),
            );
            return;
        }

        // Publish whatever the round-trip staged before waiting.
        if ctx.staging.is_dirty() {
            ctx.commit();
        }

        let delay = current.backoff.next_backoff().unwrap_or(Duration::ZERO);
        debug!(
            %kind,
            attempt = current.attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Refresh attempt failed, retrying"
        );

        let commands = ctx.commands.clone();
        current.task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            commands.send(Command::RefreshRetryDue { kind, op });
        });
    }

    /// Issues the next attempt once its backoff timer has fired.
    pub fn on_retry_due(&mut self, ctx: &mut EngineContext, kind: RefreshKind, op: Uuid) {
        let Some(current) = self.in_flight.get_mut(&kind) else {
            return;
        };
        if current.op != op {
            return;
        }

        current.attempt += 1;
        current.task = spawn_attempt(ctx, kind, op);
    }

    fn finish(&mut self, ctx: &mut EngineContext, kind: RefreshKind, outcome: RefreshOutcome) {
        let Some(done) = self.in_flight.remove(&kind) else {
            return;
        };

        ctx.staging.set_refresh_pending(self.any_in_flight());
        ctx.commit();

        match &outcome {
            RefreshOutcome::Failure(err) => {
                if matches!(err, SyncError::LedgerStatus(LedgerStatus::InvalidTokens)) {
                    error!(
                        event = "refresh_failed",
                        %kind,
                        attempts = done.attempt,
                        error = %err,
                        "Refresh rejected, tokens are invalid"
                    );
                } else {
                    warn!(
                        event = "refresh_failed",
                        %kind,
                        attempts = done.attempt,
                        error = %err,
                        "Refresh failed"
                    );
                }
            }
            _ => info!(
                event = "refresh_succeeded",
                %kind,
                attempts = done.attempt,
                "Refresh succeeded"
            ),
        }

        ctx.emit(EngineEvent::Refresh {
            kind,
            outcome: outcome.clone(),
        });
        if let Some(reply) = done.reply {
            let _ = reply.send(outcome);
        }
    }
}

fn spawn_attempt(ctx: &EngineContext, kind: RefreshKind, op: Uuid) -> JoinHandle<()> {
    let ledger = ctx.ledger.clone();
    let classes = ctx.refresh_classes();
    let commands = ctx.commands.clone();

    tokio::spawn(async move {
        let result = ledger.refresh_state(&classes).await;
        commands.send(Command::RefreshAttemptDone { kind, op, result });
    })
}
