//! Scripted ledger and helpers for engine tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;
use tokio::time::Instant;
use url::Url;

use boost_core::{
    Authorization, ClientModel, Credits, LedgerStatus, Purchase, PurchasePrice,
    SignedAuthorization, TokenKind,
};

use crate::config::BoostConfig;
use crate::coordinator::EngineEvent;
use crate::ledger::{Ledger, LedgerError, PurchaseResponse};
use crate::publisher::Subscription;

pub const CLASS: &str = "speed-boost";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Refresh retries 3 times at 1s/4s; balance polls 3 times every 2s.
pub fn test_config() -> BoostConfig {
    let mut config = BoostConfig::default();
    config.refresh.max_attempts = 3;
    config.refresh.initial_delay_ms = 1000;
    config.refresh.multiplier = 4.0;
    config.refresh.max_delay_secs = 60;
    config.balance_poll.max_attempts = 3;
    config.balance_poll.interval_ms = 2000;
    config
}

pub fn price(distinguisher: &str, units: i64) -> PurchasePrice {
    PurchasePrice {
        transaction_class: CLASS.into(),
        distinguisher: distinguisher.into(),
        price: Credits::from_units(units),
    }
}

/// A purchase carrying a signed authorization with id `auth_id`.
pub fn signed_purchase(id: &str, auth_id: &str, distinguisher: &str) -> Purchase {
    let expires = Utc::now() + chrono::Duration::hours(1);
    let authorization = SignedAuthorization::encode(
        &Authorization {
            id: auth_id.into(),
            access_type: CLASS.into(),
            expires,
        },
        "test-key",
        "test-signature",
    )
    .unwrap();

    Purchase {
        id: id.into(),
        transaction_class: CLASS.into(),
        distinguisher: distinguisher.into(),
        authorization: Some(authorization),
        expiry: Some(expires),
    }
}

// =============================================================================
// Scripted Steps
// =============================================================================

pub struct RefreshStep {
    delay: Duration,
    result: Result<LedgerStatus, LedgerError>,
    balance_after: Option<Credits>,
}

impl RefreshStep {
    pub fn status(status: LedgerStatus) -> Self {
        RefreshStep {
            delay: Duration::ZERO,
            result: Ok(status),
            balance_after: None,
        }
    }

    pub fn error(message: &str) -> Self {
        RefreshStep {
            delay: Duration::ZERO,
            result: Err(LedgerError::Network(message.into())),
            balance_after: None,
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sets the ledger balance when the step completes.
    pub fn with_balance(mut self, units: i64) -> Self {
        self.balance_after = Some(Credits::from_units(units));
        self
    }
}

pub enum PurchaseReply {
    /// Builds a purchase from the request and stores it in the ledger.
    Success,
    /// Like `Success`, with the purchase's authorization replaced.
    SuccessWithAuthorization(Option<SignedAuthorization>),
    Status(LedgerStatus),
    Error(LedgerError),
}

pub struct PurchaseStep {
    delay: Duration,
    reply: PurchaseReply,
    prices_after: Option<Vec<PurchasePrice>>,
}

impl PurchaseStep {
    pub fn success() -> Self {
        Self::reply(PurchaseReply::Success)
    }

    /// Succeeds with `authorization` in place of a well-formed one.
    pub fn success_with_authorization(authorization: Option<SignedAuthorization>) -> Self {
        Self::reply(PurchaseReply::SuccessWithAuthorization(authorization))
    }

    pub fn status(status: LedgerStatus) -> Self {
        Self::reply(PurchaseReply::Status(status))
    }

    pub fn error(message: &str) -> Self {
        Self::reply(PurchaseReply::Error(LedgerError::Network(message.into())))
    }

    fn reply(reply: PurchaseReply) -> Self {
        PurchaseStep {
            delay: Duration::ZERO,
            reply,
            prices_after: None,
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Replaces the ledger's prices when the step completes.
    pub fn with_prices(mut self, prices: Vec<PurchasePrice>) -> Self {
        self.prices_after = Some(prices);
        self
    }
}

// =============================================================================
// Scripted Ledger
// =============================================================================

#[derive(Default)]
struct LedgerState {
    balance: Credits,
    token_kinds: Vec<TokenKind>,
    prices: Vec<PurchasePrice>,
    purchases: Vec<Purchase>,
    reward_data: Option<String>,
    refresh_script: VecDeque<RefreshStep>,
    purchase_script: VecDeque<PurchaseStep>,
    refresh_calls: Vec<Instant>,
    purchase_calls: Vec<String>,
    removed: Vec<String>,
    next_purchase: u32,
}

/// In-memory ledger answering network calls from a script.
///
/// Unscripted refreshes succeed immediately; unscripted purchases fail with
/// a network error.
#[derive(Default)]
pub struct ScriptedLedger {
    state: Mutex<LedgerState>,
}

impl ScriptedLedger {
    pub fn new() -> Self {
        let ledger = Self::default();
        ledger.state.lock().unwrap().token_kinds = vec![TokenKind::Earner, TokenKind::Spender];
        ledger
    }

    pub fn with_balance(self, units: i64) -> Self {
        self.state.lock().unwrap().balance = Credits::from_units(units);
        self
    }

    pub fn with_prices(self, prices: Vec<PurchasePrice>) -> Self {
        self.state.lock().unwrap().prices = prices;
        self
    }

    pub fn with_purchases(self, purchases: Vec<Purchase>) -> Self {
        self.state.lock().unwrap().purchases = purchases;
        self
    }

    pub fn set_reward_data(&self, data: Option<&str>) {
        self.state.lock().unwrap().reward_data = data.map(str::to_string);
    }

    pub fn script_refresh(&self, step: RefreshStep) {
        self.state.lock().unwrap().refresh_script.push_back(step);
    }

    pub fn script_purchase(&self, step: PurchaseStep) {
        self.state.lock().unwrap().purchase_script.push_back(step);
    }

    pub fn refresh_calls(&self) -> Vec<Instant> {
        self.state.lock().unwrap().refresh_calls.clone()
    }

    pub fn purchase_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().purchase_calls.clone()
    }

    pub fn removed_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().removed.clone()
    }
}

#[async_trait]
impl Ledger for ScriptedLedger {
    fn balance(&self) -> Credits {
        self.state.lock().unwrap().balance
    }

    fn valid_token_kinds(&self) -> Vec<TokenKind> {
        self.state.lock().unwrap().token_kinds.clone()
    }

    fn purchase_prices(&self) -> Vec<PurchasePrice> {
        self.state.lock().unwrap().prices.clone()
    }

    fn purchases(&self) -> Vec<Purchase> {
        self.state.lock().unwrap().purchases.clone()
    }

    fn remove_purchases(&self, ids: &[String]) -> Result<(), LedgerError> {
        let mut state = self.state.lock().unwrap();
        state.purchases.retain(|p| !ids.contains(&p.id));
        state.removed.extend(ids.iter().cloned());
        Ok(())
    }

    fn rewarded_activity_data(&self) -> Result<Option<String>, LedgerError> {
        Ok(self.state.lock().unwrap().reward_data.clone())
    }

    async fn refresh_state(
        &self,
        _transaction_classes: &[String],
    ) -> Result<LedgerStatus, LedgerError> {
        let step = {
            let mut state = self.state.lock().unwrap();
            state.refresh_calls.push(Instant::now());
            state.refresh_script.pop_front()
        };
        let Some(step) = step else {
            return Ok(LedgerStatus::Success);
        };

        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }

        if let Some(balance) = step.balance_after {
            self.state.lock().unwrap().balance = balance;
        }
        step.result
    }

    async fn new_expiring_purchase_transaction(
        &self,
        transaction_class: &str,
        distinguisher: &str,
        _expected_price: Credits,
    ) -> Result<PurchaseResponse, LedgerError> {
        let step = {
            let mut state = self.state.lock().unwrap();
            state.purchase_calls.push(distinguisher.to_string());
            state.purchase_script.pop_front()
        };
        let Some(step) = step else {
            return Err(LedgerError::Network("unscripted purchase".into()));
        };

        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }

        let mut state = self.state.lock().unwrap();
        if let Some(prices) = step.prices_after {
            state.prices = prices;
        }

        let authorization = match step.reply {
            PurchaseReply::Success => None,
            PurchaseReply::SuccessWithAuthorization(authorization) => Some(authorization),
            PurchaseReply::Status(status) => return Ok(PurchaseResponse::failed(status)),
            PurchaseReply::Error(e) => return Err(e),
        };

        state.next_purchase += 1;
        let n = state.next_purchase;
        let mut purchase =
            signed_purchase(&format!("purchase-{n}"), &format!("auth-{n}"), distinguisher);
        purchase.transaction_class = transaction_class.to_string();
        if let Some(replacement) = authorization {
            purchase.authorization = replacement;
        }
        state.purchases.push(purchase.clone());
        Ok(PurchaseResponse::success(purchase))
    }

    async fn modify_landing_page(&self, url: &Url) -> Result<Url, LedgerError> {
        if url.host_str() == Some("unreachable.test") {
            return Err(LedgerError::Library("no session".into()));
        }
        let mut modified = url.clone();
        modified.query_pairs_mut().append_pair("psicash", "token");
        Ok(modified)
    }
}

// =============================================================================
// Waiting Helpers
// =============================================================================

/// Reads models until one satisfies `pred`.
pub async fn wait_for_model(
    models: &mut Subscription<Arc<ClientModel>>,
    pred: impl Fn(&ClientModel) -> bool,
) -> Arc<ClientModel> {
    loop {
        let published = models.next().await.expect("publisher dropped");
        if pred(&published.value) {
            return published.value;
        }
    }
}

/// Reads events until one satisfies `pred`.
pub async fn wait_for_event(
    events: &mut broadcast::Receiver<EngineEvent>,
    pred: impl Fn(&EngineEvent) -> bool,
) -> EngineEvent {
    loop {
        let event = events.recv().await.expect("event channel closed");
        if pred(&event) {
            return event;
        }
    }
}

/// Every event already queued.
pub fn drain_events(events: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}
