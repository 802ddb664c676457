//! # Model Publisher
//!
//! Fans committed snapshots out to subscribers, plus one derived signal
//! (the reward-activity token) that is only emitted when it changes.
//!
//! ## Replay Channel
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   publish(v) ──► lock ──► revision += 1, latest = v                     │
//! │                            │                                            │
//! │                            └──► every subscriber queue (unbounded)      │
//! │                                                                         │
//! │   subscribe() ──► lock ──► new queue, seeded with latest                │
//! │                            └──► registered for later publishes          │
//! │                                                                         │
//! │   Seeding and registering happen under the same lock as publish, so a   │
//! │   subscriber sees the latest value and then every later one, with no    │
//! │   gaps and no duplicates.                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;

use boost_core::ClientModel;

/// A published value with its position in the publish order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published<T> {
    pub revision: u64,
    pub value: T,
}

// =============================================================================
// Replay Channel
// =============================================================================

struct Shared<T> {
    latest: Option<Published<T>>,
    revision: u64,
    subscribers: Vec<mpsc::UnboundedSender<Published<T>>>,
    /// Set once the publisher is dropped; later subscribers get the latest
    /// value and then end.
    closed: bool,
}

fn lock<T>(shared: &Mutex<Shared<T>>) -> MutexGuard<'_, Shared<T>> {
    // Every mutation under the lock is a single step, so poisoned data is
    // still consistent.
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

struct ReplayChannel<T> {
    shared: Arc<Mutex<Shared<T>>>,
}

impl<T: Clone> ReplayChannel<T> {
    fn new() -> Self {
        ReplayChannel {
            shared: Arc::new(Mutex::new(Shared {
                latest: None,
                revision: 0,
                subscribers: Vec::new(),
                closed: false,
            })),
        }
    }

    fn publish(&mut self, value: T) -> u64 {
        let mut shared = lock(&self.shared);
        shared.revision += 1;
        let published = Published {
            revision: shared.revision,
            value,
        };
        shared
            .subscribers
            .retain(|tx| tx.send(published.clone()).is_ok());
        shared.latest = Some(published);
        shared.revision
    }

    fn source(&self) -> ReplaySource<T> {
        ReplaySource {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Drop for ReplayChannel<T> {
    fn drop(&mut self) {
        let mut shared = lock(&self.shared);
        shared.closed = true;
        // Dropping the senders ends each subscription once it is drained.
        shared.subscribers.clear();
    }
}

/// Cloneable entry point for creating subscriptions.
pub struct ReplaySource<T> {
    shared: Arc<Mutex<Shared<T>>>,
}

impl<T> Clone for ReplaySource<T> {
    fn clone(&self) -> Self {
        ReplaySource {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone> ReplaySource<T> {
    /// The most recently published value.
    pub fn latest(&self) -> Option<Published<T>> {
        lock(&self.shared).latest.clone()
    }

    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut shared = lock(&self.shared);
        if let Some(latest) = &shared.latest {
            let _ = tx.send(latest.clone());
        }
        if !shared.closed {
            shared.subscribers.push(tx);
        }
        Subscription { rx }
    }
}

// =============================================================================
// Subscription
// =============================================================================

/// Ordered view of a replay channel: the latest value first, then every
/// later one. Nothing is dropped for a slow reader.
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<Published<T>>,
}

impl<T> Subscription<T> {
    /// Waits for the next value. Returns `None` once the publisher is gone
    /// and everything it sent has been read.
    pub async fn next(&mut self) -> Option<Published<T>> {
        self.rx.recv().await
    }

    /// Returns the next value if one is ready.
    pub fn try_next(&mut self) -> Option<Published<T>> {
        self.rx.try_recv().ok()
    }
}

// =============================================================================
// Model Publisher
// =============================================================================

/// Computes the reward-activity token on each commit.
pub type RewardTokenFn = Box<dyn Fn(&ClientModel) -> Option<String> + Send + Sync>;

pub struct ModelPublisher {
    models: ReplayChannel<Arc<ClientModel>>,
    reward_token: ReplayChannel<Option<String>>,
    last_token: Option<Option<String>>,
    derive_token: RewardTokenFn,
}

impl ModelPublisher {
    pub fn new(derive_token: RewardTokenFn) -> Self {
        ModelPublisher {
            models: ReplayChannel::new(),
            reward_token: ReplayChannel::new(),
            last_token: None,
            derive_token,
        }
    }

    /// Publishes a committed snapshot and, if it changed, the reward token.
    ///
    /// Returns the snapshot's revision.
    pub fn publish(&mut self, model: Arc<ClientModel>) -> u64 {
        let token = (self.derive_token)(&model);
        let revision = self.models.publish(model);

        if self.last_token.as_ref() != Some(&token) {
            debug!(revision, has_token = token.is_some(), "Reward token changed");
            self.last_token = Some(token.clone());
            self.reward_token.publish(token);
        }

        revision
    }

    pub fn models(&self) -> ReplaySource<Arc<ClientModel>> {
        self.models.source()
    }

    pub fn reward_token(&self) -> ReplaySource<Option<String>> {
        self.reward_token.source()
    }
}
