//! Pending orders awaiting their Webpay callback.
//!
//! Checkout stores an [`OrderSnapshot`] under the gateway token; the return
//! handler takes it back out exactly once. Entries that never see a callback
//! (shopper closed the tab, card declined and never returned) expire after the
//! configured TTL, and the store is capacity bounded so abandoned checkouts
//! cannot grow memory without limit.
//!
//! The store lives in process memory: a restart forgets every pending order,
//! which only costs the confirmation email for payments in flight.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use moka::notification::RemovalCause;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};
use webpay_checkout_core::OrderSnapshot;

use crate::config::PendingOrderConfig;

/// In-memory pending-order store keyed by gateway token.
///
/// Cheap to clone; clones share the same entries. Operations on a single key
/// are linearizable, so two concurrent `take` calls for the same token return
/// the snapshot to exactly one caller.
#[derive(Clone)]
pub struct PendingOrders {
    cache: Cache<String, OrderSnapshot>,
    sweep_interval: Duration,
}

impl PendingOrders {
    /// Create an empty store with the given limits.
    #[must_use]
    pub fn new(config: &PendingOrderConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.ttl)
            .eviction_listener(log_eviction)
            .build();

        Self {
            cache,
            sweep_interval: config.sweep_interval,
        }
    }

    /// Store a snapshot, replacing any previous one under the same key.
    #[instrument(skip(self, snapshot), fields(buy_order = %snapshot.buy_order))]
    pub async fn put(&self, key: &str, snapshot: OrderSnapshot) {
        self.cache.insert(key.to_string(), snapshot).await;
        debug!("Pending order stored");
    }

    /// Look up a snapshot without removing it.
    pub async fn get(&self, key: &str) -> Option<OrderSnapshot> {
        self.cache.get(key).await
    }

    /// Remove a snapshot. Removing an absent key is a no-op.
    pub async fn delete(&self, key: &str) {
        self.cache.invalidate(key).await;
    }

    /// Atomically remove and return a snapshot.
    ///
    /// Returns `None` when the key was never stored, already taken, deleted,
    /// or expired.
    pub async fn take(&self, key: &str) -> Option<OrderSnapshot> {
        self.cache.remove(key).await
    }

    /// Number of live entries, after flushing pending maintenance.
    pub async fn len(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    /// Whether no orders are waiting for a callback.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Evict expired entries now.
    pub async fn sweep(&self) {
        self.cache.run_pending_tasks().await;
    }

    /// Run [`sweep`](Self::sweep) periodically in the background so abandoned
    /// checkouts are evicted even when no requests arrive.
    #[must_use]
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(store.sweep_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                store.sweep().await;
            }
        })
    }
}

fn log_eviction(key: Arc<String>, snapshot: OrderSnapshot, cause: RemovalCause) {
    match cause {
        RemovalCause::Expired => warn!(
            token = %key,
            buy_order = %snapshot.buy_order,
            "Pending order expired without a Webpay callback"
        ),
        RemovalCause::Size => warn!(
            token = %key,
            buy_order = %snapshot.buy_order,
            "Pending order evicted, store at capacity"
        ),
        RemovalCause::Explicit | RemovalCause::Replaced => {}
    }
}
