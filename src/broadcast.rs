//! Publish/subscribe distribution of bracket snapshots.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tracing::error;

use crate::types::Bracket;

type Callback = Arc<dyn Fn(&Bracket) + Send + Sync + 'static>;

/// Per-tournament registry of snapshot subscribers. Delivery is synchronous
/// but never holds the registry lock while invoking callbacks, so a
/// subscriber may unsubscribe (itself or others) from inside its callback.
#[derive(Default)]
pub struct UpdateBroadcaster {
    subscribers: Mutex<HashMap<String, Vec<(u64, Callback)>>>,
    next_id: AtomicU64,
}

impl UpdateBroadcaster {
    pub fn new() -> Arc<Self> {
        Arc::new(UpdateBroadcaster::default())
    }

    pub fn subscribe(
        self: &Arc<Self>,
        tournament_id: &str,
        callback: impl Fn(&Bracket) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers
            .entry(tournament_id.to_string())
            .or_default()
            .push((id, Arc::new(callback)));
        Subscription {
            broadcaster: Arc::downgrade(self),
            tournament_id: tournament_id.to_string(),
            id,
        }
    }

    /// Delivers a snapshot to every current subscriber. A panicking
    /// subscriber is logged and skipped so one broken consumer cannot block
    /// the rest.
    pub fn publish(&self, tournament_id: &str, bracket: &Bracket) {
        let callbacks: Vec<(u64, Callback)> = {
            let subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
            subscribers.get(tournament_id).cloned().unwrap_or_default()
        };
        for (id, callback) in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(bracket))).is_err() {
                error!(tournament_id, subscriber = id, "bracket subscriber panicked, skipping it");
            }
        }
    }

    pub fn subscriber_count(&self, tournament_id: &str) -> usize {
        let subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.get(tournament_id).map_or(0, Vec::len)
    }

    fn remove(&self, tournament_id: &str, id: u64) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(list) = subscribers.get_mut(tournament_id) {
            list.retain(|(subscriber_id, _)| *subscriber_id != id);
            if list.is_empty() {
                subscribers.remove(tournament_id);
            }
        }
    }
}

/// Handle returned by `subscribe`. Dropping it unsubscribes.
pub struct Subscription {
    broadcaster: Weak<UpdateBroadcaster>,
    tournament_id: String,
    id: u64,
}

impl Subscription {
    /// Idempotent, and safe to call from inside a subscriber callback.
    pub fn unsubscribe(&self) {
        if let Some(broadcaster) = self.broadcaster.upgrade() {
            broadcaster.remove(&self.tournament_id, self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
#[path = "broadcast_tests.rs"]
mod broadcast_tests;
