//! Async live feed over the update broadcaster.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::interval;

use crate::broadcast::Subscription;
use crate::error::Result;
use crate::lifecycle::TournamentEngine;
use crate::types::Bracket;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum LiveUpdate {
    Snapshot { bracket: Bracket },
    KeepAlive,
}

/// One consumer's end of a tournament's live stream. Dropping the feed
/// unsubscribes and stops the keep-alive task.
pub struct LiveFeed {
    receiver: mpsc::UnboundedReceiver<LiveUpdate>,
    subscription: Subscription,
    keepalive: JoinHandle<()>,
}

impl LiveFeed {
    pub async fn recv(&mut self) -> Option<LiveUpdate> {
        self.receiver.recv().await
    }

    pub fn unsubscribe(&self) {
        self.subscription.unsubscribe();
    }
}

impl Drop for LiveFeed {
    fn drop(&mut self) {
        self.keepalive.abort();
        self.subscription.unsubscribe();
    }
}

impl TournamentEngine {
    /// Opens a live feed for one tournament: the current snapshot first,
    /// then a snapshot per committed mutation, with keep-alives every
    /// `period` in between. Must be called within a tokio runtime.
    pub fn subscribe_live(&self, tournament_id: &str, period: Duration) -> Result<LiveFeed> {
        let (sender, receiver) = mpsc::unbounded_channel();

        // Subscribe before the initial read: a commit landing in between is
        // then delivered twice, never missed. An error below drops the
        // subscription again.
        let update_sender = sender.clone();
        let subscription = self.broadcaster().subscribe(tournament_id, move |bracket| {
            let _ = update_sender.send(LiveUpdate::Snapshot {
                bracket: bracket.clone(),
            });
        });

        let snapshot = self.get_bracket(tournament_id)?;
        // Channel is unbounded and the receiver is alive, so this cannot fail.
        let _ = sender.send(LiveUpdate::Snapshot { bracket: snapshot });

        let keepalive = tokio::spawn(async move {
            let mut ticker = interval(period);
            // The first tick fires immediately; the initial snapshot already
            // covers it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if sender.send(LiveUpdate::KeepAlive).is_err() {
                    break;
                }
            }
        });

        Ok(LiveFeed {
            receiver,
            subscription,
            keepalive,
        })
    }
}

#[cfg(test)]
#[path = "live_tests.rs"]
mod live_tests;
