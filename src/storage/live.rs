//! Reactive query feeds
//!
//! The UI observes `active_downloads()` and `download_history()` as live
//! collections. Every store mutation republishes both result sets into
//! `watch` channels, so subscribers see each change pushed to them instead
//! of polling. A `watch` receiver always holds the latest snapshot, which
//! is exactly the collection-of-records semantics the UI needs.

use crate::storage::models::Download;
use tokio::sync::watch;

/// Publisher side of the live queries.
///
/// Owned by the `DownloadStore`; republished after every mutation while the
/// mutating id's lock is held, so per-id ordering of snapshots follows
/// mutation order.
#[derive(Debug)]
pub struct DownloadFeeds {
    active_tx: watch::Sender<Vec<Download>>,
    history_tx: watch::Sender<Vec<Download>>,
}

impl DownloadFeeds {
    pub fn new() -> Self {
        let (active_tx, _) = watch::channel(Vec::new());
        let (history_tx, _) = watch::channel(Vec::new());
        Self {
            active_tx,
            history_tx,
        }
    }

    /// Non-terminal records in queue order, pushed on every change
    pub fn active(&self) -> watch::Receiver<Vec<Download>> {
        self.active_tx.subscribe()
    }

    /// All records most-recent-first, pushed on every change
    pub fn history(&self) -> watch::Receiver<Vec<Download>> {
        self.history_tx.subscribe()
    }

    /// Push fresh snapshots to all subscribers.
    ///
    /// `send_replace` never fails when there are no receivers; a feed with
    /// no open subscriptions just keeps the latest snapshot for the next one.
    pub fn publish(&self, active: Vec<Download>, history: Vec<Download>) {
        self.active_tx.send_replace(active);
        self.history_tx.send_replace(history);
    }
}

impl Default for DownloadFeeds {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::Quality;

    fn sample(track_id: i64) -> Download {
        Download::new(
            track_id,
            None,
            "Track".to_string(),
            "Artist".to_string(),
            None,
            None,
            100,
            false,
            Quality::High,
            false,
            false,
        )
    }

    #[tokio::test]
    async fn test_subscribers_see_published_snapshots() {
        let feeds = DownloadFeeds::new();
        let mut active = feeds.active();

        assert!(active.borrow().is_empty());

        feeds.publish(vec![sample(1)], vec![sample(1)]);

        active.changed().await.unwrap();
        assert_eq!(active.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_latest() {
        let feeds = DownloadFeeds::new();
        feeds.publish(vec![sample(1), sample(2)], vec![sample(1)]);

        // Subscribing after the publish still observes the current snapshot
        let active = feeds.active();
        assert_eq!(active.borrow().len(), 2);
    }
}
