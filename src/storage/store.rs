// Echoir - Music Catalog Downloader
// Copyright (C) 2025 Echoir contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Durable download state store
//!
//! `DownloadStore` is the single source of truth for download records. It
//! wraps the SQLite queries with two guarantees the raw pool doesn't give:
//!
//! - **Per-id write ordering**: each mutation runs under that id's async
//!   lock, and the feed republish happens before the lock is released.
//!   Readers therefore observe status/progress changes for one download in
//!   issue order. Unrelated ids stay fully parallel.
//! - **Live queries**: every mutation pushes fresh `active`/`history`
//!   snapshots to open subscriptions (see `live.rs`).

use crate::error::{ErrorKind, Result};
use crate::storage::database::Database;
use crate::storage::live::DownloadFeeds;
use crate::storage::models::{Download, DownloadStatus};
use crate::storage::queries;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::debug;

pub struct DownloadStore {
    db: Database,
    feeds: DownloadFeeds,
    /// One mutation lock per download id; fine-grained so unrelated
    /// downloads never contend
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DownloadStore {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            feeds: DownloadFeeds::new(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Save a new download record (status QUEUED)
    pub async fn save(&self, download: &Download) -> Result<()> {
        let lock = self.lock_for(&download.id).await;
        let _guard = lock.lock().await;

        queries::insert_download(self.db.pool(), download).await?;
        self.republish().await?;
        debug!(id = %download.id, track_id = download.track_id, "download saved");
        Ok(())
    }

    /// Update progress percent (monotonic; regressions are ignored)
    pub async fn update_progress(&self, id: &str, percent: i32) -> Result<()> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        queries::update_progress(self.db.pool(), id, percent).await?;
        self.republish().await?;
        Ok(())
    }

    /// Update lifecycle status
    pub async fn update_status(&self, id: &str, status: DownloadStatus) -> Result<()> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        queries::update_status(self.db.pool(), id, status).await?;
        self.republish().await?;
        debug!(id, status = status.as_str(), "status updated");
        Ok(())
    }

    /// Mark failed with category and message
    pub async fn record_failure(&self, id: &str, kind: ErrorKind, message: &str) -> Result<()> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        queries::record_failure(self.db.pool(), id, kind, message).await?;
        self.republish().await?;
        debug!(id, kind = kind.as_str(), message, "failure recorded");
        Ok(())
    }

    /// Record the finalized path; also transitions the record to COMPLETED
    /// in the same statement so `file_path` is non-null iff COMPLETED.
    pub async fn update_file_path(&self, id: &str, file_path: &str) -> Result<()> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        queries::set_file_path(self.db.pool(), id, file_path).await?;
        self.republish().await?;
        Ok(())
    }

    /// Delete a record, optionally removing the completed file from disk
    pub async fn delete(&self, download: &Download, remove_file: bool) -> Result<()> {
        let lock = self.lock_for(&download.id).await;
        {
            let _guard = lock.lock().await;

            if remove_file {
                if let Some(path) = &download.file_path {
                    if let Err(e) = tokio::fs::remove_file(path).await {
                        // Record removal still proceeds when the artifact is
                        // already gone
                        debug!(id = %download.id, error = %e, "artifact removal skipped");
                    }
                }
            }

            queries::delete_download(self.db.pool(), &download.id).await?;
            self.republish().await?;
        }

        self.locks.lock().await.remove(&download.id);
        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<Download>> {
        queries::find_by_id(self.db.pool(), id).await
    }

    pub async fn get_by_track_id(&self, track_id: i64) -> Result<Vec<Download>> {
        queries::find_by_track_id(self.db.pool(), track_id).await
    }

    pub async fn get_by_album_id(&self, album_id: i64) -> Result<Vec<Download>> {
        queries::find_by_album_id(self.db.pool(), album_id).await
    }

    /// Reset records interrupted by a process restart back to QUEUED.
    ///
    /// Call once at startup, before any new `process_download` runs.
    pub async fn requeue_interrupted(&self) -> Result<u64> {
        let reset = queries::requeue_interrupted(self.db.pool()).await?;
        if reset > 0 {
            self.republish().await?;
            debug!(reset, "interrupted downloads requeued");
        }
        Ok(reset)
    }

    /// Live view of non-terminal records, ordered by creation time
    pub fn active_downloads(&self) -> watch::Receiver<Vec<Download>> {
        self.feeds.active()
    }

    /// Live view of all records, most recent first
    pub fn download_history(&self) -> watch::Receiver<Vec<Download>> {
        self.feeds.history()
    }

    /// Prime the feeds from the database, e.g. after startup
    pub async fn refresh_feeds(&self) -> Result<()> {
        self.republish().await
    }

    async fn republish(&self) -> Result<()> {
        let active = queries::list_active(self.db.pool()).await?;
        let history = queries::list_history(self.db.pool()).await?;
        self.feeds.publish(active, history);
        Ok(())
    }

    async fn lock_for(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::Quality;

    async fn store() -> DownloadStore {
        DownloadStore::new(Database::new_in_memory().await.unwrap())
    }

    fn sample(track_id: i64) -> Download {
        Download::new(
            track_id,
            Some(50),
            format!("Track {}", track_id),
            "Artist".to_string(),
            Some("Album".to_string()),
            None,
            180,
            false,
            Quality::Lossless,
            false,
            false,
        )
    }

    #[tokio::test]
    async fn test_save_publishes_to_open_subscription() {
        let store = store().await;
        let mut active = store.active_downloads();

        let download = sample(1);
        store.save(&download).await.unwrap();

        active.changed().await.unwrap();
        let snapshot = active.borrow_and_update().clone();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, download.id);
    }

    #[tokio::test]
    async fn test_terminal_record_leaves_active_feed() {
        let store = store().await;
        let download = sample(1);
        store.save(&download).await.unwrap();

        store
            .record_failure(&download.id, ErrorKind::Transfer, "reset")
            .await
            .unwrap();

        let active = store.active_downloads();
        assert!(active.borrow().is_empty());

        let history = store.download_history();
        assert_eq!(history.borrow().len(), 1);
        assert_eq!(history.borrow()[0].status, DownloadStatus::Failed);
    }

    #[tokio::test]
    async fn test_status_sequence_is_ordered() {
        let store = store().await;
        let download = sample(1);
        store.save(&download).await.unwrap();

        store
            .update_status(&download.id, DownloadStatus::Downloading)
            .await
            .unwrap();
        store
            .update_status(&download.id, DownloadStatus::Merging)
            .await
            .unwrap();
        store
            .update_file_path(&download.id, "/music/Album/Track 1.flac")
            .await
            .unwrap();

        let found = store.get_by_id(&download.id).await.unwrap().unwrap();
        assert_eq!(found.status, DownloadStatus::Completed);
        assert_eq!(found.progress, 100);
    }

    #[tokio::test]
    async fn test_delete_removes_record() {
        let store = store().await;
        let download = sample(1);
        store.save(&download).await.unwrap();

        store.delete(&download, false).await.unwrap();

        assert!(store.get_by_id(&download.id).await.unwrap().is_none());
        assert!(store.download_history().borrow().is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("track.flac");
        tokio::fs::write(&file, b"audio").await.unwrap();

        let store = store().await;
        let mut download = sample(1);
        store.save(&download).await.unwrap();
        store
            .update_file_path(&download.id, file.to_str().unwrap())
            .await
            .unwrap();
        download = store.get_by_id(&download.id).await.unwrap().unwrap();

        store.delete(&download, true).await.unwrap();
        assert!(!file.exists());
    }

    #[tokio::test]
    async fn test_concurrent_updates_stay_consistent() {
        let store = Arc::new(store().await);
        let download = sample(1);
        store.save(&download).await.unwrap();
        store
            .update_status(&download.id, DownloadStatus::Downloading)
            .await
            .unwrap();

        let mut handles = Vec::new();
        for pct in [10, 30, 20, 50, 40] {
            let store = Arc::clone(&store);
            let id = download.id.clone();
            handles.push(tokio::spawn(async move {
                store.update_progress(&id, pct).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let found = store.get_by_id(&download.id).await.unwrap().unwrap();
        // Monotonic: final value is the max of all writes regardless of order
        assert_eq!(found.progress, 50);
    }
}
