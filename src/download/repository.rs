//! Download orchestration
//!
//! `DownloadRepository` is the single entry point the app shell invokes. A
//! `process_download` call drives one attempt through its state machine:
//!
//! ```text
//! QUEUED --resolve ok--> DOWNLOADING --transfer ok--> MERGING --finalize ok--> COMPLETED
//!     \--resolve err--> FAILED   \--transfer err--> FAILED   \--finalize err--> FAILED
//! ```
//!
//! The resolver runs before the DOWNLOADING transition is persisted, so a
//! quality-unavailable failure goes straight QUEUED → FAILED with no
//! intermediate state ever visible to subscribers. Transitions are
//! one-directional and serialized per id by the store.
//!
//! Concurrency: every run holds a semaphore permit, bounding parallel
//! downloads. `spawn_download` runs an attempt as a managed task with a
//! cancellation channel; `cancel` aborts the in-flight stage, cleans up
//! staging files, and records FAILED with a cancellation reason (or leaves
//! the record QUEUED when nothing was persisted yet).
//!
//! Progress: the transfer engine posts percent values into a bounded
//! channel; a relay task forwards each one to the store and to the
//! caller-supplied sink, keeping arbitrary sink code off the stream loop.

use crate::api::client::CatalogClient;
use crate::api::playback::{resolve_playback, PlaybackRequest, PlaybackResponse};
use crate::audio::{PostProcessor, TrackMetadata};
use crate::download::progress::ProgressSink;
use crate::download::transfer::{StreamSource, TransferConfig, TransferEngine};
use crate::error::{EchoirError, Result};
use crate::file::paths;
use crate::storage::models::{Download, DownloadStatus, Quality};
use crate::storage::store::DownloadStore;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, RwLock, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Buffered progress updates between engine and relay
const PROGRESS_CHANNEL_CAPACITY: usize = 32;

/// Bounded wait for a cancelled worker to wind down
const CANCEL_GRACE: Duration = Duration::from_secs(2);

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    /// Root of the music library; album directories are created beneath it
    pub library_root: PathBuf,

    /// Scratch space for in-flight transfers, one subdirectory per attempt
    pub staging_root: PathBuf,

    /// Maximum concurrently running downloads
    pub max_concurrent: usize,

    /// Transfer engine settings (retry bound, per-attempt timeout)
    pub transfer: TransferConfig,
}

impl RepositoryConfig {
    pub fn new(library_root: PathBuf, staging_root: PathBuf) -> Self {
        Self {
            library_root,
            staging_root,
            max_concurrent: 3,
            transfer: TransferConfig::default(),
        }
    }

    pub fn max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn transfer_config(mut self, transfer: TransferConfig) -> Self {
        self.transfer = transfer;
        self
    }
}

/// Managed worker for a spawned download
struct ActiveDownload {
    cancel_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Facade over the download pipeline
pub struct DownloadRepository {
    /// Weak self-reference so `&self` methods can hand workers an owning
    /// handle
    self_ref: Weak<Self>,
    store: Arc<DownloadStore>,
    client: Arc<CatalogClient>,
    engine: TransferEngine,
    post: Arc<dyn PostProcessor>,
    config: RepositoryConfig,
    semaphore: Arc<Semaphore>,
    active: RwLock<HashMap<String, ActiveDownload>>,
}

impl DownloadRepository {
    pub fn new(
        store: Arc<DownloadStore>,
        client: Arc<CatalogClient>,
        post: Arc<dyn PostProcessor>,
        config: RepositoryConfig,
    ) -> Result<Arc<Self>> {
        let engine = TransferEngine::new(config.transfer.clone())?;
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent));

        Ok(Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            store,
            client,
            engine,
            post,
            config,
            semaphore,
            active: RwLock::new(HashMap::new()),
        }))
    }

    // ========================================================================
    // State store pass-through
    // ========================================================================

    pub async fn save_download(&self, download: &Download) -> Result<()> {
        self.store.save(download).await
    }

    pub async fn update_download_progress(&self, download_id: &str, percent: i32) -> Result<()> {
        self.store.update_progress(download_id, percent).await
    }

    pub async fn update_download_status(
        &self,
        download_id: &str,
        status: DownloadStatus,
    ) -> Result<()> {
        self.store.update_status(download_id, status).await
    }

    pub async fn update_download_file_path(&self, download_id: &str, path: &str) -> Result<()> {
        self.store.update_file_path(download_id, path).await
    }

    pub async fn delete_download(&self, download: &Download, remove_file: bool) -> Result<()> {
        self.store.delete(download, remove_file).await
    }

    pub async fn get_download_by_id(&self, download_id: &str) -> Result<Option<Download>> {
        self.store.get_by_id(download_id).await
    }

    pub async fn get_downloads_by_track_id(&self, track_id: i64) -> Result<Vec<Download>> {
        self.store.get_by_track_id(track_id).await
    }

    pub async fn get_downloads_by_album_id(&self, album_id: i64) -> Result<Vec<Download>> {
        self.store.get_by_album_id(album_id).await
    }

    pub fn get_active_downloads(&self) -> tokio::sync::watch::Receiver<Vec<Download>> {
        self.store.active_downloads()
    }

    pub fn get_download_history(&self) -> tokio::sync::watch::Receiver<Vec<Download>> {
        self.store.download_history()
    }

    /// Resolve the playback descriptor without starting a transfer
    pub async fn get_download_info(
        &self,
        request: &PlaybackRequest,
    ) -> Result<(PlaybackResponse, HashMap<String, String>)> {
        resolve_playback(&self.client, request).await
    }

    /// Create (or reuse) the album directory for one album variant
    pub async fn create_album_directory(
        &self,
        album_title: &str,
        explicit: bool,
    ) -> Result<String> {
        let dir =
            paths::create_album_directory(&self.config.library_root, album_title, explicit).await?;
        Ok(dir.to_string_lossy().into_owned())
    }

    // ========================================================================
    // Pipeline
    // ========================================================================

    /// Run one download attempt to a terminal state.
    ///
    /// The record must already be saved with status QUEUED. Issuing a second
    /// call for the same id while one is in flight is a caller error; the
    /// repository does not deduplicate.
    pub async fn process_download(
        &self,
        download_id: &str,
        track_id: i64,
        quality: Quality,
        ac4: bool,
        immersive: bool,
        on_progress: ProgressSink,
    ) -> Result<String> {
        // Held for the whole call so the cancel branch in `run` only ever
        // fires for managed workers
        let (_cancel_tx, mut cancel_rx) = oneshot::channel();
        self.run(
            download_id,
            track_id,
            quality,
            ac4,
            immersive,
            on_progress,
            &mut cancel_rx,
        )
        .await
    }

    /// Run an attempt as a managed background task that `cancel` can abort
    pub async fn spawn_download(
        &self,
        download_id: &str,
        track_id: i64,
        quality: Quality,
        ac4: bool,
        immersive: bool,
        on_progress: ProgressSink,
    ) -> Result<()> {
        let (cancel_tx, mut cancel_rx) = oneshot::channel();
        let repo = self
            .self_ref
            .upgrade()
            .ok_or_else(|| EchoirError::internal("repository dropped"))?;
        let id = download_id.to_string();
        let worker_id = id.clone();

        // The worker waits for its registration before running, so its
        // self-removal can never race the insert below
        let (ready_tx, ready_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let _ = ready_rx.await;

            let result = repo
                .run(
                    &worker_id,
                    track_id,
                    quality,
                    ac4,
                    immersive,
                    on_progress,
                    &mut cancel_rx,
                )
                .await;

            if let Err(e) = result {
                debug!(download_id = %worker_id, error = %e, "download worker finished with error");
            }

            repo.active.write().await.remove(&worker_id);
        });

        self.active
            .write()
            .await
            .insert(id, ActiveDownload { cancel_tx, handle });
        let _ = ready_tx.send(());

        Ok(())
    }

    /// Cancel a spawned download.
    ///
    /// The in-flight stage aborts promptly, staging files are removed, and
    /// the record ends FAILED with a cancellation reason — unless nothing
    /// had been persisted yet, in which case it stays QUEUED.
    pub async fn cancel(&self, download_id: &str) -> Result<()> {
        let entry = self.active.write().await.remove(download_id);

        match entry {
            Some(active) => {
                let _ = active.cancel_tx.send(());
                if tokio::time::timeout(CANCEL_GRACE, active.handle).await.is_err() {
                    warn!(download_id, "cancelled worker did not stop within grace period");
                }
                Ok(())
            }
            None => Err(EchoirError::not_found(format!(
                "active download {}",
                download_id
            ))),
        }
    }

    /// Whether a spawned worker is currently registered for this id
    pub async fn is_active(&self, download_id: &str) -> bool {
        self.active.read().await.contains_key(download_id)
    }

    #[allow(clippy::too_many_arguments)]
    async fn run(
        &self,
        download_id: &str,
        track_id: i64,
        quality: Quality,
        ac4: bool,
        immersive: bool,
        on_progress: ProgressSink,
        cancel_rx: &mut oneshot::Receiver<()>,
    ) -> Result<String> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| EchoirError::internal("download semaphore closed"))?;

        let download = self
            .store
            .get_by_id(download_id)
            .await?
            .ok_or_else(|| EchoirError::not_found(format!("download {}", download_id)))?;

        // Stage 1: resolve. Runs before any persisted transition, so a
        // resolution failure produces QUEUED → FAILED with no DOWNLOADING
        // ever stored, and a cancel here leaves the record untouched.
        let request = PlaybackRequest::new(track_id, quality, ac4, immersive);
        let resolved = tokio::select! {
            r = resolve_playback(&self.client, &request) => r,
            _ = &mut *cancel_rx => Err(EchoirError::Cancelled),
        };

        let (response, headers) = match resolved {
            Ok(pair) => pair,
            Err(EchoirError::Cancelled) => {
                debug!(download_id, "cancelled before any state was persisted");
                return Err(EchoirError::Cancelled);
            }
            Err(e) => {
                self.fail(download_id, &e).await;
                return Err(e);
            }
        };

        let sources: Vec<StreamSource> = response
            .urls
            .iter()
            .enumerate()
            .map(|(i, url)| StreamSource {
                url: url.clone(),
                expected_bytes: response.sizes.get(i).copied().flatten(),
            })
            .collect();

        // Stage 2: transfer
        self.store
            .update_status(download_id, DownloadStatus::Downloading)
            .await?;

        let (progress_tx, mut progress_rx) = mpsc::channel::<i32>(PROGRESS_CHANNEL_CAPACITY);
        let relay_store = Arc::clone(&self.store);
        let relay_sink = Arc::clone(&on_progress);
        let relay_id = download_id.to_string();
        let relay = tokio::spawn(async move {
            while let Some(percent) = progress_rx.recv().await {
                if let Err(e) = relay_store.update_progress(&relay_id, percent).await {
                    debug!(download_id = %relay_id, error = %e, "progress write skipped");
                }
                (relay_sink)(percent);
            }
        });

        let staging_dir = self.config.staging_root.join(download_id);
        let transferred = self
            .engine
            .transfer(
                &sources,
                &headers,
                &staging_dir,
                download_id,
                &progress_tx,
                cancel_rx,
            )
            .await;

        // Drain the relay before the next transition so subscribers never
        // see a progress write ordered after MERGING
        drop(progress_tx);
        let _ = relay.await;

        let local_paths = match transferred {
            Ok(paths) => paths,
            Err(e) => {
                let _ = tokio::fs::remove_dir_all(&staging_dir).await;
                self.fail(download_id, &e).await;
                return Err(e);
            }
        };

        // Stage 3: merge and finalize
        self.store
            .update_status(download_id, DownloadStatus::Merging)
            .await?;

        let album_title = download
            .album_title
            .clone()
            .unwrap_or_else(|| download.title.clone());
        let album_dir = match paths::create_album_directory(
            &self.config.library_root,
            &album_title,
            download.explicit,
        )
        .await
        {
            Ok(dir) => dir,
            Err(e) => {
                let _ = tokio::fs::remove_dir_all(&staging_dir).await;
                self.fail(download_id, &e).await;
                return Err(e);
            }
        };

        let metadata = TrackMetadata {
            title: download.title.clone(),
            artist: download.artist.clone(),
            album: download.album_title.clone(),
            cover_url: download.cover_url.clone(),
            explicit: download.explicit,
        };

        let finalized = tokio::select! {
            r = self.post.finalize(&local_paths, quality, &metadata, &album_dir, &staging_dir) => r,
            _ = &mut *cancel_rx => Err(EchoirError::Cancelled),
        };

        let final_path = match finalized {
            Ok(path) => path,
            Err(e) => {
                let _ = tokio::fs::remove_dir_all(&staging_dir).await;
                self.fail(download_id, &e).await;
                return Err(e);
            }
        };

        let _ = tokio::fs::remove_dir_all(&staging_dir).await;

        // Stage 4: terminal. COMPLETED and the file path land in one write.
        let path_str = final_path.to_string_lossy().into_owned();
        self.store.update_file_path(download_id, &path_str).await?;

        info!(download_id, track_id, path = %path_str, "download completed");
        Ok(path_str)
    }

    /// Record a terminal failure; the originating error kind is preserved
    /// for the UI
    async fn fail(&self, download_id: &str, error: &EchoirError) {
        warn!(download_id, kind = error.kind().as_str(), error = %error, "download failed");
        if let Err(store_err) = self
            .store
            .record_failure(download_id, error.kind(), &error.to_string())
            .await
        {
            warn!(download_id, error = %store_err, "failed to record failure");
        }
    }
}
