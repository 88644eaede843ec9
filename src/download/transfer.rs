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


//! Transfer engine
//!
//! Streams each resolved source to a staging file, reporting coalesced
//! progress computed across the whole request. Transient failures are
//! retried per source with exponential backoff; a retried attempt restarts
//! the stream but never regresses reported progress. On any failure or
//! cancellation every staging file written so far is removed before the
//! error is returned — a failed transfer leaves nothing behind.

use crate::download::progress::ProgressTracker;
use crate::error::{EchoirError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

const WRITE_BUFFER_SZ: usize = 8 * 1024; // 8KB chunks

/// One resolved stream to fetch
#[derive(Debug, Clone)]
pub struct StreamSource {
    pub url: String,
    /// Content length advertised by the resolver, if known
    pub expected_bytes: Option<u64>,
}

/// Transfer engine configuration
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Retry attempts per source for transient failures
    pub max_retries: u32,

    /// Whole-request timeout per HTTP attempt
    pub timeout: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout: Duration::from_secs(300),
        }
    }
}

/// Streams resolved sources to staging files
pub struct TransferEngine {
    client: Client,
    config: TransferConfig,
}

impl TransferEngine {
    pub fn new(config: TransferConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(TransferConfig::default())
    }

    /// Fetch every source into `staging_dir`, named by download id and
    /// stream index. Progress percent goes into `progress_tx` (lossy
    /// `try_send` so a slow consumer can never stall the stream loop; the
    /// final 100 is delivered reliably).
    ///
    /// Cancellation via `cancel_rx` aborts the in-flight stream promptly,
    /// removes all staging files, and returns `Cancelled`.
    pub async fn transfer(
        &self,
        sources: &[StreamSource],
        headers: &HashMap<String, String>,
        staging_dir: &Path,
        download_id: &str,
        progress_tx: &mpsc::Sender<i32>,
        cancel_rx: &mut oneshot::Receiver<()>,
    ) -> Result<Vec<PathBuf>> {
        if sources.is_empty() {
            return Err(EchoirError::InvalidInput(
                "transfer requires at least one source".to_string(),
            ));
        }

        tokio::fs::create_dir_all(staging_dir).await.map_err(|e| {
            EchoirError::DiskWriteFailed(format!(
                "Failed to create staging directory {}: {}",
                staging_dir.display(),
                e
            ))
        })?;

        let total: Option<u64> = sources
            .iter()
            .map(|s| s.expected_bytes)
            .sum::<Option<u64>>();
        let mut tracker = ProgressTracker::new(total);

        let mut local_paths = Vec::with_capacity(sources.len());

        for (index, source) in sources.iter().enumerate() {
            let path = staging_dir.join(format!("{}-{}.part", download_id, index));

            let result = self
                .fetch_source_with_retries(
                    source,
                    headers,
                    &path,
                    &mut tracker,
                    progress_tx,
                    cancel_rx,
                )
                .await;

            if let Err(e) = result {
                local_paths.push(path);
                Self::cleanup_partials(&local_paths).await;
                return Err(e);
            }

            local_paths.push(path);
        }

        // Reliable final update; the relay consumer is draining, so this
        // wait is bounded
        let _ = progress_tx.send(tracker.complete()).await;

        debug!(
            download_id,
            streams = sources.len(),
            bytes = tracker.received_bytes(),
            "transfer complete"
        );
        Ok(local_paths)
    }

    /// Fetch one source, retrying transient failures with exponential
    /// backoff. Each attempt rewrites the staging file from the start;
    /// progress accounting only ever moves forward.
    async fn fetch_source_with_retries(
        &self,
        source: &StreamSource,
        headers: &HashMap<String, String>,
        path: &Path,
        tracker: &mut ProgressTracker,
        progress_tx: &mpsc::Sender<i32>,
        cancel_rx: &mut oneshot::Receiver<()>,
    ) -> Result<()> {
        let mut attempt = 0u32;
        // High-water mark of bytes reported for this source across attempts
        let mut reported = 0u64;

        loop {
            match self
                .fetch_source(source, headers, path, tracker, &mut reported, progress_tx, cancel_rx)
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let backoff = Duration::from_secs(2u64.pow(attempt.min(5)));
                    warn!(url = %source.url, attempt, error = %e, "transfer attempt failed, retrying");
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_source(
        &self,
        source: &StreamSource,
        headers: &HashMap<String, String>,
        path: &Path,
        tracker: &mut ProgressTracker,
        reported: &mut u64,
        progress_tx: &mpsc::Sender<i32>,
        cancel_rx: &mut oneshot::Receiver<()>,
    ) -> Result<()> {
        let mut request = self.client.get(&source.url);
        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EchoirError::network_error(e.to_string(), e.is_timeout() || e.is_connect()))?;

        let status = response.status();
        if !status.is_success() {
            let host = response.url().host_str().unwrap_or("").to_string();
            return Err(EchoirError::UnexpectedStatusCode {
                status_code: status.as_u16(),
                host,
            });
        }

        let file = File::create(path)
            .await
            .map_err(|e| EchoirError::DiskWriteFailed(format!("{}: {}", path.display(), e)))?;
        let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SZ, file);

        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        loop {
            let chunk = tokio::select! {
                chunk = stream.next() => chunk,
                _ = &mut *cancel_rx => {
                    // Drop the connection and writer before the caller
                    // removes the staging files
                    return Err(EchoirError::Cancelled);
                }
            };

            let Some(chunk) = chunk else { break };
            let chunk =
                chunk.map_err(|e| EchoirError::network_error(format!("stream error: {}", e), true))?;

            writer
                .write_all(&chunk)
                .await
                .map_err(|e| EchoirError::DiskWriteFailed(format!("{}: {}", path.display(), e)))?;

            written += chunk.len() as u64;

            // Only bytes beyond the previous attempt's high-water mark count
            // toward progress, so a retry never double-reports
            if written > *reported {
                let fresh = written - *reported;
                *reported = written;
                if let Some(percent) = tracker.add_bytes(fresh) {
                    let _ = progress_tx.try_send(percent);
                }
            }
        }

        writer
            .flush()
            .await
            .map_err(|e| EchoirError::DiskWriteFailed(format!("{}: {}", path.display(), e)))?;

        if let Some(expected) = source.expected_bytes {
            if written < expected {
                return Err(EchoirError::TransferIncomplete {
                    expected,
                    received: written,
                });
            }
        }

        Ok(())
    }

    /// Remove staging files left behind by a failed or cancelled transfer
    async fn cleanup_partials(paths: &[PathBuf]) {
        for path in paths {
            if let Err(e) = tokio::fs::remove_file(path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "failed to remove staging file");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TransferConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_total_is_none_when_any_source_unknown() {
        let sources = [
            StreamSource {
                url: "a".to_string(),
                expected_bytes: Some(100),
            },
            StreamSource {
                url: "b".to_string(),
                expected_bytes: None,
            },
        ];
        let total: Option<u64> = sources.iter().map(|s| s.expected_bytes).sum();
        assert_eq!(total, None);
    }

    #[tokio::test]
    async fn test_cleanup_partials_ignores_missing() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("a.part");
        let absent = dir.path().join("b.part");
        tokio::fs::write(&present, b"data").await.unwrap();

        TransferEngine::cleanup_partials(&[present.clone(), absent]).await;
        assert!(!present.exists());
    }

    #[tokio::test]
    async fn test_empty_sources_rejected() {
        let engine = TransferEngine::with_defaults().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::channel(8);
        let (_cancel_tx, mut cancel_rx) = oneshot::channel::<()>();

        let result = engine
            .transfer(&[], &HashMap::new(), dir.path(), "dl-1", &tx, &mut cancel_rx)
            .await;
        assert!(matches!(result, Err(EchoirError::InvalidInput(_))));
    }
}
