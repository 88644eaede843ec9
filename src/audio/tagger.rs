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


//! Tag and cover art embedding
//!
//! ffmpeg writes a new file rather than editing in place, so the tagger
//! takes an input and produces a tagged output in the same scratch
//! directory. Cover art is fetched over HTTP first; a cover that cannot be
//! fetched downgrades to tagging without art rather than failing the
//! download.

use crate::error::{EchoirError, Result};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Tag values embedded into the finalized file
#[derive(Debug, Clone, Default)]
pub struct TrackTags {
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
}

/// Embeds metadata and cover art via ffmpeg
#[derive(Debug, Clone)]
pub struct Tagger {
    ffmpeg: String,
}

impl Tagger {
    pub fn new() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
        }
    }

    pub fn with_binary<S: Into<String>>(ffmpeg: S) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }

    /// Write a tagged copy of `input` to `output`, attaching `cover` as
    /// embedded art when provided.
    pub async fn embed(
        &self,
        input: &Path,
        output: &Path,
        tags: &TrackTags,
        cover: Option<&Path>,
    ) -> Result<()> {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.arg("-y").arg("-i").arg(input);

        if let Some(cover) = cover {
            cmd.arg("-i").arg(cover);
            cmd.arg("-map").arg("0").arg("-map").arg("1");
            cmd.arg("-disposition:v:0").arg("attached_pic");
        } else {
            cmd.arg("-map").arg("0");
        }

        cmd.arg("-c").arg("copy");
        cmd.arg("-metadata").arg(format!("title={}", tags.title));
        cmd.arg("-metadata").arg(format!("artist={}", tags.artist));
        if let Some(album) = &tags.album {
            cmd.arg("-metadata").arg(format!("album={}", album));
        }
        cmd.arg(output);

        debug!(input = %input.display(), "embedding tags");

        let result = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EchoirError::FfmpegNotFound
            } else {
                EchoirError::FfmpegError(format!("Failed to execute ffmpeg: {}", e))
            }
        })?;

        if result.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let tail = stderr.lines().last().unwrap_or("").to_string();
            Err(EchoirError::TaggingFailed(tail))
        }
    }

    /// Fetch cover art into the scratch directory.
    ///
    /// Returns None (after logging) when the cover can't be fetched; the
    /// caller tags without art in that case.
    pub async fn download_cover(
        client: &reqwest::Client,
        url: &str,
        scratch_dir: &Path,
    ) -> Option<PathBuf> {
        let dest = scratch_dir.join("cover.jpg");

        let result = async {
            let response = client.get(url).send().await?.error_for_status()?;
            let bytes = response.bytes().await?;
            let mut file = tokio::fs::File::create(&dest).await.map_err(|e| {
                EchoirError::DiskWriteFailed(format!("{}: {}", dest.display(), e))
            })?;
            file.write_all(&bytes).await.map_err(|e| {
                EchoirError::DiskWriteFailed(format!("{}: {}", dest.display(), e))
            })?;
            file.flush().await.map_err(|e| {
                EchoirError::DiskWriteFailed(format!("{}: {}", dest.display(), e))
            })?;
            Ok::<_, EchoirError>(())
        }
        .await;

        match result {
            Ok(()) => Some(dest),
            Err(e) => {
                warn!(url, error = %e, "cover art fetch failed, tagging without art");
                None
            }
        }
    }
}

impl Default for Tagger {
    fn default() -> Self {
        Self::new()
    }
}
