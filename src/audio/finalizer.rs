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


//! ffmpeg-backed post-processing
//!
//! The production `PostProcessor`: mux multi-stream downloads into one
//! container, embed tags and cover art, then move the result into the album
//! directory through the staged-rename path. Scratch files are cleaned up on
//! every exit path; a failed finalize leaves only the caller's staging
//! inputs behind (the orchestrator removes those).

use crate::audio::muxer::Muxer;
use crate::audio::tagger::{Tagger, TrackTags};
use crate::audio::{PostProcessor, TrackMetadata};
use crate::error::{EchoirError, Result};
use crate::file::paths;
use crate::storage::models::Quality;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct FfmpegPostProcessor {
    muxer: Muxer,
    tagger: Tagger,
    http: reqwest::Client,
}

impl FfmpegPostProcessor {
    pub fn new() -> Self {
        Self {
            muxer: Muxer::new(),
            tagger: Tagger::new(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_binary<S: Into<String> + Clone>(ffmpeg: S) -> Self {
        Self {
            muxer: Muxer::with_binary(ffmpeg.clone()),
            tagger: Tagger::with_binary(ffmpeg),
            http: reqwest::Client::new(),
        }
    }

    async fn cleanup(paths: &[PathBuf]) {
        for path in paths {
            let _ = tokio::fs::remove_file(path).await;
        }
    }
}

impl Default for FfmpegPostProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PostProcessor for FfmpegPostProcessor {
    async fn finalize(
        &self,
        local_paths: &[PathBuf],
        quality: Quality,
        metadata: &TrackMetadata,
        album_dir: &Path,
        scratch_dir: &Path,
    ) -> Result<PathBuf> {
        if local_paths.is_empty() {
            return Err(EchoirError::InvalidInput(
                "finalize requires at least one input".to_string(),
            ));
        }

        let ext = quality.extension();
        let mut scratch_files: Vec<PathBuf> = Vec::new();

        // Multi-stream qualities get muxed into one container first
        let merged: PathBuf = if local_paths.len() > 1 {
            let merged = scratch_dir.join(format!("merged.{}", ext));
            let inputs: Vec<&Path> = local_paths.iter().map(PathBuf::as_path).collect();
            if let Err(e) = self.muxer.mux(&inputs, &merged).await {
                Self::cleanup(&[merged]).await;
                return Err(e);
            }
            scratch_files.push(merged.clone());
            merged
        } else {
            local_paths[0].clone()
        };

        let cover = match &metadata.cover_url {
            Some(url) => Tagger::download_cover(&self.http, url, scratch_dir).await,
            None => None,
        };
        if let Some(c) = &cover {
            scratch_files.push(c.clone());
        }

        let tags = TrackTags {
            title: metadata.title.clone(),
            artist: metadata.artist.clone(),
            album: metadata.album.clone(),
        };

        let tagged = scratch_dir.join(format!("tagged.{}", ext));
        if let Err(e) = self
            .tagger
            .embed(&merged, &tagged, &tags, cover.as_deref())
            .await
        {
            scratch_files.push(tagged);
            Self::cleanup(&scratch_files).await;
            return Err(e);
        }
        scratch_files.push(tagged.clone());

        // Destination path with the explicit marker; re-downloads of the
        // same track get a collision suffix rather than clobbering
        let file_name = paths::track_file_name(&metadata.title, metadata.explicit, ext);
        let final_path = paths::avoid_collision(album_dir.join(file_name));

        if let Err(e) = paths::place_atomically(&tagged, &final_path).await {
            Self::cleanup(&scratch_files).await;
            return Err(e);
        }

        // The tagged file was consumed by the rename; drop what's left
        scratch_files.pop();
        Self::cleanup(&scratch_files).await;

        info!(path = %final_path.display(), "download finalized");
        Ok(final_path)
    }
}
