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


//! Post-processing: merge, tag, finalize
//!
//! The merge stage turns transferred stream payloads into one tagged,
//! correctly-placed library file. `PostProcessor` is the seam between the
//! orchestrator and the codec tooling; the production implementation drives
//! ffmpeg (`FfmpegPostProcessor`), and tests substitute their own.

pub mod finalizer;
pub mod muxer;
pub mod tagger;

use crate::error::Result;
use crate::storage::models::Quality;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub use finalizer::FfmpegPostProcessor;
pub use muxer::Muxer;
pub use tagger::{Tagger, TrackTags};

/// Metadata embedded into the finalized file and used for its placement
#[derive(Debug, Clone, Default)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub cover_url: Option<String>,
    pub explicit: bool,
}

/// Merge stage contract.
///
/// Combines the transferred payload(s) into one playable container, embeds
/// tags/cover art, and atomically places the result inside `album_dir`.
/// Implementations must remove their own scratch artifacts on failure; the
/// caller owns cleanup of `local_paths`.
#[async_trait]
pub trait PostProcessor: Send + Sync {
    async fn finalize(
        &self,
        local_paths: &[PathBuf],
        quality: Quality,
        metadata: &TrackMetadata,
        album_dir: &Path,
        scratch_dir: &Path,
    ) -> Result<PathBuf>;
}
