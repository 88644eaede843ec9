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


//! Download record models
//!
//! One `Download` row per download attempt. The attempt id is distinct from
//! the catalog track id: the same track downloaded again at another quality
//! is a new attempt with its own row.

use crate::error::{EchoirError, ErrorKind, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a download attempt.
///
/// Transitions are one-directional:
/// `Queued → Downloading → Merging → Completed`, with `Failed` reachable
/// from any non-terminal state. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadStatus {
    #[serde(rename = "QUEUED")]
    Queued,
    #[serde(rename = "DOWNLOADING")]
    Downloading,
    #[serde(rename = "MERGING")]
    Merging,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "FAILED")]
    Failed,
}

impl DownloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Queued => "QUEUED",
            DownloadStatus::Downloading => "DOWNLOADING",
            DownloadStatus::Merging => "MERGING",
            DownloadStatus::Completed => "COMPLETED",
            DownloadStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "QUEUED" => Ok(DownloadStatus::Queued),
            "DOWNLOADING" => Ok(DownloadStatus::Downloading),
            "MERGING" => Ok(DownloadStatus::Merging),
            "COMPLETED" => Ok(DownloadStatus::Completed),
            "FAILED" => Ok(DownloadStatus::Failed),
            _ => Err(EchoirError::InvalidInput(format!(
                "Invalid download status: {}",
                s
            ))),
        }
    }

    /// No further transition occurs from a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadStatus::Completed | DownloadStatus::Failed)
    }
}

/// Requested audio quality tier.
///
/// The tier determines how many source streams the resolver returns and
/// which container the merge stage produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quality {
    #[serde(rename = "HI_RES_LOSSLESS")]
    HiResLossless,
    #[serde(rename = "LOSSLESS")]
    Lossless,
    #[serde(rename = "DOLBY_ATMOS")]
    DolbyAtmos,
    #[serde(rename = "HIGH")]
    High,
    #[serde(rename = "LOW")]
    Low,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::HiResLossless => "HI_RES_LOSSLESS",
            Quality::Lossless => "LOSSLESS",
            Quality::DolbyAtmos => "DOLBY_ATMOS",
            Quality::High => "HIGH",
            Quality::Low => "LOW",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "HI_RES_LOSSLESS" => Ok(Quality::HiResLossless),
            "LOSSLESS" => Ok(Quality::Lossless),
            "DOLBY_ATMOS" => Ok(Quality::DolbyAtmos),
            "HIGH" => Ok(Quality::High),
            "LOW" => Ok(Quality::Low),
            _ => Err(EchoirError::InvalidInput(format!("Invalid quality: {}", s))),
        }
    }

    /// Container extension for the finalized file
    pub fn extension(&self) -> &'static str {
        match self {
            Quality::HiResLossless | Quality::Lossless => "flac",
            Quality::DolbyAtmos | Quality::High | Quality::Low => "m4a",
        }
    }

    /// Whether this tier is a lossless PCM variant
    pub fn is_lossless(&self) -> bool {
        matches!(self, Quality::HiResLossless | Quality::Lossless)
    }
}

/// Durable record of one download attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Download {
    /// Attempt id (UUID), distinct from the catalog track id
    pub id: String,

    /// Catalog track id
    pub track_id: i64,

    /// Catalog album id, when the track belongs to an album
    pub album_id: Option<i64>,

    /// Display title
    pub title: String,

    /// Display artist
    pub artist: String,

    /// Album title, used for the on-disk album directory
    pub album_title: Option<String>,

    /// Cover art locator
    pub cover_url: Option<String>,

    /// Track duration in seconds
    pub duration_seconds: i64,

    /// Explicit-content flag; feeds into album directory naming
    pub explicit: bool,

    /// Requested quality tier
    pub quality: Quality,

    /// AC-4 sub-mode for Dolby Atmos (AC-3 otherwise)
    pub ac4: bool,

    /// Immersive variant requiring an additional source stream
    pub immersive: bool,

    /// Current lifecycle status
    pub status: DownloadStatus,

    /// Percent complete, 0-100, meaningful only while Downloading
    pub progress: i32,

    /// Finalized file path; non-null if and only if status is Completed
    pub file_path: Option<String>,

    /// Failure category, set when status is Failed
    pub error_kind: Option<String>,

    /// Failure detail, set when status is Failed
    pub error_message: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Download {
    /// Create a new queued download attempt with a fresh attempt id
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        track_id: i64,
        album_id: Option<i64>,
        title: String,
        artist: String,
        album_title: Option<String>,
        cover_url: Option<String>,
        duration_seconds: i64,
        explicit: bool,
        quality: Quality,
        ac4: bool,
        immersive: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            track_id,
            album_id,
            title,
            artist,
            album_title,
            cover_url,
            duration_seconds,
            explicit,
            quality,
            ac4,
            immersive,
            status: DownloadStatus::Queued,
            progress: 0,
            file_path: None,
            error_kind: None,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Parsed failure category, when one was recorded
    pub fn failure_kind(&self) -> Option<ErrorKind> {
        self.error_kind.as_deref().and_then(ErrorKind::parse)
    }
}
