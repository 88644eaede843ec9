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


//! Echoir download core
//!
//! Native pipeline behind the Echoir music downloader: resolve playback
//! streams for a track+quality, transfer them with progress reporting,
//! merge/tag/finalize into the music library, and keep a durable record of
//! every attempt that the UI observes through live queries.

pub mod api;
pub mod audio;
pub mod download;
pub mod error;
pub mod file;
pub mod storage;

pub use download::{DownloadRepository, RepositoryConfig};
pub use error::{EchoirError, ErrorKind, Result};
pub use storage::{Database, Download, DownloadStatus, DownloadStore, Quality};
