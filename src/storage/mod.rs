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


//! Durable download state
//!
//! SQLite-backed storage for download records with reactive queries.
//!
//! # Usage Example
//! ```no_run
//! use echoir_core::storage::{Database, DownloadStore, Download, Quality};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new("./echoir.db").await?;
//! let store = DownloadStore::new(db);
//!
//! let download = Download::new(
//!     42, Some(7),
//!     "Track".to_string(), "Artist".to_string(),
//!     Some("Album".to_string()), None,
//!     215, false, Quality::Lossless, false, false,
//! );
//! store.save(&download).await?;
//!
//! let active = store.active_downloads();
//! println!("{} active", active.borrow().len());
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod live;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod store;

// Re-export commonly used types
pub use database::Database;
pub use live::DownloadFeeds;
pub use models::{Download, DownloadStatus, Quality};
pub use store::DownloadStore;
