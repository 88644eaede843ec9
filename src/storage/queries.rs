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


//! Row-level queries for the Downloads table
//!
//! Plain query functions over the pool; the `DownloadStore` facade layers
//! per-id locking and feed publication on top. Nothing here should be called
//! from outside the storage module.

use crate::error::{EchoirError, ErrorKind, Result};
use crate::storage::models::{Download, DownloadStatus, Quality};
use chrono::DateTime;
use sqlx::{Row, SqlitePool};

/// Insert a new download record
pub async fn insert_download(pool: &SqlitePool, download: &Download) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO Downloads (
            id, track_id, album_id, title, artist, album_title, cover_url,
            duration_seconds, explicit, quality, ac4, immersive,
            status, progress, file_path, error_kind, error_message, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&download.id)
    .bind(download.track_id)
    .bind(download.album_id)
    .bind(&download.title)
    .bind(&download.artist)
    .bind(&download.album_title)
    .bind(&download.cover_url)
    .bind(download.duration_seconds)
    .bind(download.explicit)
    .bind(download.quality.as_str())
    .bind(download.ac4)
    .bind(download.immersive)
    .bind(download.status.as_str())
    .bind(download.progress)
    .bind(&download.file_path)
    .bind(&download.error_kind)
    .bind(&download.error_message)
    .bind(download.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Update progress for a record.
///
/// MAX() keeps the stored value monotonic even if relayed updates arrive
/// out of order.
pub async fn update_progress(pool: &SqlitePool, id: &str, percent: i32) -> Result<()> {
    let result = sqlx::query("UPDATE Downloads SET progress = MAX(progress, ?) WHERE id = ?")
        .bind(percent.clamp(0, 100))
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(EchoirError::not_found(format!("download {}", id)));
    }

    Ok(())
}

/// Update status for a record
pub async fn update_status(pool: &SqlitePool, id: &str, status: DownloadStatus) -> Result<()> {
    let result = sqlx::query("UPDATE Downloads SET status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(EchoirError::not_found(format!("download {}", id)));
    }

    Ok(())
}

/// Mark a record failed with its error category and message
pub async fn record_failure(
    pool: &SqlitePool,
    id: &str,
    kind: ErrorKind,
    message: &str,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE Downloads SET status = ?, error_kind = ?, error_message = ? WHERE id = ?",
    )
    .bind(DownloadStatus::Failed.as_str())
    .bind(kind.as_str())
    .bind(message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(EchoirError::not_found(format!("download {}", id)));
    }

    Ok(())
}

/// Record the finalized file path.
///
/// Completion and the file path are written in one statement so a reader
/// can never observe a path on a non-completed record or vice versa.
pub async fn set_file_path(pool: &SqlitePool, id: &str, file_path: &str) -> Result<()> {
    let result = sqlx::query(
        "UPDATE Downloads SET file_path = ?, status = ?, progress = 100 WHERE id = ?",
    )
    .bind(file_path)
    .bind(DownloadStatus::Completed.as_str())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(EchoirError::not_found(format!("download {}", id)));
    }

    Ok(())
}

/// Delete a download record
pub async fn delete_download(pool: &SqlitePool, id: &str) -> Result<()> {
    sqlx::query("DELETE FROM Downloads WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Find a download by attempt id
pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Download>> {
    let row = sqlx::query("SELECT * FROM Downloads WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.map(row_to_download).transpose()
}

/// Find all attempts for a catalog track (one row per attempt)
pub async fn find_by_track_id(pool: &SqlitePool, track_id: i64) -> Result<Vec<Download>> {
    let rows = sqlx::query("SELECT * FROM Downloads WHERE track_id = ? ORDER BY created_at DESC")
        .bind(track_id)
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(row_to_download).collect()
}

/// Find all attempts for a catalog album
pub async fn find_by_album_id(pool: &SqlitePool, album_id: i64) -> Result<Vec<Download>> {
    let rows = sqlx::query("SELECT * FROM Downloads WHERE album_id = ? ORDER BY created_at DESC")
        .bind(album_id)
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(row_to_download).collect()
}

/// Non-terminal records, oldest first (queue order)
pub async fn list_active(pool: &SqlitePool) -> Result<Vec<Download>> {
    let rows = sqlx::query(
        "SELECT * FROM Downloads WHERE status IN ('QUEUED', 'DOWNLOADING', 'MERGING') \
         ORDER BY created_at ASC",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_to_download).collect()
}

/// All records, most recent first
pub async fn list_history(pool: &SqlitePool) -> Result<Vec<Download>> {
    let rows = sqlx::query("SELECT * FROM Downloads ORDER BY created_at DESC")
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(row_to_download).collect()
}

/// Reset records interrupted by a process restart back to QUEUED.
///
/// Returns the number of records reset.
pub async fn requeue_interrupted(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE Downloads SET status = 'QUEUED', progress = 0 \
         WHERE status IN ('DOWNLOADING', 'MERGING')",
    )
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Convert database row to Download
fn row_to_download(row: sqlx::sqlite::SqliteRow) -> Result<Download> {
    let quality_str: String = row.try_get("quality")?;
    let status_str: String = row.try_get("status")?;
    let created_at_str: String = row.try_get("created_at")?;

    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map_err(|e| {
            EchoirError::DatabaseError(format!("Invalid created_at timestamp: {}", e))
        })?
        .with_timezone(&chrono::Utc);

    Ok(Download {
        id: row.try_get("id")?,
        track_id: row.try_get("track_id")?,
        album_id: row.try_get("album_id")?,
        title: row.try_get("title")?,
        artist: row.try_get("artist")?,
        album_title: row.try_get("album_title")?,
        cover_url: row.try_get("cover_url")?,
        duration_seconds: row.try_get("duration_seconds")?,
        explicit: row.try_get("explicit")?,
        quality: Quality::parse(&quality_str)?,
        ac4: row.try_get("ac4")?,
        immersive: row.try_get("immersive")?,
        status: DownloadStatus::parse(&status_str)?,
        progress: row.try_get("progress")?,
        file_path: row.try_get("file_path")?,
        error_kind: row.try_get("error_kind")?,
        error_message: row.try_get("error_message")?,
        created_at,
    })
}
