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


//! Database migrations
//!
//! Schema creation runs as plain SQL at startup rather than through sqlx's
//! compile-time migration system, which needs a build-time database
//! connection that mobile builds don't have. Applied migrations are tracked
//! in the `_migrations` table.

use crate::error::Result;
use sqlx::{Executor, SqlitePool};

/// Run all database migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    create_migrations_table(pool).await?;

    run_migration(pool, 1, "initial_schema", create_initial_schema(pool)).await?;

    Ok(())
}

/// Create migrations tracking table
async fn create_migrations_table(pool: &SqlitePool) -> Result<()> {
    pool.execute(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .await?;

    Ok(())
}

/// Run a single migration if it hasn't been applied yet
async fn run_migration(
    pool: &SqlitePool,
    id: i32,
    name: &str,
    migration_fn: impl std::future::Future<Output = Result<()>>,
) -> Result<()> {
    let applied: Option<i32> = sqlx::query_scalar("SELECT id FROM _migrations WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    if applied.is_some() {
        return Ok(());
    }

    migration_fn.await?;

    sqlx::query("INSERT INTO _migrations (id, name) VALUES (?, ?)")
        .bind(id)
        .bind(name)
        .execute(pool)
        .await?;

    Ok(())
}

/// Create initial database schema
///
/// One row per download attempt. The attempt id is the primary key; track
/// and album ids are indexed for the point lookups the UI issues, and the
/// status column backs the active/history views.
async fn create_initial_schema(pool: &SqlitePool) -> Result<()> {
    pool.execute(
        r#"
-- Downloads table: one durable record per download attempt
CREATE TABLE IF NOT EXISTS Downloads (
    id TEXT PRIMARY KEY NOT NULL,
    track_id INTEGER NOT NULL,
    album_id INTEGER,
    title TEXT NOT NULL,
    artist TEXT NOT NULL,
    album_title TEXT,
    cover_url TEXT,
    duration_seconds INTEGER NOT NULL DEFAULT 0,
    explicit INTEGER NOT NULL DEFAULT 0,
    quality TEXT NOT NULL,
    ac4 INTEGER NOT NULL DEFAULT 0,
    immersive INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'QUEUED',
    progress INTEGER NOT NULL DEFAULT 0,
    file_path TEXT,
    error_kind TEXT,
    error_message TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_downloads_track_id ON Downloads (track_id);
CREATE INDEX IF NOT EXISTS idx_downloads_album_id ON Downloads (album_id);
CREATE INDEX IF NOT EXISTS idx_downloads_status ON Downloads (status);
CREATE INDEX IF NOT EXISTS idx_downloads_created_at ON Downloads (created_at);
        "#,
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::Database;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = Database::new_in_memory().await.unwrap();

        // Second run must be a no-op, not an error
        run_migrations(db.pool()).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _migrations")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_downloads_table_exists() {
        let db = Database::new_in_memory().await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM Downloads")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
