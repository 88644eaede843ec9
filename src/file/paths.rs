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


//! Library path generation
//!
//! Album directories live under a single library root and are named from
//! the album title plus an explicit-content marker, so the explicit and
//! clean versions of an album never share a directory. Finalized files are
//! staged inside the destination directory and moved into place with an
//! atomic rename.

use crate::error::{EchoirError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};

// 255 bytes is the filename component limit on every filesystem we target
const MAX_COMPONENT_LENGTH: usize = 255;

/// Marker appended to directory and file names for explicit content
const EXPLICIT_MARKER: &str = " [E]";

/// Sanitize a single path component for filesystem compatibility
pub fn sanitize_path_component(name: &str) -> String {
    let invalid_chars = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];
    let replaced: String = name
        .chars()
        .map(|c| if invalid_chars.contains(&c) || c.is_control() { '_' } else { c })
        .collect();

    // Collapse runs of whitespace left behind by replacement
    let ws = Regex::new(r"\s+").unwrap();
    let cleaned = ws.replace_all(replaced.trim(), " ").to_string();

    // A component of only separators/whitespace still needs a name
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Truncate a component to a byte budget without splitting a character
fn truncate_component(name: &str, max_bytes: usize) -> String {
    if name.len() <= max_bytes {
        return name.to_string();
    }

    let mut end = max_bytes;
    while end > 0 && !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].trim_end().to_string()
}

/// Directory name for one album variant.
///
/// Explicit and clean versions of the same album must resolve to distinct
/// directories, so the explicit marker is part of the name.
pub fn album_directory_name(album_title: &str, explicit: bool) -> String {
    let base = sanitize_path_component(album_title);
    let marker = if explicit { EXPLICIT_MARKER } else { "" };
    let budget = MAX_COMPONENT_LENGTH - marker.len();
    format!("{}{}", truncate_component(&base, budget), marker)
}

/// Create (or reuse) the album directory under the library root.
///
/// `create_dir_all` is idempotent, so concurrent finalizations of tracks
/// from the same album are race-safe.
pub async fn create_album_directory(
    root: &Path,
    album_title: &str,
    explicit: bool,
) -> Result<PathBuf> {
    let dir = root.join(album_directory_name(album_title, explicit));
    tokio::fs::create_dir_all(&dir).await.map_err(|e| {
        EchoirError::InvalidPath(format!(
            "Failed to create album directory {}: {}",
            dir.display(),
            e
        ))
    })?;
    Ok(dir)
}

/// File name for a finalized track
pub fn track_file_name(title: &str, explicit: bool, extension: &str) -> String {
    let marker = if explicit { EXPLICIT_MARKER } else { "" };
    let ext = if extension.starts_with('.') {
        extension.to_string()
    } else {
        format!(".{}", extension)
    };

    // Reserve space for extension, marker, and a potential collision
    // suffix " (999)"
    let budget = MAX_COMPONENT_LENGTH - ext.len() - marker.len() - 6;
    let base = truncate_component(&sanitize_path_component(title), budget);
    format!("{}{}{}", base, marker, ext)
}

/// Avoid filename collisions by appending (1), (2), etc.
pub fn avoid_collision(path: PathBuf) -> PathBuf {
    if !path.exists() {
        return path;
    }

    let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("track")
        .to_string();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_string();

    for i in 1..1000 {
        let candidate = if extension.is_empty() {
            parent.join(format!("{} ({})", stem, i))
        } else {
            parent.join(format!("{} ({}).{}", stem, i, extension))
        };
        if !candidate.exists() {
            return candidate;
        }
    }

    path
}

/// Staging path for a final destination: a dot-prefixed `.part` sibling.
///
/// Staging lives inside the destination directory so the final rename never
/// crosses a filesystem boundary.
pub fn staging_path(final_path: &Path) -> PathBuf {
    let name = final_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("output");
    final_path.with_file_name(format!(".{}.part", name))
}

/// Move `src` to `final_path` such that no reader ever observes a partial
/// file at the final path: copy into the staging sibling, then rename.
pub async fn place_atomically(src: &Path, final_path: &Path) -> Result<()> {
    let staging = staging_path(final_path);

    // src usually lives in a scratch directory on another mount, so copy
    // rather than rename into staging
    tokio::fs::copy(src, &staging).await.map_err(|e| {
        EchoirError::FinalizeFailed(format!(
            "Failed to stage {} -> {}: {}",
            src.display(),
            staging.display(),
            e
        ))
    })?;

    if let Err(e) = tokio::fs::rename(&staging, final_path).await {
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(EchoirError::FinalizeFailed(format!(
            "Failed to move {} into place: {}",
            final_path.display(),
            e
        )));
    }

    let _ = tokio::fs::remove_file(src).await;
    Ok(())
}
