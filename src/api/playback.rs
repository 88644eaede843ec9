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


//! Playback resolution
//!
//! The resolver asks the catalog for a playback descriptor: one or more
//! stream locators for a track at a requested quality, plus the auxiliary
//! headers (tokens etc.) the transfer engine must send when fetching them.
//! The headers come back alongside the response rather than embedded in it,
//! so the engine applies one header set uniformly to every stream.
//!
//! "Quality unavailable" is a distinct, user-facing condition; transport
//! failures are transient and eligible for caller retry. The two must not
//! be conflated.

use crate::api::client::CatalogClient;
use crate::error::{EchoirError, Result};
use crate::storage::models::Quality;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Request for a playback descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackRequest {
    pub track_id: i64,
    pub quality: Quality,
    /// AC-4 sub-mode for Dolby Atmos
    pub ac4: bool,
    /// Immersive variant; resolves to an additional stream
    pub immersive: bool,
}

impl PlaybackRequest {
    pub fn new(track_id: i64, quality: Quality, ac4: bool, immersive: bool) -> Self {
        Self {
            track_id,
            quality,
            ac4,
            immersive,
        }
    }
}

/// Playback descriptor returned by the catalog
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaybackResponse {
    #[serde(rename = "trackId")]
    pub track_id: i64,

    pub quality: String,

    pub codec: String,

    /// Stream locators; immersive qualities carry more than one
    pub urls: Vec<String>,

    /// Expected content length per locator, when the catalog knows it
    #[serde(default)]
    pub sizes: Vec<Option<u64>>,
}

impl PlaybackResponse {
    /// Sum of the expected sizes, or None when any stream's size is unknown
    pub fn total_expected_bytes(&self) -> Option<u64> {
        if self.sizes.len() != self.urls.len() {
            return None;
        }
        self.sizes.iter().copied().sum()
    }
}

/// Wire shape of the catalog's playback endpoint: the descriptor plus the
/// auxiliary fetch headers, which we split apart before returning
#[derive(Debug, Deserialize)]
struct PlaybackEnvelope {
    #[serde(flatten)]
    response: PlaybackResponse,

    #[serde(default)]
    headers: HashMap<String, String>,
}

/// Resolve the playback descriptor for a track at the requested quality.
///
/// # Errors
/// - `QualityUnavailable` when the catalog has no matching stream (404/422)
/// - `AuthorizationFailed` on 401/403
/// - `CatalogUnreachable` on transport failure (transient, caller may retry)
/// - `InvalidCatalogResponse` when the body doesn't match the descriptor
pub async fn resolve_playback(
    client: &CatalogClient,
    request: &PlaybackRequest,
) -> Result<(PlaybackResponse, HashMap<String, String>)> {
    let query = [
        ("trackId", request.track_id.to_string()),
        ("quality", request.quality.as_str().to_string()),
        ("ac4", request.ac4.to_string()),
        ("immersive", request.immersive.to_string()),
    ];

    let api_response = client
        .get_with_query::<PlaybackEnvelope, _>("playback", &query)
        .await?;

    match api_response.status {
        status if status.is_success() => {
            let envelope = api_response.body.ok_or_else(|| {
                EchoirError::invalid_response("Empty playback response", None)
            })?;

            if envelope.response.urls.is_empty() {
                // A descriptor with no locators means the catalog has
                // nothing to serve for this quality
                return Err(EchoirError::QualityUnavailable {
                    track_id: request.track_id,
                    quality: request.quality.as_str().to_string(),
                });
            }

            debug!(
                track_id = request.track_id,
                quality = request.quality.as_str(),
                streams = envelope.response.urls.len(),
                "playback resolved"
            );
            Ok((envelope.response, envelope.headers))
        }
        StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => {
            Err(EchoirError::QualityUnavailable {
                track_id: request.track_id,
                quality: request.quality.as_str().to_string(),
            })
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(EchoirError::AuthorizationFailed(
            format!("catalog returned {}", api_response.status),
        )),
        status => Err(EchoirError::catalog_unreachable(
            format!("catalog returned {}", status),
            status.is_server_error(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_splits_headers() {
        let json = r#"{
            "trackId": 42,
            "quality": "LOSSLESS",
            "codec": "flac",
            "urls": ["https://cdn.example.com/42.flac"],
            "sizes": [10485760],
            "headers": {"X-Playback-Token": "abc123"}
        }"#;

        let envelope: PlaybackEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.response.track_id, 42);
        assert_eq!(envelope.response.urls.len(), 1);
        assert_eq!(
            envelope.headers.get("X-Playback-Token").map(String::as_str),
            Some("abc123")
        );
    }

    #[test]
    fn test_envelope_headers_optional() {
        let json = r#"{
            "trackId": 7,
            "quality": "HIGH",
            "codec": "aac",
            "urls": ["https://cdn.example.com/7.m4a"]
        }"#;

        let envelope: PlaybackEnvelope = serde_json::from_str(json).unwrap();
        assert!(envelope.headers.is_empty());
        assert!(envelope.response.sizes.is_empty());
    }

    #[test]
    fn test_total_expected_bytes() {
        let response = PlaybackResponse {
            track_id: 1,
            quality: "DOLBY_ATMOS".to_string(),
            codec: "ec3".to_string(),
            urls: vec!["a".to_string(), "b".to_string()],
            sizes: vec![Some(100), Some(50)],
        };
        assert_eq!(response.total_expected_bytes(), Some(150));

        let unknown = PlaybackResponse {
            sizes: vec![Some(100), None],
            ..response.clone()
        };
        assert_eq!(unknown.total_expected_bytes(), None);

        let missing = PlaybackResponse {
            sizes: vec![],
            ..response
        };
        assert_eq!(missing.total_expected_bytes(), None);
    }
}
