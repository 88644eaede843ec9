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


//! Error types for the download core
//!
//! Errors are categorized by pipeline stage (resolution, transfer, merge,
//! store) so that a terminal FAILED record can tell the UI *which* stage
//! failed without parsing message text. `ErrorKind` is the persisted,
//! machine-readable category; the enum variants carry the detail.

use thiserror::Error;

/// Result type alias using our EchoirError type
pub type Result<T> = std::result::Result<T, EchoirError>;

/// Machine-readable error category, persisted alongside FAILED records.
///
/// The UI maps these to user actions: `Resolution` with a quality-unavailable
/// detail suggests an alternate quality, `Transfer` offers a retry, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Resolution,
    Transfer,
    Merge,
    Cancelled,
    Store,
    Other,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Resolution => "resolution",
            ErrorKind::Transfer => "transfer",
            ErrorKind::Merge => "merge",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Store => "store",
            ErrorKind::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "resolution" => Some(ErrorKind::Resolution),
            "transfer" => Some(ErrorKind::Transfer),
            "merge" => Some(ErrorKind::Merge),
            "cancelled" => Some(ErrorKind::Cancelled),
            "store" => Some(ErrorKind::Store),
            "other" => Some(ErrorKind::Other),
            _ => None,
        }
    }
}

/// Main error type for the download core
#[derive(Error, Debug)]
pub enum EchoirError {
    // ===== Resolution Errors =====

    /// The catalog has no stream matching the requested quality for this track
    #[error("Quality {quality} not available for track {track_id}")]
    QualityUnavailable {
        track_id: i64,
        quality: String,
    },

    /// Transport failure contacting the catalog service
    #[error("Catalog unreachable: {message}")]
    CatalogUnreachable {
        message: String,
        /// Whether this error might be transient
        is_transient: bool,
    },

    /// Catalog rejected the request's credentials
    #[error("Catalog authorization failed: {0}")]
    AuthorizationFailed(String),

    /// Catalog returned a response the resolver could not interpret
    #[error("Invalid catalog response: {message}")]
    InvalidCatalogResponse {
        message: String,
        /// Response body snippet for debugging
        response_body: Option<String>,
    },

    // ===== Transfer Errors =====

    /// Network connectivity error mid-stream
    #[error("Network error: {message}")]
    NetworkError {
        message: String,
        /// Whether this error might be transient
        is_transient: bool,
    },

    /// Server returned a non-success status for a stream locator
    #[error("Server responded with unexpected status code: {status_code}")]
    UnexpectedStatusCode {
        status_code: u16,
        host: String,
    },

    /// Writing received bytes to local storage failed
    #[error("Disk write failed: {0}")]
    DiskWriteFailed(String),

    /// Stream ended before the advertised content length was received
    #[error("Transfer incomplete: {received}/{expected} bytes")]
    TransferIncomplete {
        expected: u64,
        received: u64,
    },

    /// Invalid stream locator format or protocol
    #[error("Invalid stream URL: {0}")]
    InvalidStreamUrl(String),

    // ===== Merge/Finalize Errors =====

    /// Muxing multiple streams into one container failed
    #[error("Mux failed: {0}")]
    MuxFailed(String),

    /// Embedding tags or cover art failed
    #[error("Tagging failed: {0}")]
    TaggingFailed(String),

    /// ffmpeg execution error
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// ffmpeg binary not found in PATH
    #[error("FFmpeg not found. Please install FFmpeg and ensure it's in your PATH.")]
    FfmpegNotFound,

    /// Moving the finalized file into the album directory failed
    #[error("Finalize failed: {0}")]
    FinalizeFailed(String),

    /// Invalid destination path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    // ===== Store Errors =====

    /// Generic database error
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Database schema migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Download record not found
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    // ===== General Errors =====

    /// Operation was cancelled by the caller
    #[error("Operation cancelled")]
    Cancelled,

    /// Operation timed out
    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    /// Generic input validation error
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error that should not normally occur
    #[error("Internal error: {0}")]
    InternalError(String),

    // ===== External Library Errors =====
    // Automatic conversions from external error types

    /// HTTP client error from reqwest
    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// Database driver error from sqlx
    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// Helper methods for creating common errors
impl EchoirError {
    /// Create a CatalogUnreachable error
    pub fn catalog_unreachable<S: Into<String>>(message: S, is_transient: bool) -> Self {
        EchoirError::CatalogUnreachable {
            message: message.into(),
            is_transient,
        }
    }

    /// Create a NetworkError
    pub fn network_error<S: Into<String>>(message: S, is_transient: bool) -> Self {
        EchoirError::NetworkError {
            message: message.into(),
            is_transient,
        }
    }

    /// Create an InvalidCatalogResponse error
    pub fn invalid_response<S: Into<String>>(message: S, response_body: Option<String>) -> Self {
        EchoirError::InvalidCatalogResponse {
            message: message.into(),
            response_body,
        }
    }

    /// Create a RecordNotFound error with a resource name
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        EchoirError::RecordNotFound(resource.into())
    }

    /// Create an InternalError with a message
    pub fn internal<S: Into<String>>(message: S) -> Self {
        EchoirError::InternalError(message.into())
    }

    /// Pipeline stage this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            EchoirError::QualityUnavailable { .. }
            | EchoirError::CatalogUnreachable { .. }
            | EchoirError::AuthorizationFailed(_)
            | EchoirError::InvalidCatalogResponse { .. } => ErrorKind::Resolution,

            EchoirError::NetworkError { .. }
            | EchoirError::UnexpectedStatusCode { .. }
            | EchoirError::DiskWriteFailed(_)
            | EchoirError::TransferIncomplete { .. }
            | EchoirError::InvalidStreamUrl(_) => ErrorKind::Transfer,

            EchoirError::MuxFailed(_)
            | EchoirError::TaggingFailed(_)
            | EchoirError::FfmpegError(_)
            | EchoirError::FfmpegNotFound
            | EchoirError::FinalizeFailed(_)
            | EchoirError::InvalidPath(_) => ErrorKind::Merge,

            EchoirError::DatabaseError(_)
            | EchoirError::MigrationFailed(_)
            | EchoirError::RecordNotFound(_)
            | EchoirError::SqlxError(_) => ErrorKind::Store,

            EchoirError::Cancelled => ErrorKind::Cancelled,

            _ => ErrorKind::Other,
        }
    }

    /// Check if error is retryable (transient network conditions)
    ///
    /// Returns `true` for errors that might succeed on retry:
    /// - Network errors marked as transient
    /// - Timeouts
    /// - 5xx server responses
    ///
    /// Resolution and merge errors are never retryable: a missing quality or
    /// a mux failure does not improve by asking again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EchoirError::NetworkError { is_transient: true, .. }
                | EchoirError::CatalogUnreachable { is_transient: true, .. }
                | EchoirError::Timeout(_)
                | EchoirError::UnexpectedStatusCode { status_code: 500..=599, .. }
        )
    }

    /// Get user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            EchoirError::QualityUnavailable { quality, .. } => {
                format!(
                    "This track is not available in {} quality. Try a different quality.",
                    quality
                )
            }
            EchoirError::FfmpegNotFound => {
                "FFmpeg is required but not found. Please install FFmpeg and ensure it's in your PATH.".to_string()
            }
            EchoirError::AuthorizationFailed(_) => {
                "The catalog rejected your credentials. Please check your settings.".to_string()
            }
            EchoirError::TransferIncomplete { .. } => {
                "The download ended before all data was received. Please try again.".to_string()
            }
            EchoirError::Cancelled => "Download cancelled.".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<std::string::FromUtf8Error> for EchoirError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        EchoirError::InternalError(format!("UTF-8 conversion error: {}", err))
    }
}

impl From<std::num::ParseIntError> for EchoirError {
    fn from(err: std::num::ParseIntError) -> Self {
        EchoirError::InvalidInput(format!("Failed to parse integer: {}", err))
    }
}
