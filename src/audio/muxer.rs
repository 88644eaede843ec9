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


//! Stream muxing via ffmpeg
//!
//! Immersive qualities arrive as separate streams (base audio plus the
//! spatial payload) that have to be combined into one playable container.
//! All codec work is `-c copy`: ffmpeg rewrites containers, it never
//! re-encodes audio here.

use crate::error::{EchoirError, Result};
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// ffmpeg wrapper for container operations
#[derive(Debug, Clone)]
pub struct Muxer {
    ffmpeg: String,
}

impl Muxer {
    pub fn new() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
        }
    }

    /// Use a specific ffmpeg binary instead of whatever is on PATH
    pub fn with_binary<S: Into<String>>(ffmpeg: S) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }

    /// Verify the ffmpeg binary can be executed
    pub async fn check_available(&self) -> Result<()> {
        let status = Command::new(&self.ffmpeg)
            .arg("-version")
            .output()
            .await
            .map_err(|_| EchoirError::FfmpegNotFound)?;

        if status.status.success() {
            Ok(())
        } else {
            Err(EchoirError::FfmpegNotFound)
        }
    }

    /// Combine multiple streams into one output container.
    ///
    /// Every input's streams are mapped through unchanged; the container is
    /// inferred from the output extension.
    pub async fn mux(&self, inputs: &[&Path], output: &Path) -> Result<()> {
        if inputs.len() < 2 {
            return Err(EchoirError::InvalidInput(
                "mux requires at least two inputs".to_string(),
            ));
        }

        let mut cmd = Command::new(&self.ffmpeg);
        cmd.arg("-y");
        for input in inputs {
            cmd.arg("-i").arg(input);
        }
        for i in 0..inputs.len() {
            cmd.arg("-map").arg(i.to_string());
        }
        cmd.arg("-c").arg("copy").arg(output);

        self.run(cmd, "mux").await
    }

    /// Rewrite a single stream into the output container without
    /// re-encoding
    pub async fn remux(&self, input: &Path, output: &Path) -> Result<()> {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.arg("-y")
            .arg("-i")
            .arg(input)
            .arg("-c")
            .arg("copy")
            .arg(output);

        self.run(cmd, "remux").await
    }

    async fn run(&self, mut cmd: Command, operation: &str) -> Result<()> {
        debug!(?cmd, operation, "running ffmpeg");

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EchoirError::FfmpegNotFound
            } else {
                EchoirError::FfmpegError(format!("Failed to execute ffmpeg: {}", e))
            }
        })?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // The useful diagnostic is at the tail of ffmpeg's stderr
            let tail: String = stderr
                .lines()
                .rev()
                .take(4)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n");
            Err(EchoirError::MuxFailed(format!("{} failed: {}", operation, tail)))
        }
    }
}

impl Default for Muxer {
    fn default() -> Self {
        Self::new()
    }
}
