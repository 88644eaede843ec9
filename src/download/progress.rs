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


//! Transfer progress tracking
//!
//! Percent is computed from cumulative bytes received over the sum of
//! expected content lengths across every stream of the request. Updates are
//! coalesced: at most one emission per interval and only when the integer
//! percent moved. 100 is reported exactly once, by `complete()`, never from
//! a byte count — a stream that reaches its expected length still isn't
//! done until the engine says so.
//!
//! When any stream's length is unknown the tracker degrades to an
//! indeterminate estimate that rises monotonically but saturates below 100.

use std::time::{Duration, Instant};

/// Minimum interval between emitted updates
const UPDATE_INTERVAL: Duration = Duration::from_millis(200);

/// Window for the indeterminate estimate: bytes received beyond this keep
/// pushing the estimate toward (but never onto) 99
const INDETERMINATE_WINDOW: u64 = 4 * 1024 * 1024;

/// Caller-supplied progress sink
pub type ProgressSink = std::sync::Arc<dyn Fn(i32) + Send + Sync>;

#[derive(Debug)]
pub struct ProgressTracker {
    /// Total expected bytes across all streams, None if any is unknown
    total_bytes: Option<u64>,

    /// Cumulative bytes received across all streams
    received: u64,

    /// Last percent handed out; enforces monotonicity
    last_percent: i32,

    /// Last emission time (for throttling)
    last_update: Instant,

    completed: bool,
}

impl ProgressTracker {
    pub fn new(total_bytes: Option<u64>) -> Self {
        Self {
            total_bytes: total_bytes.filter(|&t| t > 0),
            received: 0,
            last_percent: 0,
            // Primed in the past so the first chunk emits immediately
            last_update: Instant::now()
                .checked_sub(UPDATE_INTERVAL)
                .unwrap_or_else(Instant::now),
            completed: false,
        }
    }

    /// Record received bytes.
    ///
    /// Returns `Some(percent)` when an update should be emitted: the
    /// throttle interval has passed and the integer percent changed.
    pub fn add_bytes(&mut self, bytes: u64) -> Option<i32> {
        self.received += bytes;

        let percent = self.current_percent();
        if percent <= self.last_percent {
            return None;
        }

        let now = Instant::now();
        if now.duration_since(self.last_update) < UPDATE_INTERVAL {
            return None;
        }

        self.last_update = now;
        self.last_percent = percent;
        Some(percent)
    }

    /// Mark the transfer finished and return the final 100.
    pub fn complete(&mut self) -> i32 {
        self.completed = true;
        self.last_percent = 100;
        100
    }

    pub fn received_bytes(&self) -> u64 {
        self.received
    }

    /// Percent implied by the current byte count, capped at 99 until
    /// `complete()`
    fn current_percent(&self) -> i32 {
        if self.completed {
            return 100;
        }

        let raw = match self.total_bytes {
            Some(total) => ((self.received as f64 / total as f64) * 100.0) as i32,
            None => {
                // Indeterminate: asymptotic estimate, monotone in `received`
                let est = self.received as f64
                    / (self.received as f64 + INDETERMINATE_WINDOW as f64);
                (est * 100.0) as i32
            }
        };

        raw.clamp(0, 99)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_total_percent() {
        let mut tracker = ProgressTracker::new(Some(1000));

        assert_eq!(tracker.add_bytes(250), Some(25));
        assert_eq!(tracker.received_bytes(), 250);
    }

    #[test]
    fn test_never_reports_100_from_bytes() {
        let mut tracker = ProgressTracker::new(Some(1000));

        // Even the full byte count caps at 99 until complete()
        let emitted = tracker.add_bytes(1000);
        assert_eq!(emitted, Some(99));
        assert_eq!(tracker.complete(), 100);
    }

    #[test]
    fn test_unknown_total_is_indeterminate() {
        let mut tracker = ProgressTracker::new(None);

        let first = tracker.add_bytes(INDETERMINATE_WINDOW);
        assert_eq!(first, Some(50));

        // More data keeps the estimate below 100
        tracker.last_update = Instant::now() - UPDATE_INTERVAL;
        let more = tracker.add_bytes(INDETERMINATE_WINDOW * 100);
        assert!(more.unwrap() < 100);
    }

    #[test]
    fn test_zero_total_treated_as_unknown() {
        let mut tracker = ProgressTracker::new(Some(0));
        // Must not divide by zero; falls back to the indeterminate estimate
        assert!(tracker.add_bytes(1024).unwrap_or(0) < 100);
    }

    #[test]
    fn test_updates_are_coalesced() {
        let mut tracker = ProgressTracker::new(Some(10_000));

        assert_eq!(tracker.add_bytes(1000), Some(10));
        // Within the throttle window: suppressed even though percent moved
        assert_eq!(tracker.add_bytes(1000), None);

        // After the window the pending percent is emitted
        tracker.last_update = Instant::now() - UPDATE_INTERVAL;
        assert_eq!(tracker.add_bytes(1000), Some(30));
    }

    #[test]
    fn test_percent_is_monotonic() {
        let mut tracker = ProgressTracker::new(Some(1000));
        tracker.add_bytes(500);

        // Same percent again: no emission
        tracker.last_update = Instant::now() - UPDATE_INTERVAL;
        assert_eq!(tracker.add_bytes(0), None);
    }
}
