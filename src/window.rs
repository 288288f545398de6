//! Busiest rolling window tracking
//!
//! Every observed timestamp `T` anchors a window `[T, T + length)`. Because
//! access logs are written in time order, a single FIFO of pending timestamps
//! is enough: when a new arrival lies a full window length after the front
//! entry, everything still queued behind that front entry (minus the new
//! arrival itself, plus the front entry) is exactly the content of its window,
//! which is `queue.len()` after popping it. At end of stream there is no
//! triggering arrival, so the flush assigns `queue.len() + 1`.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, FixedOffset};
use tracing::debug;

use crate::error::Result;
use crate::models::{config_duration, Ranked, DEFAULT_TIMESTAMP_FORMAT};
use crate::tally::FrequencyTally;

/// Default rolling window length (one hour)
pub const DEFAULT_WINDOW_SECS: u64 = 3600;

/// Tracks request counts of the rolling window anchored at every timestamp
#[derive(Debug)]
pub struct BusiestWindowTracker {
    length: Duration,
    timestamp_format: String,
    pending: VecDeque<DateTime<FixedOffset>>,
    counts: FrequencyTally<String>,
    peak_pending: usize,
}

impl BusiestWindowTracker {
    /// One-hour windows, anchors rendered in the standard access log format
    pub fn new() -> Self {
        Self::build(
            Duration::seconds(DEFAULT_WINDOW_SECS as i64),
            DEFAULT_TIMESTAMP_FORMAT,
        )
    }

    /// Fails with `InvalidConfig` for a zero or out-of-range length
    pub fn with_window(length_secs: u64, timestamp_format: &str) -> Result<Self> {
        let length = config_duration("window.length", length_secs)?;
        Ok(Self::build(length, timestamp_format))
    }

    fn build(length: Duration, timestamp_format: &str) -> Self {
        Self {
            length,
            timestamp_format: timestamp_format.to_string(),
            pending: VecDeque::new(),
            counts: FrequencyTally::new(),
            peak_pending: 0,
        }
    }

    /// Record one request timestamp and assign counts to anchors whose window closed
    pub fn record(&mut self, timestamp: DateTime<FixedOffset>) {
        self.pending.push_back(timestamp);
        self.peak_pending = self.peak_pending.max(self.pending.len());

        while let Some(&front) = self.pending.front() {
            if timestamp - front < self.length {
                break;
            }
            self.pending.pop_front();
            let count = self.pending.len() as u64;
            self.assign(front, count);
            if self.pending.is_empty() {
                break;
            }
        }
    }

    /// Number of timestamps still waiting for their window to close
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Flush the tail of the stream and freeze the counts
    pub fn finalize(mut self) -> WindowCounts {
        while let Some(front) = self.pending.pop_front() {
            let count = self.pending.len() as u64 + 1;
            self.assign(front, count);
        }

        debug!(
            "window tracker finalized: {} anchors, peak queue {}",
            self.counts.len(),
            self.peak_pending
        );

        WindowCounts {
            counts: self.counts,
        }
    }

    fn assign(&mut self, anchor: DateTime<FixedOffset>, count: u64) {
        let key = anchor.format(&self.timestamp_format).to_string();
        self.counts.set_if_absent(&key, count);
    }
}

impl Default for BusiestWindowTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Window counts for every anchor, available once the stream is finished
#[derive(Debug)]
pub struct WindowCounts {
    counts: FrequencyTally<String>,
}

impl WindowCounts {
    /// Busiest `k` anchors, ties in order of first assignment
    pub fn top(&self, k: usize) -> Vec<Ranked> {
        self.counts.top_ranked(k)
    }

    pub fn count(&self, anchor: &str) -> Option<u64> {
        self.counts.get(&anchor.to_string())
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
