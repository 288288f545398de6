use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::{AnalyzerError, Result};

/// Timestamp layout used by common/combined access logs
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Convert a configured number of seconds into a non-zero duration
pub fn config_duration(field: &str, secs: u64) -> Result<Duration> {
    if secs == 0 {
        return Err(AnalyzerError::InvalidConfig(format!("{} must be greater than 0", field)));
    }
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| {
            AnalyzerError::InvalidConfig(format!("{} = {}s is out of range", field, secs))
        })
}

/// One parsed access log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub host: String,
    pub timestamp: DateTime<FixedOffset>,
    /// Requested path; absent for bad requests or unquoted request lines
    pub resource: Option<String>,
    pub status: Option<u16>,
    pub bytes: u64,
}

impl LogRecord {
    /// 4xx responses count as failed requests for abuse detection
    pub fn is_failure(&self) -> bool {
        matches!(self.status, Some(400..=499))
    }
}

/// A key and its value in a ranked report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ranked {
    pub key: String,
    pub value: u64,
}

impl Ranked {
    pub fn new(key: impl Into<String>, value: u64) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Counters collected over one analysis run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub lines_read: u64,
    pub records_analyzed: u64,
    pub blank_lines: u64,
    pub malformed_skipped: u64,
    pub blocked_requests: u64,
    pub blocks_issued: u64,
    pub out_of_order: u64,
    pub distinct_hosts: u64,
    pub distinct_resources: u64,
}

/// Final result of an analysis run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub top_hosts: Vec<Ranked>,
    pub top_resources: Vec<Ranked>,
    pub busiest_windows: Vec<Ranked>,
    pub stats: RunStats,
}
