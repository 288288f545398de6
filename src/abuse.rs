//! Abusive Host Detection Module
//!
//! Blocks hosts that keep failing requests (4xx responses) in quick succession:
//! - A run of failures is anchored at its first failure and lasts `find_time`
//! - The failure after `max_failures` inside the run blocks the host
//! - While blocked, every request of the host goes to the blocked sink
//! - After `ban_time` the host starts over with a clean history
//!
//! # Example
//! ```ignore
//! use accesswatch::abuse::{AbuseConfig, AbuseDetector};
//! use accesswatch::sink::MemorySink;
//!
//! let mut detector = AbuseDetector::new(AbuseConfig::default(), MemorySink::new())?;
//!
//! if detector.observe(&record.host, record.timestamp, record.is_failure(), line)? {
//!     println!("{} is blocked", record.host);
//! }
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AnalyzerError, Result};
use crate::models::config_duration;
use crate::sink::BlockedSink;

/// Configuration for abuse detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbuseConfig {
    /// Failures tolerated inside one find window; the next one blocks the host
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,

    /// Length of a failure run, measured from its first failure (seconds)
    #[serde(default = "default_find_time")]
    pub find_time: u64,

    /// How long a blocked host stays blocked (seconds)
    #[serde(default = "default_ban_time")]
    pub ban_time: u64,
}

impl Default for AbuseConfig {
    fn default() -> Self {
        Self {
            max_failures: default_max_failures(),
            find_time: default_find_time(),
            ban_time: default_ban_time(),
        }
    }
}

fn default_max_failures() -> u32 {
    3
}

fn default_find_time() -> u64 {
    20
}

fn default_ban_time() -> u64 {
    300 // 5 minutes
}

/// Failure state of a host that is not clean
///
/// Clean hosts have no entry at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostFailureState {
    /// Consecutive failures inside the window opened at `window_start`
    Accumulating {
        failures: u32,
        window_start: DateTime<FixedOffset>,
    },
    /// Blocked since the failure that exceeded the limit
    Blocked { since: DateTime<FixedOffset> },
}

impl HostFailureState {
    pub fn failure_count(&self) -> u32 {
        match self {
            HostFailureState::Accumulating { failures, .. } => *failures,
            HostFailureState::Blocked { .. } => 0,
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, HostFailureState::Blocked { .. })
    }
}

/// Per-host failure tracker that owns the blocked request sink
#[derive(Debug)]
pub struct AbuseDetector<S> {
    max_failures: u32,
    find_time: Duration,
    ban_time: Duration,
    hosts: HashMap<String, HostFailureState>,
    sink: S,
    blocks_issued: u64,
    blocked_requests: u64,
}

impl<S: BlockedSink> AbuseDetector<S> {
    /// Fails with `InvalidConfig` when a limit is zero or a duration is out of range
    pub fn new(config: AbuseConfig, sink: S) -> Result<Self> {
        if config.max_failures == 0 {
            return Err(AnalyzerError::InvalidConfig(
                "detector.max_failures must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            max_failures: config.max_failures,
            find_time: config_duration("detector.find_time", config.find_time)?,
            ban_time: config_duration("detector.ban_time", config.ban_time)?,
            hosts: HashMap::new(),
            sink,
            blocks_issued: 0,
            blocked_requests: 0,
        })
    }

    /// Feed one request of `host`
    ///
    /// Returns whether the host is blocked after this request. Blocked requests
    /// are written to the sink here; callers must not write them again.
    pub fn observe(
        &mut self,
        host: &str,
        timestamp: DateTime<FixedOffset>,
        is_failure: bool,
        line: &str,
    ) -> Result<bool> {
        let blocked = self.transition(host, timestamp, is_failure);
        if blocked {
            self.blocked_requests += 1;
            self.sink.append(line)?;
        }
        Ok(blocked)
    }

    fn transition(
        &mut self,
        host: &str,
        timestamp: DateTime<FixedOffset>,
        is_failure: bool,
    ) -> bool {
        match self.hosts.get(host).copied() {
            None => self.from_clean(host, timestamp, is_failure),

            Some(HostFailureState::Blocked { since }) => {
                if timestamp - since < self.ban_time {
                    return true;
                }
                self.hosts.remove(host);
                debug!("host {} unblocked at {}", host, timestamp);
                self.from_clean(host, timestamp, is_failure)
            }

            Some(HostFailureState::Accumulating {
                failures,
                window_start,
            }) => {
                if !is_failure {
                    self.hosts.remove(host);
                    return false;
                }

                let next = if timestamp - window_start >= self.find_time {
                    HostFailureState::Accumulating {
                        failures: 1,
                        window_start: timestamp,
                    }
                } else if failures < self.max_failures {
                    HostFailureState::Accumulating {
                        failures: failures + 1,
                        window_start,
                    }
                } else {
                    self.blocks_issued += 1;
                    info!(
                        "host {} exceeded {} failures in {}s, blocked for {}s from {}",
                        host,
                        self.max_failures,
                        self.find_time.num_seconds(),
                        self.ban_time.num_seconds(),
                        timestamp
                    );
                    HostFailureState::Blocked { since: timestamp }
                };

                let blocked = next.is_blocked();
                self.hosts.insert(host.to_string(), next);
                blocked
            }
        }
    }

    fn from_clean(&mut self, host: &str, timestamp: DateTime<FixedOffset>, is_failure: bool) -> bool {
        if is_failure {
            self.hosts.insert(
                host.to_string(),
                HostFailureState::Accumulating {
                    failures: 1,
                    window_start: timestamp,
                },
            );
        }
        false
    }

    /// Current state of `host`; `None` means clean
    pub fn host_state(&self, host: &str) -> Option<&HostFailureState> {
        self.hosts.get(host)
    }

    /// Number of hosts with a non-clean state
    pub fn tracked_hosts(&self) -> usize {
        self.hosts.len()
    }

    pub fn blocks_issued(&self) -> u64 {
        self.blocks_issued
    }

    pub fn blocked_requests(&self) -> u64 {
        self.blocked_requests
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Close the sink and hand it back
    pub fn into_sink(mut self) -> Result<S> {
        self.sink.close()?;
        Ok(self.sink)
    }
}
