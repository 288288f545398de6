//! Access log record parsing
//!
//! Turns one line of a common/combined access log into a [`LogRecord`]:
//!
//! ```text
//! host - - [01/Jul/1995:00:00:01 -0400] "GET /history/apollo/ HTTP/1.0" 200 6245
//! ```
//!
//! Only the timestamp is mandatory beyond the basic line shape. A garbled
//! status becomes `None`, a garbled or `-` size becomes 0 and a request line
//! without quotes or path yields no resource.

use chrono::format::{Item, StrftimeItems};
use chrono::DateTime;
use regex::Regex;
use tracing::debug;

use crate::error::{AnalyzerError, Result};
use crate::models::{LogRecord, DEFAULT_TIMESTAMP_FORMAT};

const LINE_PATTERN: &str = r"^(?P<host>.*?) - - \[(?P<timestamp>[^\]]*)\] (?:(?P<request>.*)\s+)?(?P<status>\S+)\s+(?P<size>\S+)$";

// Some logs carry typographic quotes around the request line
const REQUEST_PATTERN: &str = r#"^["“](?P<inner>.+)["”]"#;

/// Status code that marks a request line the server could not make sense of
const BAD_REQUEST: u16 = 400;

/// Compiled access log parser
#[derive(Debug, Clone)]
pub struct RecordParser {
    line: Regex,
    request: Regex,
    timestamp_format: String,
}

impl RecordParser {
    /// Parser for the standard `%d/%b/%Y:%H:%M:%S %z` timestamp layout
    pub fn new() -> Result<Self> {
        Self::with_format(DEFAULT_TIMESTAMP_FORMAT)
    }

    /// Parser for a custom strftime timestamp layout
    pub fn with_format(timestamp_format: &str) -> Result<Self> {
        let invalid = timestamp_format.is_empty()
            || StrftimeItems::new(timestamp_format).any(|item| matches!(item, Item::Error));
        if invalid {
            return Err(AnalyzerError::TimestampFormat(timestamp_format.to_string()));
        }

        Ok(Self {
            line: Regex::new(LINE_PATTERN)?,
            request: Regex::new(REQUEST_PATTERN)?,
            timestamp_format: timestamp_format.to_string(),
        })
    }

    pub fn timestamp_format(&self) -> &str {
        &self.timestamp_format
    }

    /// Parse a single (already trimmed) log line; `line_no` is used for error reporting
    pub fn parse(&self, line_no: usize, line: &str) -> Result<LogRecord> {
        let captures = self
            .line
            .captures(line)
            .ok_or_else(|| AnalyzerError::MalformedRecord {
                line: line_no,
                reason: "expected `host - - [timestamp] request status size`".to_string(),
            })?;

        let host = captures.name("host").map(|m| m.as_str()).unwrap_or_default();
        if host.is_empty() {
            return Err(AnalyzerError::MalformedRecord {
                line: line_no,
                reason: "missing host".to_string(),
            });
        }

        let raw_timestamp = captures
            .name("timestamp")
            .map(|m| m.as_str())
            .unwrap_or_default();
        let timestamp = DateTime::parse_from_str(raw_timestamp, &self.timestamp_format)
            .map_err(|_| AnalyzerError::InvalidTimestamp {
                line: line_no,
                value: raw_timestamp.to_string(),
            })?;

        let status = captures
            .name("status")
            .and_then(|m| parse_status(m.as_str()));

        if status == Some(BAD_REQUEST) {
            return Ok(LogRecord {
                host: host.to_string(),
                timestamp,
                resource: None,
                status,
                bytes: 0,
            });
        }

        let bytes = captures
            .name("size")
            .map(|m| parse_size(line_no, m.as_str()))
            .unwrap_or(0);

        let resource = captures
            .name("request")
            .and_then(|m| self.resource_of(m.as_str()));

        Ok(LogRecord {
            host: host.to_string(),
            timestamp,
            resource,
            status,
            bytes,
        })
    }

    /// Second token of the quoted request line (`METHOD PATH PROTOCOL`)
    fn resource_of(&self, request: &str) -> Option<String> {
        let inner = self.request.captures(request)?.name("inner")?.as_str();
        inner.split_whitespace().nth(1).map(str::to_string)
    }
}

fn parse_status(raw: &str) -> Option<u16> {
    if raw.len() != 3 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

fn parse_size(line_no: usize, raw: &str) -> u64 {
    if raw == "-" {
        return 0;
    }
    raw.parse().unwrap_or_else(|_| {
        debug!("line {}: unparseable size '{}', counting 0 bytes", line_no, raw);
        0
    })
}
