//! Single-pass stream analysis
//!
//! Each record first goes through the abuse detector. Requests of blocked
//! hosts end up in the blocked sink and, unless `count_blocked_requests` is
//! set, are left out of the host, resource and window reports.

use std::io::BufRead;

use chrono::{DateTime, FixedOffset};
use tracing::{debug, info, warn};

use crate::abuse::AbuseDetector;
use crate::config::Config;
use crate::error::Result;
use crate::models::{AnalysisReport, LogRecord, RunStats};
use crate::parser::RecordParser;
use crate::sink::BlockedSink;
use crate::tally::FrequencyTally;
use crate::window::BusiestWindowTracker;

pub struct StreamAnalyzer<S> {
    parser: RecordParser,
    detector: AbuseDetector<S>,
    windows: BusiestWindowTracker,
    hosts: FrequencyTally<String>,
    resources: FrequencyTally<String>,
    top: usize,
    count_blocked: bool,
    skip_malformed: bool,
    latest: Option<DateTime<FixedOffset>>,
    stats: RunStats,
}

impl<S: BlockedSink> StreamAnalyzer<S> {
    pub fn new(config: &Config, sink: S) -> Result<Self> {
        let parser = RecordParser::with_format(&config.window.timestamp_format)?;
        let windows =
            BusiestWindowTracker::with_window(config.window.length, parser.timestamp_format())?;
        let detector = AbuseDetector::new(config.detector.clone(), sink)?;

        Ok(Self {
            parser,
            detector,
            windows,
            hosts: FrequencyTally::new(),
            resources: FrequencyTally::new(),
            top: config.report.top,
            count_blocked: config.report.count_blocked_requests,
            skip_malformed: config.report.skip_malformed,
            latest: None,
            stats: RunStats::default(),
        })
    }

    /// Read and analyze every line of `reader`; invalid UTF-8 is replaced, not rejected
    pub fn consume<R: BufRead>(&mut self, mut reader: R) -> Result<()> {
        let mut buf = Vec::new();
        let mut line_no = 0;

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            line_no += 1;
            let line = String::from_utf8_lossy(&buf);
            self.process_line(line_no, &line)?;
        }

        Ok(())
    }

    /// Parse and analyze one raw line
    pub fn process_line(&mut self, line_no: usize, raw: &str) -> Result<()> {
        self.stats.lines_read += 1;

        let line = raw.trim();
        if line.is_empty() {
            self.stats.blank_lines += 1;
            return Ok(());
        }

        let record = match self.parser.parse(line_no, line) {
            Ok(record) => record,
            Err(e) if e.is_malformed() && self.skip_malformed => {
                warn!("skipping {}", e);
                self.stats.malformed_skipped += 1;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        self.process_record(&record, line)?;
        Ok(())
    }

    /// Analyze one parsed record; `line` is what goes to the blocked sink.
    /// Returns whether the record's host is blocked.
    pub fn process_record(&mut self, record: &LogRecord, line: &str) -> Result<bool> {
        match self.latest {
            Some(latest) if record.timestamp < latest => {
                debug!(
                    "out of order timestamp {} after {} from {}",
                    record.timestamp, latest, record.host
                );
                self.stats.out_of_order += 1;
            }
            _ => self.latest = Some(record.timestamp),
        }
        self.stats.records_analyzed += 1;

        let blocked = self.detector.observe(
            &record.host,
            record.timestamp,
            record.is_failure(),
            line,
        )?;
        if blocked && !self.count_blocked {
            return Ok(true);
        }

        self.windows.record(record.timestamp);
        self.hosts.add(&record.host, 1);
        if let Some(resource) = &record.resource {
            self.resources.add(resource, record.bytes);
        }

        Ok(blocked)
    }

    /// Finish the stream: flush the window tracker, close the sink, build the reports
    pub fn finish(self) -> Result<(AnalysisReport, S)> {
        let windows = self.windows.finalize();

        let stats = RunStats {
            blocked_requests: self.detector.blocked_requests(),
            blocks_issued: self.detector.blocks_issued(),
            distinct_hosts: self.hosts.len() as u64,
            distinct_resources: self.resources.len() as u64,
            ..self.stats
        };

        if stats.out_of_order > 0 {
            warn!(
                "{} records were older than an earlier record; window and block results may be off",
                stats.out_of_order
            );
        }

        let report = AnalysisReport {
            top_hosts: self.hosts.top_ranked(self.top),
            top_resources: self.resources.top_ranked(self.top),
            busiest_windows: windows.top(self.top),
            stats,
        };

        let sink = self.detector.into_sink()?;

        info!(
            "analyzed {} records from {} hosts, {} blocks issued, {} blocked requests",
            report.stats.records_analyzed,
            report.stats.distinct_hosts,
            report.stats.blocks_issued,
            report.stats.blocked_requests
        );

        Ok((report, sink))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalyzerError;
    use crate::models::Ranked;
    use crate::sink::MemorySink;

    fn log_line(host: &str, time: &str, path: &str, status: u16, bytes: &str) -> String {
        format!(
            r#"{} - - [01/Jul/1995:{} -0400] "GET {} HTTP/1.0" {} {}"#,
            host, time, path, status, bytes
        )
    }

    fn analyzer(config: &Config) -> StreamAnalyzer<MemorySink> {
        StreamAnalyzer::new(config, MemorySink::new()).unwrap()
    }

    fn feed(analyzer: &mut StreamAnalyzer<MemorySink>, lines: &[String]) {
        for (i, line) in lines.iter().enumerate() {
            analyzer.process_line(i + 1, line).unwrap();
        }
    }

    #[test]
    fn test_counts_hosts_resources_windows() {
        let mut a = analyzer(&Config::default());
        feed(
            &mut a,
            &[
                log_line("a", "00:00:01", "/index.html", 200, "100"),
                log_line("b", "00:00:02", "/big.gif", 200, "5000"),
                log_line("a", "00:00:03", "/index.html", 200, "100"),
                log_line("c", "00:00:04", "/index.html", 304, "-"),
            ],
        );

        let (report, sink) = a.finish().unwrap();
        assert!(sink.is_closed());
        assert!(sink.lines().is_empty());

        assert_eq!(
            report.top_hosts,
            vec![Ranked::new("a", 2), Ranked::new("b", 1), Ranked::new("c", 1)]
        );
        assert_eq!(
            report.top_resources,
            vec![Ranked::new("/big.gif", 5000), Ranked::new("/index.html", 200)]
        );
        assert_eq!(
            report.busiest_windows[0],
            Ranked::new("01/Jul/1995:00:00:01 -0400", 4)
        );
        assert_eq!(report.stats.records_analyzed, 4);
        assert_eq!(report.stats.distinct_resources, 2);
    }

    #[test]
    fn test_blocked_requests_are_not_counted() {
        let mut a = analyzer(&Config::default());
        let lines = vec![
            log_line("bad", "00:00:00", "/login", 401, "10"),
            log_line("bad", "00:00:05", "/login", 401, "10"),
            log_line("bad", "00:00:10", "/login", 401, "10"),
            log_line("bad", "00:00:15", "/login", 401, "10"),
            log_line("bad", "00:01:00", "/index.html", 200, "999"),
            log_line("good", "00:01:01", "/index.html", 200, "1"),
        ];
        feed(&mut a, &lines);

        let (report, sink) = a.finish().unwrap();
        assert_eq!(sink.lines(), &[lines[3].clone(), lines[4].clone()]);
        assert_eq!(
            report.top_hosts,
            vec![Ranked::new("bad", 3), Ranked::new("good", 1)]
        );
        assert_eq!(
            report.top_resources,
            vec![Ranked::new("/login", 30), Ranked::new("/index.html", 1)]
        );
        assert_eq!(report.busiest_windows[0].value, 4);
        assert_eq!(report.stats.blocks_issued, 1);
        assert_eq!(report.stats.blocked_requests, 2);
    }

    #[test]
    fn test_count_blocked_requests_option() {
        let mut config = Config::default();
        config.report.count_blocked_requests = true;
        let mut a = analyzer(&config);
        feed(
            &mut a,
            &[
                log_line("bad", "00:00:00", "/login", 401, "10"),
                log_line("bad", "00:00:01", "/login", 401, "10"),
                log_line("bad", "00:00:02", "/login", 401, "10"),
                log_line("bad", "00:00:03", "/login", 401, "10"),
            ],
        );

        let (report, sink) = a.finish().unwrap();
        assert_eq!(sink.lines().len(), 1);
        assert_eq!(report.top_hosts, vec![Ranked::new("bad", 4)]);
    }

    #[test]
    fn test_blank_lines_skipped() {
        let mut a = analyzer(&Config::default());
        a.process_line(1, "").unwrap();
        a.process_line(2, "   \r\n").unwrap();
        a.process_line(3, &log_line("a", "00:00:01", "/", 200, "1")).unwrap();

        let (report, _) = a.finish().unwrap();
        assert_eq!(report.stats.lines_read, 3);
        assert_eq!(report.stats.blank_lines, 2);
        assert_eq!(report.stats.records_analyzed, 1);
    }

    #[test]
    fn test_malformed_line_is_fatal_by_default() {
        let mut a = analyzer(&Config::default());
        let err = a.process_line(5, "garbage").unwrap_err();
        assert!(matches!(err, AnalyzerError::MalformedRecord { line: 5, .. }));
    }

    #[test]
    fn test_skip_malformed() {
        let mut config = Config::default();
        config.report.skip_malformed = true;
        let mut a = analyzer(&config);
        a.process_line(1, "garbage").unwrap();
        a.process_line(2, &log_line("a", "00:00:01", "/", 200, "1")).unwrap();

        let (report, _) = a.finish().unwrap();
        assert_eq!(report.stats.malformed_skipped, 1);
        assert_eq!(report.stats.records_analyzed, 1);
    }

    #[test]
    fn test_invalid_timestamp_is_fatal_even_when_skipping() {
        let mut config = Config::default();
        config.report.skip_malformed = true;
        let mut a = analyzer(&config);
        let err = a
            .process_line(8, r#"a - - [not a time] "GET / HTTP/1.0" 200 1"#)
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::InvalidTimestamp { line: 8, .. }));
    }

    #[test]
    fn test_out_of_order_is_counted() {
        let mut a = analyzer(&Config::default());
        feed(
            &mut a,
            &[
                log_line("a", "00:00:05", "/", 200, "1"),
                log_line("a", "00:00:01", "/", 200, "1"),
                log_line("a", "00:00:06", "/", 200, "1"),
            ],
        );
        let (report, _) = a.finish().unwrap();
        assert_eq!(report.stats.out_of_order, 1);
    }

    #[test]
    fn test_consume_lossy_input() {
        let mut input = log_line("a", "00:00:01", "/caf\u{e9}", 200, "1").into_bytes();
        input.push(b'\n');
        input.extend_from_slice(b"b - - [01/Jul/1995:00:00:02 -0400] \"GET /\xff HTTP/1.0\" 200 2\n");

        let mut a = analyzer(&Config::default());
        a.consume(&input[..]).unwrap();

        let (report, _) = a.finish().unwrap();
        assert_eq!(report.stats.records_analyzed, 2);
        assert_eq!(report.top_resources[0], Ranked::new("/\u{fffd}", 2));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut zero_window = Config::default();
        zero_window.window.length = 0;

        let mut huge_ban = Config::default();
        huge_ban.detector.ban_time = u64::MAX;

        let mut no_failures = Config::default();
        no_failures.detector.max_failures = 0;

        for config in [zero_window, huge_ban, no_failures] {
            assert!(matches!(
                StreamAnalyzer::new(&config, MemorySink::new()),
                Err(AnalyzerError::InvalidConfig(_))
            ));
        }
    }
}
