//! Destinations for requests made by blocked hosts

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{AnalyzerError, Result};

/// Receives the verbatim log lines of blocked requests
pub trait BlockedSink {
    /// Append one line (without trailing newline)
    fn append(&mut self, line: &str) -> Result<()>;

    /// Flush everything written so far; the sink must not be used afterwards
    fn close(&mut self) -> Result<()>;
}

/// Buffered file sink, flushed on close and on drop
pub struct FileSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    lines: u64,
}

impl FileSink {
    /// Create (or truncate) the file at `path`
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| AnalyzerError::Output {
            path: path.clone(),
            source,
        })?;

        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            lines: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines_written(&self) -> u64 {
        self.lines
    }
}

impl BlockedSink for FileSink {
    fn append(&mut self, line: &str) -> Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            AnalyzerError::Sink(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "sink already closed",
            ))
        })?;
        writeln!(writer, "{}", line).map_err(AnalyzerError::Sink)?;
        self.lines += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(AnalyzerError::Sink)?;
            debug!(
                "closed blocked sink {} ({} lines)",
                self.path.display(),
                self.lines
            );
        }
        Ok(())
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush() {
                warn!("failed to flush {}: {}", self.path.display(), e);
            }
        }
    }
}

/// In-memory sink, mostly for tests and library callers
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    lines: Vec<String>,
    closed: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

impl BlockedSink for MemorySink {
    fn append(&mut self, line: &str) -> Result<()> {
        self.lines.push(line.to_string());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
