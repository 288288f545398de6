use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("line {line}: malformed record: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("line {line}: unparseable timestamp '{value}'")]
    InvalidTimestamp { line: usize, value: String },

    #[error("invalid timestamp format '{0}'")]
    TimestampFormat(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid record pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("failed to read {}: {source}", .path.display())]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("blocked sink error: {0}")]
    Sink(#[source] std::io::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnalyzerError {
    /// Whether the run can carry on past this error when malformed lines are skipped
    pub fn is_malformed(&self) -> bool {
        matches!(self, AnalyzerError::MalformedRecord { .. })
    }
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;
