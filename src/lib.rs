pub mod abuse;
pub mod analyzer;
pub mod config;
pub mod error;
pub mod models;
pub mod parser;
pub mod report;
pub mod sink;
pub mod tally;
pub mod window;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tracing::info;

use analyzer::StreamAnalyzer;
use config::Config;
use error::{AnalyzerError, Result};
use models::AnalysisReport;
use report::ReportWriter;
use sink::FileSink;

/// One analysis run over an access log file
pub struct LogAnalyzer {
    config: Config,
}

impl LogAnalyzer {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Analyze the configured input and write all reports
    ///
    /// Output files are truncated on open, so a failed run can simply be
    /// repeated. The blocked file is flushed on every exit path.
    pub fn run(&self) -> Result<AnalysisReport> {
        let paths = &self.config.paths;
        info!("analyzing {}", paths.input.display());

        let input = open_input(&paths.input)?;
        let sink = FileSink::create(&paths.blocked)?;

        let mut analyzer = StreamAnalyzer::new(&self.config, sink)?;
        analyzer.consume(BufReader::new(input))?;
        let (report, sink) = analyzer.finish()?;

        ReportWriter::new(paths).write_all(&report)?;

        info!(
            "reports written to {}, {}, {}; {} blocked lines in {}",
            paths.hosts.display(),
            paths.resources.display(),
            paths.hours.display(),
            sink.lines_written(),
            sink.path().display()
        );

        Ok(report)
    }
}

fn open_input(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| AnalyzerError::Input {
        path: path.to_path_buf(),
        source,
    })
}
