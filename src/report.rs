//! Report file rendering

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::config::PathsConfig;
use crate::error::{AnalyzerError, Result};
use crate::models::{AnalysisReport, Ranked};

/// Writes the hosts, resources and hours reports
pub struct ReportWriter<'a> {
    paths: &'a PathsConfig,
}

impl<'a> ReportWriter<'a> {
    pub fn new(paths: &'a PathsConfig) -> Self {
        Self { paths }
    }

    pub fn write_all(&self, report: &AnalysisReport) -> Result<()> {
        write_lines(&self.paths.hosts, &render_hosts(&report.top_hosts))?;
        write_lines(&self.paths.resources, &render_resources(&report.top_resources))?;
        write_lines(&self.paths.hours, &render_windows(&report.busiest_windows))?;
        Ok(())
    }
}

/// `host,hits` per line
pub fn render_hosts(hosts: &[Ranked]) -> Vec<String> {
    hosts.iter().map(|r| format!("{},{}", r.key, r.value)).collect()
}

/// Resource names only, heaviest first
pub fn render_resources(resources: &[Ranked]) -> Vec<String> {
    resources.iter().map(|r| r.key.clone()).collect()
}

/// `anchor,count` per line
pub fn render_windows(windows: &[Ranked]) -> Vec<String> {
    windows.iter().map(|r| format!("{},{}", r.key, r.value)).collect()
}

fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    let output_err = |source| AnalyzerError::Output {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(output_err)?;
    let mut writer = BufWriter::new(file);
    for line in lines {
        writeln!(writer, "{}", line).map_err(output_err)?;
    }
    writer.flush().map_err(output_err)?;

    debug!("wrote {} lines to {}", lines.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> AnalysisReport {
        AnalysisReport {
            top_hosts: vec![Ranked::new("a.example", 3), Ranked::new("10.0.0.1", 1)],
            top_resources: vec![Ranked::new("/big.gif", 9000), Ranked::new("/", 10)],
            busiest_windows: vec![Ranked::new("01/Jul/1995:00:00:01 -0400", 4)],
            ..Default::default()
        }
    }

    #[test]
    fn test_render() {
        let report = sample();
        assert_eq!(render_hosts(&report.top_hosts), vec!["a.example,3", "10.0.0.1,1"]);
        assert_eq!(render_resources(&report.top_resources), vec!["/big.gif", "/"]);
        assert_eq!(
            render_windows(&report.busiest_windows),
            vec!["01/Jul/1995:00:00:01 -0400,4"]
        );
    }

    #[test]
    fn test_write_all() {
        let temp = TempDir::new().unwrap();
        let paths = PathsConfig {
            input: temp.path().join("log.txt"),
            hosts: temp.path().join("hosts.txt"),
            hours: temp.path().join("hours.txt"),
            resources: temp.path().join("resources.txt"),
            blocked: temp.path().join("blocked.txt"),
        };

        ReportWriter::new(&paths).write_all(&sample()).unwrap();

        assert_eq!(
            std::fs::read_to_string(&paths.hosts).unwrap(),
            "a.example,3\n10.0.0.1,1\n"
        );
        assert_eq!(
            std::fs::read_to_string(&paths.resources).unwrap(),
            "/big.gif\n/\n"
        );
        assert_eq!(
            std::fs::read_to_string(&paths.hours).unwrap(),
            "01/Jul/1995:00:00:01 -0400,4\n"
        );
    }

    #[test]
    fn test_empty_report_writes_empty_files() {
        let temp = TempDir::new().unwrap();
        let paths = PathsConfig {
            input: temp.path().join("log.txt"),
            hosts: temp.path().join("hosts.txt"),
            hours: temp.path().join("hours.txt"),
            resources: temp.path().join("resources.txt"),
            blocked: temp.path().join("blocked.txt"),
        };

        ReportWriter::new(&paths)
            .write_all(&AnalysisReport::default())
            .unwrap();
        assert_eq!(std::fs::read_to_string(&paths.hours).unwrap(), "");
    }
}
