use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tabled::{Table, Tabled};

use accesswatch::config::Config;
use accesswatch::models::{AnalysisReport, Ranked};
use accesswatch::LogAnalyzer;

#[derive(Parser)]
#[command(name = "accesswatch")]
#[command(author, version, about = "Access log analyzer: busiest hosts, heaviest resources, busiest hours, abusive hosts")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze an access log and write the reports
    Analyze {
        /// Access log to read [default: log_input/log.txt]
        input: Option<PathBuf>,

        /// Busiest hosts output [default: log_output/hosts.txt]
        hosts: Option<PathBuf>,

        /// Busiest hours output [default: log_output/hours.txt]
        hours: Option<PathBuf>,

        /// Heaviest resources output [default: log_output/resources.txt]
        resources: Option<PathBuf>,

        /// Blocked requests output [default: log_output/blocked.txt]
        blocked: Option<PathBuf>,

        /// Entries per report (overrides config)
        #[arg(short, long)]
        top: Option<usize>,

        /// Summary format printed after the run (table, json, quiet)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Generate default configuration file
    GenConfig {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Table row for a ranked report entry
#[derive(Tabled)]
struct RankRow {
    #[tabled(rename = "#")]
    rank: usize,
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Value")]
    value: u64,
}

/// Load the configuration the same way every command does
pub fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::load(path),
        None => Config::load_or_default(),
    }
}

pub fn run_command(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Analyze {
            input,
            hosts,
            hours,
            resources,
            blocked,
            top,
            format,
        } => {
            let mut config = config;
            let paths = &mut config.paths;
            // positional arguments override the [paths] section
            if let Some(p) = input {
                paths.input = p;
            }
            if let Some(p) = hosts {
                paths.hosts = p;
            }
            if let Some(p) = hours {
                paths.hours = p;
            }
            if let Some(p) = resources {
                paths.resources = p;
            }
            if let Some(p) = blocked {
                paths.blocked = p;
            }
            if let Some(top) = top {
                config.report.top = top;
            }
            cmd_analyze(config, format)
        }
        Commands::GenConfig { output } => cmd_gen_config(output),
    }
}

fn cmd_analyze(config: Config, format: String) -> Result<()> {
    let analyzer = LogAnalyzer::new(config);
    let report = analyzer.run()?;

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "quiet" => {}
        _ => print_summary(&report),
    }

    Ok(())
}

fn print_summary(report: &AnalysisReport) {
    let stats = &report.stats;

    println!("{}", "=== accesswatch Summary ===".bold());
    println!();
    println!("Lines read:        {}", stats.lines_read);
    println!("Records analyzed:  {}", stats.records_analyzed);
    println!("Distinct hosts:    {}", stats.distinct_hosts);
    println!(
        "Blocks issued:     {}",
        stats.blocks_issued.to_string().yellow()
    );
    println!(
        "Blocked requests:  {}",
        stats.blocked_requests.to_string().yellow()
    );
    if stats.malformed_skipped > 0 {
        println!(
            "Malformed skipped: {}",
            stats.malformed_skipped.to_string().red()
        );
    }
    if stats.out_of_order > 0 {
        println!(
            "{}",
            format!("Out of order:      {}", stats.out_of_order).red()
        );
    }

    print_ranking("Busiest Hosts:", &report.top_hosts);
    print_ranking("Heaviest Resources (bytes):", &report.top_resources);
    print_ranking("Busiest Hours:", &report.busiest_windows);
}

fn print_ranking(title: &str, entries: &[Ranked]) {
    if entries.is_empty() {
        return;
    }

    let rows: Vec<RankRow> = entries
        .iter()
        .enumerate()
        .map(|(i, r)| RankRow {
            rank: i + 1,
            key: r.key.clone(),
            value: r.value,
        })
        .collect();

    println!("\n{}", title.bold());
    println!("{}", Table::new(rows));
}

fn cmd_gen_config(output: Option<PathBuf>) -> Result<()> {
    let config = Config::default();

    match output {
        Some(path) => {
            config.save(&path)?;
            println!("Configuration written to {}", path.display());
        }
        None => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
