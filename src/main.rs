//! Congestion-control experiment analysis CLI.
//!
//! Summarizes fairness of single-protocol runs, bandwidth shares of mixed
//! NSCC/CUBIC runs, and the time-series dynamics of a single trace.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use env_logger::Env;
use log::info;

use cc_analyzer::analysis::{self, coexistence, fairness, report};
use cc_analyzer::config::{load_config, AnalysisConfig};
use cc_analyzer::error::UsageError;

#[derive(Parser, Debug)]
#[command(name = "cc-analyzer")]
#[command(about = "Fairness and coexistence analysis for congestion-control experiments")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to an analysis configuration YAML file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compare NSCC and CUBIC fairness across single-protocol logs
    Fairness {
        /// Directory holding <protocol>_<topology>_fairness_<workload>.log files
        results_dir: PathBuf,

        /// Output CSV (default: <results_dir>/fairness_metrics.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Summarize mixed NSCC + CUBIC runs from per-flow CSVs
    Coexist {
        /// Directory holding scen<X>_..._ratio<NNN>_....csv files
        results_dir: PathBuf,

        /// Also write the text summary to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the summary table as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Derive rolling goodput and bandwidth shares from a trace CSV
    Timeseries {
        /// Time-series trace CSV
        trace: PathBuf,

        /// Output JSON (default: <trace stem>_derived.json next to the trace)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level)).init();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AnalysisConfig::default(),
    };

    match cli.command {
        Commands::Fairness { results_dir, output } => run_fairness(&results_dir, output, &config),
        Commands::Coexist {
            results_dir,
            output,
            csv,
        } => run_coexist(&results_dir, output.as_deref(), csv.as_deref(), &config),
        Commands::Timeseries { trace, output } => run_timeseries(&trace, output, &config),
    }
}

fn run_fairness(
    results_dir: &Path,
    output: Option<PathBuf>,
    config: &AnalysisConfig,
) -> Result<()> {
    info!("Analyzing fairness results in {}", results_dir.display());
    let results = fairness::analyze_results_dir(results_dir, &config.fairness)?;

    report::print_fairness_report(&results);

    let output = output.unwrap_or_else(|| results_dir.join(&config.fairness.output_file_name));
    report::write_fairness_csv(&results, &output)?;
    Ok(())
}

fn run_coexist(
    results_dir: &Path,
    output: Option<&Path>,
    csv: Option<&Path>,
    config: &AnalysisConfig,
) -> Result<()> {
    info!("Analyzing coexistence results in {}", results_dir.display());
    let results = coexistence::analyze_results_dir(results_dir)?;

    let lines = report::coexistence_report_lines(&results, &config.coexistence);
    for line in &lines {
        println!("{}", line);
    }

    if let Some(path) = output {
        report::write_text_report(&lines, path)?;
    }
    if let Some(path) = csv {
        report::write_coexistence_csv(&results, path)?;
    }
    Ok(())
}

fn run_timeseries(
    trace_path: &Path,
    output: Option<PathBuf>,
    config: &AnalysisConfig,
) -> Result<()> {
    if !trace_path.is_file() {
        return Err(UsageError::FileNotFound {
            path: trace_path.to_path_buf(),
        }
        .into());
    }

    info!("Analyzing trace {}", trace_path.display());
    let trace = analysis::read_trace(trace_path, &config.timeseries)?;
    let derived = analysis::analyze_trace(&trace, &config.timeseries);

    report::print_trace_digest(&derived);

    let output = output.unwrap_or_else(|| default_json_path(trace_path));
    report::generate_timeseries_json(&derived, trace_path, &output)?;
    Ok(())
}

/// `<dir>/<stem>_derived.json` for a trace at `<dir>/<stem>.csv`
fn default_json_path(trace_path: &Path) -> PathBuf {
    let stem = trace_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "trace".to_string());
    trace_path.with_file_name(format!("{}_derived.json", stem))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["cc-analyzer", "fairness", "results"]);
        assert_eq!(cli.log_level, "info");
        assert!(cli.config.is_none());
        match cli.command {
            Commands::Fairness { results_dir, output } => {
                assert_eq!(results_dir, PathBuf::from("results"));
                assert!(output.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_coexist_args() {
        let cli = Cli::parse_from([
            "cc-analyzer",
            "--config",
            "analysis.yaml",
            "coexist",
            "mixed",
            "-o",
            "summary.txt",
            "--csv",
            "summary.csv",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("analysis.yaml")));
        match cli.command {
            Commands::Coexist { results_dir, output, csv } => {
                assert_eq!(results_dir, PathBuf::from("mixed"));
                assert_eq!(output, Some(PathBuf::from("summary.txt")));
                assert_eq!(csv, Some(PathBuf::from("summary.csv")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_missing_results_dir_is_rejected() {
        assert!(Cli::try_parse_from(["cc-analyzer", "fairness"]).is_err());
    }

    #[test]
    fn test_default_json_path() {
        assert_eq!(
            default_json_path(Path::new("runs/trace_a.csv")),
            PathBuf::from("runs/trace_a_derived.json")
        );
    }
}
