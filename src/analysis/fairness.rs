//! Single-protocol fairness analysis.
//!
//! Each log in a results directory holds the flows of one protocol running
//! alone on one topology/workload. Logs are grouped by topology/workload so
//! NSCC and CUBIC can be compared side by side.

use std::path::Path;

use color_eyre::eyre::Result;

use super::log_parser::{parse_log_file, FlowLogDialect};
use super::metrics::{
    coefficient_of_variation, jains_fairness, mean, min_max_ratio, percentile_interpolated,
};
use super::naming::parse_experiment_file_name;
use super::types::*;
use crate::config::FairnessConfig;
use crate::error::UsageError;
use crate::utils::{file_name_str, require_input_files};

/// Extension of single-protocol completion logs
pub const LOG_EXTENSION: &str = "log";

/// Summarize one experiment's flows; `None` when there are none.
///
/// Throughput statistics only consider flows with a positive completion
/// time; FCT statistics and the flow count include every flow.
pub fn summarize_flows(flows: &[FlowRecord]) -> Option<ExperimentSummary> {
    if flows.is_empty() {
        return None;
    }

    let throughputs: Vec<f64> = flows
        .iter()
        .filter(|f| f.has_completion_time())
        .map(|f| f.throughput)
        .collect();
    let fcts: Vec<f64> = flows.iter().map(|f| f.completion_time_ms).collect();

    Some(ExperimentSummary {
        num_flows: flows.len(),
        jains_fairness: jains_fairness(&throughputs),
        cv: coefficient_of_variation(&throughputs),
        min_max_ratio: min_max_ratio(&throughputs),
        mean_throughput_mbps: mean(&throughputs),
        fct_p50_ms: percentile_interpolated(&fcts, 50.0),
        fct_p95_ms: percentile_interpolated(&fcts, 95.0),
        fct_p99_ms: percentile_interpolated(&fcts, 99.0),
        fct_mean_ms: mean(&fcts),
        fct_min_ms: fcts.iter().copied().fold(f64::INFINITY, f64::min),
        fct_max_ms: fcts.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    })
}

/// Parse and summarize a single experiment log
pub fn analyze_experiment(
    log_path: &Path,
    protocol: Protocol,
    config: &FairnessConfig,
) -> Result<Option<ExperimentSummary>> {
    let dialect = FlowLogDialect::for_protocol(protocol, config.default_flow_size_bytes);
    let flows = parse_log_file(log_path, dialect)?;
    Ok(summarize_flows(&flows))
}

/// Analyze every experiment log in a results directory.
///
/// Fails when the directory is missing, holds no `.log` file, or none of
/// its logs yields a summary. Individual logs with unexpected names, no
/// flows or read errors are skipped with a warning.
pub fn analyze_results_dir(results_dir: &Path, config: &FairnessConfig) -> Result<FairnessResults> {
    let log_files = require_input_files(results_dir, LOG_EXTENSION)?;
    log::info!("Found {} log files in {}", log_files.len(), results_dir.display());

    let mut results = FairnessResults::new();

    for log_path in &log_files {
        let file_name = file_name_str(log_path);
        let Some(key) = parse_experiment_file_name(file_name) else {
            log::warn!(
                "Skipping {}: expected <protocol>_<topology>_fairness_<workload>.log",
                file_name
            );
            continue;
        };

        let summary = match analyze_experiment(log_path, key.protocol, config) {
            Ok(Some(summary)) => summary,
            Ok(None) => {
                log::warn!("No flows found in {}", file_name);
                continue;
            }
            Err(e) => {
                log::warn!("Failed to analyze {}: {:#}", log_path.display(), e);
                continue;
            }
        };

        let experiment = key.experiment();
        log::info!(
            "Analyzed: {} - {} ({} flows)",
            key.protocol,
            experiment,
            summary.num_flows
        );

        let previous = results
            .entry(experiment.clone())
            .or_default()
            .insert(key.protocol, summary);
        if previous.is_some() {
            log::warn!(
                "Duplicate {} results for {}; keeping {}",
                key.protocol,
                experiment,
                file_name
            );
        }
    }

    if results.is_empty() {
        return Err(UsageError::NoValidResults {
            dir: results_dir.to_path_buf(),
        }
        .into());
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(id: u64, fct_ms: f64, throughput: f64) -> FlowRecord {
        FlowRecord {
            flow_id: id,
            protocol: Protocol::Nscc,
            size_bytes: 1000,
            completion_time_ms: fct_ms,
            throughput,
            bytes_received: 1000,
            finished: true,
            retransmits: 0,
        }
    }

    #[test]
    fn test_summary_of_equal_flows() {
        let flows: Vec<FlowRecord> = (1..=4).map(|i| flow(i, i as f64, 100.0)).collect();
        let summary = summarize_flows(&flows).unwrap();

        assert_eq!(summary.num_flows, 4);
        assert_eq!(summary.jains_fairness, 1.0);
        assert_eq!(summary.cv, 0.0);
        assert_eq!(summary.min_max_ratio, 1.0);
        assert_eq!(summary.mean_throughput_mbps, 100.0);
        assert_eq!(summary.fct_p50_ms, 2.5);
        assert_eq!(summary.fct_mean_ms, 2.5);
        assert_eq!(summary.fct_min_ms, 1.0);
        assert_eq!(summary.fct_max_ms, 4.0);
    }

    #[test]
    fn test_unfinished_flows_excluded_from_throughput() {
        let flows = vec![flow(1, 2.0, 50.0), flow(2, 2.0, 50.0), flow(3, 0.0, 0.0)];
        let summary = summarize_flows(&flows).unwrap();

        assert_eq!(summary.num_flows, 3);
        assert_eq!(summary.jains_fairness, 1.0);
        assert_eq!(summary.min_max_ratio, 1.0);
        assert_eq!(summary.mean_throughput_mbps, 50.0);
        assert_eq!(summary.fct_min_ms, 0.0);
    }

    #[test]
    fn test_empty_flows_have_no_summary() {
        assert!(summarize_flows(&[]).is_none());
    }
}
