//! Report generation: console tables, persisted CSV tables and JSON exports.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use color_eyre::eyre::{Context, Result};
use serde::Serialize;

use super::timeseries::{TimeSeriesAnalysis, TraceDigest};
use super::types::*;
use crate::config::CoexistenceConfig;

/// Which direction of a metric is an improvement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Better {
    Higher,
    Lower,
}

/// One row of the NSCC vs CUBIC comparison table
struct MetricRow {
    label: &'static str,
    value: fn(&ExperimentSummary) -> f64,
    /// Decimal places; `None` renders an integer
    precision: Option<usize>,
    better: Option<Better>,
}

const METRIC_ROWS: [MetricRow; 11] = [
    MetricRow {
        label: "Jain's Fairness Index",
        value: |s| s.jains_fairness,
        precision: Some(4),
        better: Some(Better::Higher),
    },
    MetricRow {
        label: "Coefficient of Variation",
        value: |s| s.cv,
        precision: Some(4),
        better: Some(Better::Lower),
    },
    MetricRow {
        label: "Min/Max Ratio",
        value: |s| s.min_max_ratio,
        precision: Some(4),
        better: Some(Better::Higher),
    },
    MetricRow {
        label: "Mean Throughput (Mbps)",
        value: |s| s.mean_throughput_mbps,
        precision: Some(2),
        better: Some(Better::Higher),
    },
    MetricRow {
        label: "FCT P50 (ms)",
        value: |s| s.fct_p50_ms,
        precision: Some(3),
        better: Some(Better::Lower),
    },
    MetricRow {
        label: "FCT P95 (ms)",
        value: |s| s.fct_p95_ms,
        precision: Some(3),
        better: Some(Better::Lower),
    },
    MetricRow {
        label: "FCT P99 (ms)",
        value: |s| s.fct_p99_ms,
        precision: Some(3),
        better: Some(Better::Lower),
    },
    MetricRow {
        label: "FCT Mean (ms)",
        value: |s| s.fct_mean_ms,
        precision: Some(3),
        better: Some(Better::Lower),
    },
    MetricRow {
        label: "FCT Min (ms)",
        value: |s| s.fct_min_ms,
        precision: Some(3),
        better: Some(Better::Lower),
    },
    MetricRow {
        label: "FCT Max (ms)",
        value: |s| s.fct_max_ms,
        precision: Some(3),
        better: Some(Better::Lower),
    },
    MetricRow {
        label: "Number of Flows",
        value: |s| s.num_flows as f64,
        precision: None,
        better: None,
    },
];

fn format_value(value: f64, precision: Option<usize>, signed: bool) -> String {
    match (precision, signed) {
        (Some(p), false) => format!("{:.*}", p, value),
        (Some(p), true) => format!("{:+.*}", p, value),
        (None, false) => format!("{}", value as i64),
        (None, true) => format!("{:+}", value as i64),
    }
}

/// Render rows as left-aligned columns separated by two spaces, with a
/// dashed rule under the header
fn render_table(headers: &[&str], rows: &[Vec<String>]) -> Vec<String> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let render = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{:<width$}", cell, width = *w))
            .collect::<Vec<_>>()
            .join("  ")
    };

    let mut lines = vec![render(headers.to_vec())];
    lines.push(widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("  "));
    for row in rows {
        lines.push(render(row.iter().map(String::as_str).collect()));
    }
    lines
}

/// NSCC vs CUBIC comparison table for one experiment
pub fn comparison_table(protocols: &BTreeMap<Protocol, ExperimentSummary>) -> Vec<String> {
    let nscc = protocols.get(&Protocol::Nscc);
    let cubic = protocols.get(&Protocol::Cubic);

    let rows: Vec<Vec<String>> = METRIC_ROWS
        .iter()
        .map(|row| {
            let nscc_val = nscc.map(row.value).unwrap_or(0.0);
            let cubic_val = cubic.map(row.value).unwrap_or(0.0);
            let both = nscc_val != 0.0 && cubic_val != 0.0;
            let diff = if both { nscc_val - cubic_val } else { 0.0 };

            let better = match row.better {
                Some(Better::Higher) if both => {
                    if nscc_val > cubic_val { "NSCC" } else { "CUBIC" }
                }
                Some(Better::Lower) if both => {
                    if nscc_val < cubic_val { "NSCC" } else { "CUBIC" }
                }
                _ => "",
            };

            vec![
                row.label.to_string(),
                format_value(nscc_val, row.precision, false),
                format_value(cubic_val, row.precision, false),
                format_value(diff, row.precision, true),
                better.to_string(),
            ]
        })
        .collect();

    let headers = [
        "Metric",
        Protocol::Nscc.display_name(),
        Protocol::Cubic.display_name(),
        "Difference",
        "Better",
    ];
    render_table(&headers, &rows)
}

/// Full fairness comparison report as lines of text
pub fn fairness_report_lines(results: &FairnessResults) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();

    lines.push(String::new());
    lines.push("=".repeat(100));
    lines.push("FAIRNESS COMPARISON: NSCC vs TCP Cubic".to_string());
    lines.push("=".repeat(100));

    for (experiment, protocols) in results {
        lines.push(String::new());
        lines.push(experiment.clone());
        lines.push("-".repeat(80));
        lines.extend(comparison_table(protocols));
    }

    lines.push(String::new());
    lines.push("=".repeat(100));
    lines.push("INTERPRETATION".to_string());
    lines.push("=".repeat(100));
    lines.push(
        "
Jain's Fairness Index:
  - Range: 0 to 1 (1 = perfect fairness)
  - Values above 0.9 indicate good fairness
  - Higher is better

Coefficient of Variation:
  - Lower is better (more consistent throughput)
  - CV < 0.1 indicates very consistent performance

Min/Max Ratio:
  - Range: 0 to 1 (1 = all flows equal)
  - Higher values indicate better worst-case fairness

FCT (Flow Completion Time):
  - Lower is better
  - P99 indicates tail latency performance
"
        .to_string(),
    );

    lines
}

/// Print the fairness comparison report to stdout
pub fn print_fairness_report(results: &FairnessResults) {
    for line in fairness_report_lines(results) {
        println!("{}", line);
    }
}

/// One persisted row per (experiment, protocol). Column names and order
/// are consumed by downstream comparison tooling and must not change.
#[derive(Debug, Serialize)]
struct FairnessCsvRow<'a> {
    #[serde(rename = "Experiment")]
    experiment: &'a str,
    #[serde(rename = "Protocol")]
    protocol: Protocol,
    #[serde(rename = "Jains_Fairness")]
    jains_fairness: f64,
    #[serde(rename = "CV")]
    cv: f64,
    #[serde(rename = "Min_Max_Ratio")]
    min_max_ratio: f64,
    #[serde(rename = "Mean_Throughput_Mbps")]
    mean_throughput_mbps: f64,
    #[serde(rename = "FCT_P50_ms")]
    fct_p50_ms: f64,
    #[serde(rename = "FCT_P95_ms")]
    fct_p95_ms: f64,
    #[serde(rename = "FCT_P99_ms")]
    fct_p99_ms: f64,
    #[serde(rename = "FCT_Mean_ms")]
    fct_mean_ms: f64,
    #[serde(rename = "FCT_Min_ms")]
    fct_min_ms: f64,
    #[serde(rename = "FCT_Max_ms")]
    fct_max_ms: f64,
    #[serde(rename = "Num_Flows")]
    num_flows: usize,
}

/// Write the fairness summary table
pub fn write_fairness_csv(results: &FairnessResults, output_path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(output_path)
        .with_context(|| format!("Failed to create {}", output_path.display()))?;

    for (experiment, protocols) in results {
        for (&protocol, s) in protocols {
            writer.serialize(FairnessCsvRow {
                experiment,
                protocol,
                jains_fairness: s.jains_fairness,
                cv: s.cv,
                min_max_ratio: s.min_max_ratio,
                mean_throughput_mbps: s.mean_throughput_mbps,
                fct_p50_ms: s.fct_p50_ms,
                fct_p95_ms: s.fct_p95_ms,
                fct_p99_ms: s.fct_p99_ms,
                fct_mean_ms: s.fct_mean_ms,
                fct_min_ms: s.fct_min_ms,
                fct_max_ms: s.fct_max_ms,
                num_flows: s.num_flows,
            })?;
        }
    }

    writer
        .flush()
        .with_context(|| format!("Failed to write {}", output_path.display()))?;
    log::info!("Results saved to: {}", output_path.display());
    Ok(())
}

fn format_tput(tput: Option<f64>) -> String {
    tput.map(|t| format!("{:.3}", t)).unwrap_or_else(|| "-".to_string())
}

/// Coexistence summary table as lines of text
pub fn coexistence_report_lines(
    results: &CoexistenceResults,
    config: &CoexistenceConfig,
) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();

    lines.push("=".repeat(90));
    lines.push("MIXED NSCC + TCP CUBIC CO-EXISTENCE EXPERIMENT RESULTS".to_string());
    lines.push("=".repeat(90));

    for (&scenario, summaries) in results {
        lines.push(String::new());
        lines.push("─".repeat(90));
        lines.push(format!("Scenario {}: {}", scenario, config.label_for(scenario)));
        lines.push("─".repeat(90));
        lines.push(format!(
            "{:>7} | {:>10} | {:>11} | {:>10} | {:>11} | {:>7} | {:>8} | {:>8}",
            "Ratio",
            "NSCC Flows",
            "Cubic Flows",
            "NSCC Tput",
            "Cubic Tput",
            "NSCC %",
            "Cubic %",
            "Jain FI"
        ));
        lines.push(format!(
            "{:>7} | {:>10} | {:>11} | {:>10} | {:>11} | {:>7} | {:>8} | {:>8}",
            "", "", "", "(mean Gbps)", "(mean Gbps)", "", "", ""
        ));
        lines.push("-".repeat(90));

        for summary in summaries {
            let nscc = summary.protocol(Protocol::Nscc);
            let cubic = summary.protocol(Protocol::Cubic);
            lines.push(format!(
                "{:>7.2} | {}/{:>4} done | {}/{:>4} done | {:>10} | {:>11} | {:>6.1}% | {:>7.1}% | {:>8.4}",
                summary.key.ratio,
                nscc.finished,
                nscc.flows,
                cubic.finished,
                cubic.flows,
                format_tput(nscc.mean_tput),
                format_tput(cubic.mean_tput),
                nscc.share_pct,
                cubic.share_pct,
                summary.jains_fi
            ));
        }
    }

    lines.push(String::new());
    lines.push("=".repeat(90));
    lines.push("KEY:".to_string());
    lines.push("  NSCC/Cubic Tput = mean per-flow throughput in Gbps".to_string());
    lines.push("  NSCC/Cubic %    = share of total received bytes".to_string());
    lines.push("  Jain FI         = Jain's Fairness Index (1.0 = perfectly fair)".to_string());
    lines.push("=".repeat(90));

    lines
}

/// Write text report lines to a file
pub fn write_text_report(lines: &[String], output_path: &Path) -> Result<()> {
    let mut content = lines.join("\n");
    content.push('\n');
    fs::write(output_path, content)
        .with_context(|| format!("Failed to write text report to {}", output_path.display()))?;

    log::info!("Summary written to {}", output_path.display());
    Ok(())
}

/// One persisted row per (scenario, ratio, protocol). Column names and
/// order must not change.
#[derive(Debug, Serialize)]
struct CoexistenceCsvRow {
    #[serde(rename = "Scenario")]
    scenario: String,
    #[serde(rename = "Ratio")]
    ratio: f64,
    #[serde(rename = "Protocol")]
    protocol: Protocol,
    #[serde(rename = "Total_Flows")]
    total_flows: usize,
    #[serde(rename = "Flows")]
    flows: usize,
    #[serde(rename = "Finished")]
    finished: usize,
    #[serde(rename = "Mean_Tput_Gbps")]
    mean_tput_gbps: Option<f64>,
    #[serde(rename = "Median_Tput_Gbps")]
    median_tput_gbps: Option<f64>,
    #[serde(rename = "P99_Tput_Gbps")]
    p99_tput_gbps: Option<f64>,
    #[serde(rename = "Total_Bytes")]
    total_bytes: u64,
    #[serde(rename = "Retransmits")]
    retransmits: u64,
    #[serde(rename = "Share_Pct")]
    share_pct: f64,
    #[serde(rename = "Jains_FI")]
    jains_fi: f64,
}

/// Write the coexistence summary table
pub fn write_coexistence_csv(results: &CoexistenceResults, output_path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(output_path)
        .with_context(|| format!("Failed to create {}", output_path.display()))?;

    for (&scenario, summaries) in results {
        for summary in summaries {
            for protocol in Protocol::ALL {
                let share = summary.protocol(protocol);
                writer.serialize(CoexistenceCsvRow {
                    scenario: scenario.to_string(),
                    ratio: summary.key.ratio,
                    protocol,
                    total_flows: summary.total_flows,
                    flows: share.flows,
                    finished: share.finished,
                    mean_tput_gbps: share.mean_tput,
                    median_tput_gbps: share.median_tput,
                    p99_tput_gbps: share.p99_tput,
                    total_bytes: share.total_bytes,
                    retransmits: share.retransmits,
                    share_pct: share.share_pct,
                    jains_fi: summary.jains_fi,
                })?;
            }
        }
    }

    writer
        .flush()
        .with_context(|| format!("Failed to write {}", output_path.display()))?;
    log::info!("Coexistence table saved to: {}", output_path.display());
    Ok(())
}

/// Derived trace series plus their digest, as exported for plotting
#[derive(Debug, Serialize)]
pub struct TimeSeriesReport<'a> {
    pub metadata: AnalysisMetadata,
    pub digest: TraceDigest,
    pub analysis: &'a TimeSeriesAnalysis,
}

/// Generate JSON export of a trace analysis. Undefined share samples are
/// written as `null`.
pub fn generate_timeseries_json(
    analysis: &TimeSeriesAnalysis,
    source: &Path,
    output_path: &Path,
) -> Result<()> {
    let report = TimeSeriesReport {
        metadata: AnalysisMetadata::now(source),
        digest: analysis.digest(),
        analysis,
    };
    let json = serde_json::to_string_pretty(&report)
        .context("Failed to serialize time-series analysis to JSON")?;

    fs::write(output_path, json)
        .with_context(|| format!("Failed to write JSON report to {}", output_path.display()))?;

    log::info!("JSON report written to {}", output_path.display());
    Ok(())
}

/// Print a trace digest to stdout
pub fn print_trace_digest(analysis: &TimeSeriesAnalysis) {
    let digest = analysis.digest();

    println!("\n=== {} ===\n", analysis.title);
    println!("Samples: {} ({:.3}us interval)", digest.samples, analysis.sample_interval_us);
    println!(
        "Rolling goodput window: {}us ({} samples)",
        analysis.smoothing_window_us, analysis.window_samples
    );
    println!("Link capacity: {:.0} Gbps", analysis.metadata.linkspeed_gbps);

    for protocol in Protocol::ALL {
        let Some(flows) = digest.flows_per_protocol.get(&protocol) else {
            continue;
        };
        println!("\n{} ({} flows):", protocol.display_name(), flows);
        if let Some(gp) = digest.mean_goodput_gbps.get(&protocol) {
            println!("  Mean aggregate goodput: {:.2} Gbps", gp);
        }
        if let Some(share) = digest.mean_share_pct.get(&protocol) {
            println!("  Mean instantaneous share: {:.1}%", share);
        }
        if let Some(share) = digest.final_cumulative_share_pct.get(&protocol) {
            println!("  Final cumulative share: {:.1}%", share);
        }
    }
    if analysis.shares.is_none() {
        println!("\nShare unavailable (need >=1 TCP and >=1 NSCC flow)");
    }

    println!("\nQueue:");
    println!("  Peak occupancy: {:.1} KB", digest.peak_queue_bytes / 1000.0);
    println!("  Drops: {}", digest.total_queue_drops);
    match digest.transition_time_us {
        Some(t) => println!("  Regime shift @ {:.1}k us", t / 1000.0),
        None => println!("  No regime shift detected"),
    }
    println!();
}
