//! NSCC + TCP Cubic coexistence analysis.
//!
//! Each per-flow CSV holds both protocols sharing one fabric for a single
//! scenario and NSCC/CUBIC mix ratio. Summaries report how the bandwidth was
//! split and how fair the pooled allocation was.
//!
//! Rows tagged with a protocol other than NSCC or CUBIC are dropped while
//! reading, so they count toward neither `total_flows` nor the pooled
//! fairness index.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use color_eyre::eyre::{eyre, Context, Result};
use serde::{Deserialize, Deserializer};

use super::metrics::{jains_fairness_pooled, mean, percentile_nearest};
use super::naming::parse_coexistence_file_name;
use super::types::*;
use crate::utils::{file_name_str, require_input_files};

/// Extension of per-flow coexistence tables
pub const CSV_EXTENSION: &str = "csv";

/// Columns every per-flow CSV must provide
pub const REQUIRED_COLUMNS: [&str; 11] = [
    "flow_id",
    "src",
    "dst",
    "protocol",
    "size_bytes",
    "start_us",
    "fct_us",
    "throughput_gbps",
    "finished",
    "bytes_received",
    "retransmits",
];

/// One row of a per-flow CSV as written by the mixed-protocol simulator.
///
/// Unfinished flows carry `fct_us = -1` and a throughput measured over the
/// time they were active.
#[derive(Debug, Clone, Deserialize)]
pub struct FlowCsvRow {
    pub flow_id: u64,
    pub src: u64,
    pub dst: u64,
    pub protocol: String,
    pub size_bytes: u64,
    pub start_us: f64,
    pub fct_us: f64,
    pub throughput_gbps: f64,
    #[serde(deserialize_with = "deserialize_flag")]
    pub finished: bool,
    pub bytes_received: u64,
    pub retransmits: u64,
}

/// Accept `0`/`1` as well as `true`/`false`
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "invalid finished flag: {}",
            other
        ))),
    }
}

impl FlowCsvRow {
    /// Normalize into a flow record; `None` for an unknown protocol tag
    pub fn into_record(self) -> Option<FlowRecord> {
        let protocol: Protocol = self.protocol.parse().ok()?;
        Some(FlowRecord {
            flow_id: self.flow_id,
            protocol,
            size_bytes: self.size_bytes,
            completion_time_ms: self.fct_us / 1000.0,
            throughput: self.throughput_gbps,
            bytes_received: self.bytes_received,
            finished: self.finished,
            retransmits: self.retransmits,
        })
    }
}

/// Read a per-flow CSV into flow records.
///
/// Fails when the file cannot be read or its header lacks a required
/// column. Rows that do not deserialize or name an unknown protocol are
/// skipped with a warning.
pub fn read_flow_csv(path: &Path) -> Result<Vec<FlowRecord>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open flow CSV: {}", path.display()))?;
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);

    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read CSV header: {}", path.display()))?
        .clone();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .collect();
    if !missing.is_empty() {
        return Err(eyre!(
            "{} is missing required columns: {}",
            path.display(),
            missing.join(", ")
        ));
    }

    let mut flows = Vec::new();
    let mut skipped = 0usize;

    for (line, row) in reader.deserialize::<FlowCsvRow>().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                log::debug!("{} row {}: {}", path.display(), line + 1, e);
                skipped += 1;
                continue;
            }
        };
        match row.into_record() {
            Some(record) => flows.push(record),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        log::warn!("Skipped {} malformed rows in {}", skipped, path.display());
    }

    Ok(flows)
}

/// Per-protocol statistics over one protocol's rows
fn protocol_share(flows: &[&FlowRecord]) -> ProtocolShare {
    if flows.is_empty() {
        return ProtocolShare::default();
    }

    let mut tputs: Vec<f64> = flows
        .iter()
        .map(|f| f.throughput)
        .filter(|t| *t > 0.0)
        .collect();
    tputs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    ProtocolShare {
        flows: flows.len(),
        finished: flows.iter().filter(|f| f.finished).count(),
        mean_tput: Some(mean(&tputs)),
        median_tput: Some(percentile_nearest(&tputs, 50.0)),
        p99_tput: Some(percentile_nearest(&tputs, 99.0)),
        total_bytes: flows.iter().map(|f| f.bytes_received).sum(),
        retransmits: flows.iter().map(|f| f.retransmits).sum(),
        share_pct: 0.0,
    }
}

/// Bandwidth share of `bytes` in `total`, as a percentage (0 when total is 0)
pub fn byte_share(bytes: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    bytes as f64 * 100.0 / total as f64
}

/// Summarize one coexistence run; `None` when it has no flows
pub fn summarize_coexistence(
    key: CoexistenceKey,
    flows: &[FlowRecord],
) -> Option<CoexistenceSummary> {
    if flows.is_empty() {
        return None;
    }

    let mut per_protocol: BTreeMap<Protocol, ProtocolShare> = Protocol::ALL
        .iter()
        .map(|&protocol| {
            let subset: Vec<&FlowRecord> =
                flows.iter().filter(|f| f.protocol == protocol).collect();
            (protocol, protocol_share(&subset))
        })
        .collect();

    let total_bytes: u64 = per_protocol.values().map(|s| s.total_bytes).sum();
    for share in per_protocol.values_mut() {
        share.share_pct = byte_share(share.total_bytes, total_bytes);
    }

    let pooled: Vec<f64> = flows
        .iter()
        .map(|f| f.throughput)
        .filter(|t| *t > 0.0)
        .collect();

    Some(CoexistenceSummary {
        key,
        total_flows: flows.len(),
        per_protocol,
        jains_fi: jains_fairness_pooled(&pooled),
    })
}

/// Read and summarize a single coexistence CSV
pub fn analyze_file(path: &Path) -> Result<Option<CoexistenceSummary>> {
    let key = parse_coexistence_file_name(file_name_str(path));
    let flows = read_flow_csv(path)?;
    Ok(summarize_coexistence(key, &flows))
}

/// Analyze every coexistence CSV in a results directory.
///
/// Files are grouped by scenario letter and ordered by ascending ratio.
/// Unreadable files are skipped with a warning and empty files silently,
/// so a scenario without any usable file does not appear in the result.
/// Fails only when the directory is missing or holds no `.csv` file; a
/// directory whose files all fail to parse yields an empty result.
pub fn analyze_results_dir(results_dir: &Path) -> Result<CoexistenceResults> {
    let csv_files = require_input_files(results_dir, CSV_EXTENSION)?;
    log::info!("Found {} CSV files in {}", csv_files.len(), results_dir.display());

    let mut results = CoexistenceResults::new();

    for path in &csv_files {
        match analyze_file(path) {
            Ok(Some(summary)) => {
                log::debug!(
                    "Analyzed scenario {} ratio {:.2}: {} flows",
                    summary.key.scenario,
                    summary.key.ratio,
                    summary.total_flows
                );
                results.entry(summary.key.scenario).or_default().push(summary);
            }
            Ok(None) => log::debug!("No flows in {}", path.display()),
            Err(e) => log::warn!("Skipping {}: {:#}", path.display(), e),
        }
    }

    if results.is_empty() {
        log::warn!("No coexistence results found in {}", results_dir.display());
    }

    for summaries in results.values_mut() {
        summaries.sort_by(|a, b| {
            a.key
                .ratio
                .partial_cmp(&b.key.ratio)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    Ok(results)
}
