//! Core data types for flow fairness and coexistence analysis.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Congestion-control protocol under comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Protocol {
    /// UEC network signal congestion control
    #[serde(rename = "NSCC")]
    Nscc,
    /// TCP Cubic
    #[serde(rename = "CUBIC")]
    Cubic,
}

impl Protocol {
    pub const ALL: [Protocol; 2] = [Protocol::Nscc, Protocol::Cubic];

    /// Canonical uppercase tag used in CSV files and reports
    pub fn tag(self) -> &'static str {
        match self {
            Protocol::Nscc => "NSCC",
            Protocol::Cubic => "CUBIC",
        }
    }

    /// Display name used in comparison tables
    pub fn display_name(self) -> &'static str {
        match self {
            Protocol::Nscc => "NSCC",
            Protocol::Cubic => "TCP Cubic",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Error for a protocol tag that names neither protocol
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown protocol tag: {0}")]
pub struct UnknownProtocol(pub String);

impl FromStr for Protocol {
    type Err = UnknownProtocol;

    /// Case-insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NSCC" => Ok(Protocol::Nscc),
            "CUBIC" => Ok(Protocol::Cubic),
            _ => Err(UnknownProtocol(s.to_string())),
        }
    }
}

/// One simulated flow, normalized from any input dialect.
///
/// `throughput` is in the bit-rate unit of the source: Mbps for completion
/// logs, Gbps for coexistence CSVs. In completion logs a flow with
/// `completion_time_ms <= 0` never finished and carries zero throughput;
/// CSV rows keep the simulator's throughput, which is positive for flows
/// still in flight when the run ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub flow_id: u64,
    pub protocol: Protocol,
    pub size_bytes: u64,
    pub completion_time_ms: f64,
    pub throughput: f64,
    pub bytes_received: u64,
    pub finished: bool,
    pub retransmits: u64,
}

impl FlowRecord {
    /// Whether this flow may contribute to throughput statistics
    pub fn has_completion_time(&self) -> bool {
        self.completion_time_ms > 0.0
    }
}

/// Identity of a single-protocol experiment recovered from its log file name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExperimentKey {
    pub protocol: Protocol,
    pub topology: String,
    pub workload: String,
}

impl ExperimentKey {
    /// Grouping key shared by both protocols: "topology/workload"
    pub fn experiment(&self) -> String {
        format!("{}/{}", self.topology, self.workload)
    }
}

/// Identity of a coexistence run recovered from its CSV file name
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoexistenceKey {
    pub scenario: char,
    /// NSCC fraction of flows; -1.0 when the name carries no ratio token
    pub ratio: f64,
}

/// Per-protocol summary of one single-protocol experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSummary {
    pub num_flows: usize,
    pub jains_fairness: f64,
    pub cv: f64,
    pub min_max_ratio: f64,
    pub mean_throughput_mbps: f64,
    pub fct_p50_ms: f64,
    pub fct_p95_ms: f64,
    pub fct_p99_ms: f64,
    pub fct_mean_ms: f64,
    pub fct_min_ms: f64,
    pub fct_max_ms: f64,
}

/// All summaries of a results directory: experiment key -> protocol -> summary
pub type FairnessResults = BTreeMap<String, BTreeMap<Protocol, ExperimentSummary>>;

/// One protocol's slice of a coexistence run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProtocolShare {
    pub flows: usize,
    pub finished: usize,
    /// Throughput statistics (Gbps); `None` when the protocol had no flows
    pub mean_tput: Option<f64>,
    pub median_tput: Option<f64>,
    pub p99_tput: Option<f64>,
    pub total_bytes: u64,
    pub retransmits: u64,
    /// Percentage of bytes received by both protocols combined
    pub share_pct: f64,
}

/// Summary of one coexistence CSV (one scenario at one ratio)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoexistenceSummary {
    pub key: CoexistenceKey,
    pub total_flows: usize,
    pub per_protocol: BTreeMap<Protocol, ProtocolShare>,
    /// Jain's index over every positive throughput regardless of protocol
    pub jains_fi: f64,
}

impl CoexistenceSummary {
    pub fn protocol(&self, protocol: Protocol) -> ProtocolShare {
        self.per_protocol.get(&protocol).cloned().unwrap_or_default()
    }
}

/// Coexistence summaries of a results directory, grouped by scenario letter
/// and ordered by ascending ratio within each scenario
pub type CoexistenceResults = BTreeMap<char, Vec<CoexistenceSummary>>;

/// Metadata recorded alongside persisted reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub analysis_timestamp: String,
    pub source: String,
}

impl AnalysisMetadata {
    pub fn now(source: &std::path::Path) -> Self {
        Self {
            analysis_timestamp: chrono::Utc::now().to_rfc3339(),
            source: source.display().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_parse_case_insensitive() {
        assert_eq!("nscc".parse::<Protocol>(), Ok(Protocol::Nscc));
        assert_eq!("Cubic".parse::<Protocol>(), Ok(Protocol::Cubic));
        assert_eq!(" CUBIC ".parse::<Protocol>(), Ok(Protocol::Cubic));
        assert!("dctcp".parse::<Protocol>().is_err());
    }

    #[test]
    fn test_protocol_order_and_tags() {
        assert!(Protocol::Nscc < Protocol::Cubic);
        assert_eq!(Protocol::Cubic.to_string(), "CUBIC");
        assert_eq!(Protocol::Cubic.display_name(), "TCP Cubic");
    }

    #[test]
    fn test_experiment_key_grouping() {
        let key = ExperimentKey {
            protocol: Protocol::Nscc,
            topology: "leaf_spine_128".to_string(),
            workload: "fairness_8flows".to_string(),
        };
        assert_eq!(key.experiment(), "leaf_spine_128/fairness_8flows");
    }

    #[test]
    fn test_missing_protocol_share_defaults() {
        let summary = CoexistenceSummary {
            key: CoexistenceKey { scenario: 'A', ratio: 1.0 },
            total_flows: 0,
            per_protocol: BTreeMap::new(),
            jains_fi: 1.0,
        };
        let cubic = summary.protocol(Protocol::Cubic);
        assert_eq!(cubic.flows, 0);
        assert!(cubic.mean_tput.is_none());
    }
}
