//! Analysis configuration.
//!
//! Every knob has a built-in default, so a configuration file is optional.
//! When given, it is a YAML document whose sections may be partially filled:
//!
//! ```yaml
//! fairness:
//!   default_flow_size_bytes: 2000000
//! coexistence:
//!   scenario_labels:
//!     A: "Permutation, 2MB uniform"
//! timeseries:
//!   smoothing_window_us: 2000
//!   transition:
//!     edge_margin: 1000
//!     window: 500
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use color_eyre::eyre::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::analysis::log_parser::DEFAULT_FLOW_SIZE_BYTES;
use crate::analysis::timeseries::{
    TransitionDetector, DEFAULT_BDP, DEFAULT_ECN_KMAX, DEFAULT_ECN_KMIN, DEFAULT_LINKSPEED_GBPS,
    DEFAULT_SMOOTHING_WINDOW_US, SHARE_EPSILON,
};

/// Top-level configuration for all analysis modes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub fairness: FairnessConfig,
    pub coexistence: CoexistenceConfig,
    pub timeseries: TimeSeriesConfig,
}

/// Single-protocol fairness analysis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FairnessConfig {
    /// Flow size assumed for CUBIC logs lacking a "Setting flow size" directive
    pub default_flow_size_bytes: u64,
    /// Name of the summary table written into the results directory
    pub output_file_name: String,
}

impl Default for FairnessConfig {
    fn default() -> Self {
        Self {
            default_flow_size_bytes: DEFAULT_FLOW_SIZE_BYTES,
            output_file_name: "fairness_metrics.csv".to_string(),
        }
    }
}

/// Coexistence (mixed NSCC + CUBIC) analysis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoexistenceConfig {
    /// Human-readable description per scenario letter
    pub scenario_labels: BTreeMap<String, String>,
}

impl Default for CoexistenceConfig {
    fn default() -> Self {
        let scenario_labels = [
            ("A", "Permutation, 2MB uniform"),
            ("B", "Mixed sizes, 10KB-10MB log-uniform"),
            ("C", "16-to-1 incast + 64 background"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self { scenario_labels }
    }
}

impl CoexistenceConfig {
    /// Label for a scenario letter, falling back to "Scenario X"
    pub fn label_for(&self, scenario: char) -> String {
        self.scenario_labels
            .get(&scenario.to_string())
            .cloned()
            .unwrap_or_else(|| format!("Scenario {}", scenario))
    }
}

/// Time-series trace analysis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeSeriesConfig {
    /// Width of the goodput smoothing kernel, in microseconds
    pub smoothing_window_us: f64,
    /// Aggregate goodput or bytes at or below this make a share undefined
    pub share_epsilon: f64,
    /// Fallbacks for keys missing from the trace metadata line
    pub default_ecn_kmin: f64,
    pub default_ecn_kmax: f64,
    pub default_bdp: f64,
    pub default_linkspeed_gbps: f64,
    pub transition: TransitionDetector,
}

impl Default for TimeSeriesConfig {
    fn default() -> Self {
        Self {
            smoothing_window_us: DEFAULT_SMOOTHING_WINDOW_US,
            share_epsilon: SHARE_EPSILON,
            default_ecn_kmin: DEFAULT_ECN_KMIN,
            default_ecn_kmax: DEFAULT_ECN_KMAX,
            default_bdp: DEFAULT_BDP,
            default_linkspeed_gbps: DEFAULT_LINKSPEED_GBPS,
            transition: TransitionDetector::default(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid fairness configuration: {0}")]
    InvalidFairness(String),
    #[error("Invalid time-series configuration: {0}")]
    InvalidTimeSeries(String),
}

impl AnalysisConfig {
    /// Check value ranges that would make an analysis meaningless
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.fairness.default_flow_size_bytes == 0 {
            return Err(ValidationError::InvalidFairness(
                "default_flow_size_bytes must be positive".to_string(),
            ));
        }
        if self.fairness.output_file_name.trim().is_empty() {
            return Err(ValidationError::InvalidFairness(
                "output_file_name cannot be empty".to_string(),
            ));
        }

        let ts = &self.timeseries;
        if !(ts.smoothing_window_us > 0.0) {
            return Err(ValidationError::InvalidTimeSeries(format!(
                "smoothing_window_us must be positive, got {}",
                ts.smoothing_window_us
            )));
        }
        if ts.share_epsilon < 0.0 {
            return Err(ValidationError::InvalidTimeSeries(
                "share_epsilon cannot be negative".to_string(),
            ));
        }
        if ts.default_ecn_kmin > ts.default_ecn_kmax {
            return Err(ValidationError::InvalidTimeSeries(format!(
                "default_ecn_kmin ({}) exceeds default_ecn_kmax ({})",
                ts.default_ecn_kmin, ts.default_ecn_kmax
            )));
        }
        if ts.transition.window == 0 {
            return Err(ValidationError::InvalidTimeSeries(
                "transition.window must be at least one sample".to_string(),
            ));
        }
        if ts.transition.window > ts.transition.edge_margin {
            return Err(ValidationError::InvalidTimeSeries(format!(
                "transition.window ({}) cannot exceed transition.edge_margin ({})",
                ts.transition.window, ts.transition.edge_margin
            )));
        }

        Ok(())
    }
}

/// Load and validate configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<AnalysisConfig> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .with_context(|| format!("Failed to open config file: {}", config_path.display()))?;
    let config: AnalysisConfig = serde_yaml::from_reader(file)
        .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fairness.default_flow_size_bytes, 2_000_000);
        assert_eq!(config.timeseries.smoothing_window_us, 2000.0);
        assert_eq!(config.timeseries.transition.edge_margin, 1000);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "timeseries:\n  smoothing_window_us: 500").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.timeseries.smoothing_window_us, 500.0);
        assert_eq!(config.timeseries.default_ecn_kmax, 145500.0);
        assert_eq!(config.fairness.output_file_name, "fairness_metrics.csv");
        assert_eq!(config.coexistence.label_for('C'), "16-to-1 incast + 64 background");
    }

    #[test]
    fn test_invalid_window_rejected() {
        let mut config = AnalysisConfig::default();
        config.timeseries.transition.window = 2000;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidTimeSeries(_))
        ));
    }

    #[test]
    fn test_unknown_scenario_label() {
        let config = CoexistenceConfig::default();
        assert_eq!(config.label_for('Z'), "Scenario Z");
    }
}
