//! File name grammar for experiment identity.
//!
//! Experiment parameters are only recorded in result file names, so this is
//! the single place they are recovered:
//!
//! - Single-protocol logs: `<protocol>_<topology>_<workload>.log` where
//!   `<protocol>` is `nscc` or `cubic` (any case) and `<workload>` starts
//!   with `fairness_`. The topology may itself contain underscores.
//! - Coexistence CSVs: `scen<X>_..._ratio<NNN>_....csv` where `<X>` is the
//!   scenario letter and `<NNN>` encodes the NSCC flow fraction:
//!
//!   | token      | value |
//!   |------------|-------|
//!   | `ratio0`   | 0.0   |
//!   | `ratio1`   | 0.1   |
//!   | `ratio5`   | 5.0 (digits above 1 are taken as-is) |
//!   | `ratio05`  | 0.5   |
//!   | `ratio10`  | 1.0   |
//!   | `ratio025` | 0.25  |
//!   | (missing)  | -1.0  |

use std::sync::LazyLock;

use regex::Regex;

use super::types::{CoexistenceKey, ExperimentKey, Protocol};

/// Ratio reported for a coexistence file without a `ratio` token
pub const UNKNOWN_RATIO: f64 = -1.0;

/// Scenario reported for a coexistence file without the `scen` prefix
pub const UNKNOWN_SCENARIO: char = '?';

const SCENARIO_PREFIX: &str = "scen";
const RATIO_PREFIX: &str = "ratio";

static EXPERIMENT_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^((?i:nscc|cubic))_(.+)_(fairness_.+)\.log$")
        .expect("Invalid experiment file regex")
});

/// Parse a single-protocol log file name into its experiment key
pub fn parse_experiment_file_name(file_name: &str) -> Option<ExperimentKey> {
    let caps = EXPERIMENT_FILE.captures(file_name)?;
    let protocol: Protocol = caps.get(1)?.as_str().parse().ok()?;
    Some(ExperimentKey {
        protocol,
        topology: caps.get(2)?.as_str().to_string(),
        workload: caps.get(3)?.as_str().to_string(),
    })
}

/// Parse a coexistence CSV file name. Never fails: missing parts decode to
/// [`UNKNOWN_SCENARIO`] and [`UNKNOWN_RATIO`].
pub fn parse_coexistence_file_name(file_name: &str) -> CoexistenceKey {
    CoexistenceKey {
        scenario: scenario_from_file_name(file_name),
        ratio: ratio_from_file_name(file_name),
    }
}

/// Scenario letter following the `scen` prefix
pub fn scenario_from_file_name(file_name: &str) -> char {
    file_name
        .strip_prefix(SCENARIO_PREFIX)
        .and_then(|rest| rest.chars().next())
        .unwrap_or(UNKNOWN_SCENARIO)
}

/// Decode the first well-formed `ratioNNN` token of a file name
pub fn ratio_from_file_name(file_name: &str) -> f64 {
    let base = file_name.replace(".csv", "");
    base.split('_')
        .filter_map(|part| part.strip_prefix(RATIO_PREFIX))
        .find_map(decode_ratio_digits)
        .unwrap_or(UNKNOWN_RATIO)
}

fn decode_ratio_digits(digits: &str) -> Option<f64> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let value: f64 = digits.parse().ok()?;
    match digits.len() {
        1 if value <= 1.0 => Some(value / 10.0),
        1 => Some(value),
        2 => Some(value / 10.0),
        3 => Some(value / 100.0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_experiment_file_name() {
        let key = parse_experiment_file_name("nscc_leaf_spine_128_fairness_incast8.log").unwrap();
        assert_eq!(key.protocol, Protocol::Nscc);
        assert_eq!(key.topology, "leaf_spine_128");
        assert_eq!(key.workload, "fairness_incast8");

        let key = parse_experiment_file_name("CUBIC_fattree_fairness_perm.log").unwrap();
        assert_eq!(key.protocol, Protocol::Cubic);
        assert_eq!(key.experiment(), "fattree/fairness_perm");
    }

    #[test]
    fn test_experiment_file_name_mismatch() {
        assert!(parse_experiment_file_name("dctcp_fattree_fairness_perm.log").is_none());
        assert!(parse_experiment_file_name("nscc_fattree_perm.log").is_none());
        assert!(parse_experiment_file_name("nscc_fattree_fairness_perm.txt").is_none());
        assert!(parse_experiment_file_name("readme.log").is_none());
    }

    #[test]
    fn test_ratio_tokens() {
        assert_eq!(ratio_from_file_name("scenA_ratio00.csv"), 0.0);
        assert_eq!(ratio_from_file_name("scenA_ratio025.csv"), 0.25);
        assert_eq!(ratio_from_file_name("scenA_ratio05.csv"), 0.5);
        assert_eq!(ratio_from_file_name("scenA_ratio075.csv"), 0.75);
        assert_eq!(ratio_from_file_name("scenA_ratio10.csv"), 1.0);
        assert_eq!(ratio_from_file_name("scenB_ratio1_seed3.csv"), 0.1);
        assert_eq!(ratio_from_file_name("scenB_ratio5.csv"), 5.0);
        assert_eq!(ratio_from_file_name("scenC_flows.csv"), UNKNOWN_RATIO);
    }

    #[test]
    fn test_malformed_ratio_token_is_skipped() {
        assert_eq!(ratio_from_file_name("scenA_ratioXY_ratio05.csv"), 0.5);
        assert_eq!(ratio_from_file_name("scenA_ratio12345.csv"), UNKNOWN_RATIO);
    }

    #[test]
    fn test_scenario_letter() {
        assert_eq!(scenario_from_file_name("scenB_ratio05.csv"), 'B');
        assert_eq!(scenario_from_file_name("mixed_ratio05.csv"), UNKNOWN_SCENARIO);
        assert_eq!(scenario_from_file_name("scen"), UNKNOWN_SCENARIO);

        let key = parse_coexistence_file_name("scenC_ratio075.csv");
        assert_eq!(key.scenario, 'C');
        assert_eq!(key.ratio, 0.75);
    }
}
