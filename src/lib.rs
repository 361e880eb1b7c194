//! # cc-analyzer - Post-hoc analysis of congestion-control experiments
//!
//! Reads the outputs of datacenter network simulations comparing NSCC with
//! TCP CUBIC and reduces them to fairness, completion-time and
//! bandwidth-share metrics.
//!
//! ## Analysis Modes
//!
//! - **Fairness**: a directory of single-protocol flow completion logs,
//!   one per protocol/topology/workload, summarized per experiment.
//! - **Coexistence**: a directory of per-flow CSVs from mixed runs, grouped
//!   by scenario letter and sorted by NSCC fraction.
//! - **Time series**: one trace CSV with cumulative per-flow counters,
//!   reduced to rolling goodput, bandwidth shares and the regime shift
//!   where the queue leaves the ECN marking band.
//!
//! ## Architecture
//!
//! - `analysis`: record normalization, metrics, aggregation and reports
//! - `config`: optional YAML configuration with built-in defaults
//! - `error`: typed usage failures
//! - `utils`: input discovery helpers
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use cc_analyzer::{analysis, config::AnalysisConfig};
//!
//! let config = AnalysisConfig::default();
//! let results = analysis::fairness::analyze_results_dir(Path::new("results"), &config.fairness)?;
//! analysis::print_fairness_report(&results);
//! # Ok::<(), color_eyre::eyre::Report>(())
//! ```
//!
//! ## Error Handling
//!
//! Malformed lines, rows and files are skipped with a warning. Only
//! invalid invocations abort, as `color_eyre` reports wrapping
//! [`error::UsageError`].

pub mod analysis;
pub mod config;
pub mod error;
pub mod utils;
