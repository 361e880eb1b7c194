//! Congestion-control experiment analysis.
//!
//! This module turns simulator outputs into comparable summaries: flow
//! completion logs into per-protocol fairness tables, per-flow CSVs into
//! coexistence shares, and time-series traces into rolling goodput curves.

pub mod types;
pub mod metrics;
pub mod log_parser;
pub mod naming;
pub mod fairness;
pub mod coexistence;
pub mod timeseries;
pub mod report;

pub use types::*;
pub use log_parser::{parse_log_file, FlowLogDialect};
pub use timeseries::{analyze_trace, read_trace, TimeSeriesAnalysis};
pub use report::{
    generate_timeseries_json, print_fairness_report, print_trace_digest, write_coexistence_csv,
    write_fairness_csv,
};
