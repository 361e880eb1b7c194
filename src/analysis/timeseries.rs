//! Time-series analysis of coexistence traces.
//!
//! A trace is the periodic sampler output of a mixed NSCC + TCP Cubic run:
//! a `# key=value ...` metadata line, a header, then one row per sample with
//! per-flow congestion windows and cumulative bytes plus the bottleneck
//! queue occupancy and drop counter. From it we derive smoothed per-flow
//! goodput, per-protocol bandwidth share, BDP-normalized windows and the
//! point where the bottleneck queue leaves its congested regime.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use color_eyre::eyre::{eyre, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::metrics::mean;
use super::types::Protocol;
use crate::config::TimeSeriesConfig;

/// Goodput smoothing kernel width, in microseconds
pub const DEFAULT_SMOOTHING_WINDOW_US: f64 = 2000.0;
/// ECN marking starts above this queue occupancy (bytes)
pub const DEFAULT_ECN_KMIN: f64 = 37500.0;
/// Every packet is marked above this queue occupancy (bytes)
pub const DEFAULT_ECN_KMAX: f64 = 145500.0;
pub const DEFAULT_BDP: f64 = 100000.0;
pub const DEFAULT_LINKSPEED_GBPS: f64 = 100.0;
/// Aggregates at or below this leave a share undefined
pub const SHARE_EPSILON: f64 = 1e-9;

static METADATA_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\w+)=([\d.eE+\-]+)").expect("Invalid metadata token regex")
});

static FLOW_COLUMN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(tcp|nscc)(\d+)_(cwnd|bytes_acked|bytes|drops)$")
        .expect("Invalid flow column regex")
});

/// Column prefix the sampler uses for a protocol's flows
fn column_prefix(protocol: Protocol) -> &'static str {
    match protocol {
        Protocol::Nscc => "nscc",
        Protocol::Cubic => "tcp",
    }
}

fn protocol_for_prefix(prefix: &str) -> Option<Protocol> {
    match prefix {
        "nscc" => Some(Protocol::Nscc),
        "tcp" => Some(Protocol::Cubic),
        _ => None,
    }
}

/// Whether a protocol's senders reacted to ECN marks during the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkingState {
    On,
    Off,
    Unknown,
}

impl MarkingState {
    /// `0` is off, `1` is on; anything else is unknown
    fn from_flag(value: f64) -> Self {
        if value == 0.0 {
            MarkingState::Off
        } else if value == 1.0 {
            MarkingState::On
        } else {
            MarkingState::Unknown
        }
    }

    /// Best-effort guess from naming conventions such as `tcpecnoff` or `tcp_ecn1`
    fn infer_from_path(path: &str, protocol: Protocol) -> Self {
        let lower = path.to_lowercase();
        let p = column_prefix(protocol);
        let off = [format!("{p}ecnoff"), format!("{p}_ecn0"), format!("{p}_ecn_off")];
        let on = [format!("{p}ecnon"), format!("{p}_ecn1"), format!("{p}_ecn_on")];

        if off.iter().any(|s| lower.contains(s.as_str())) {
            MarkingState::Off
        } else if on.iter().any(|s| lower.contains(s.as_str())) {
            MarkingState::On
        } else {
            MarkingState::Unknown
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MarkingState::On => "on",
            MarkingState::Off => "off",
            MarkingState::Unknown => "unknown",
        }
    }
}

/// Scalar parameters of the run that produced a trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceMetadata {
    pub ecn_kmin: f64,
    pub ecn_kmax: f64,
    pub bdp: f64,
    pub linkspeed_gbps: f64,
    pub marking: BTreeMap<Protocol, MarkingState>,
}

impl TraceMetadata {
    /// Parse the leading `# key=value ...` line. `source` is the trace path,
    /// used to infer marking flags the metadata does not state.
    pub fn parse(first_line: &str, source: &str, config: &TimeSeriesConfig) -> Self {
        let mut raw: HashMap<String, f64> = HashMap::new();
        if first_line.trim_start().starts_with('#') {
            for caps in METADATA_TOKEN.captures_iter(first_line) {
                if let Ok(value) = caps[2].parse::<f64>() {
                    raw.insert(caps[1].to_string(), value);
                }
            }
        }

        let marking = Protocol::ALL
            .iter()
            .map(|&protocol| {
                let key = format!("{}_ecn", column_prefix(protocol));
                let state = match raw.get(&key) {
                    Some(&flag) => MarkingState::from_flag(flag),
                    None => MarkingState::infer_from_path(source, protocol),
                };
                (protocol, state)
            })
            .collect();

        Self {
            ecn_kmin: raw.get("ecn_kmin").copied().unwrap_or(config.default_ecn_kmin),
            ecn_kmax: raw.get("ecn_kmax").copied().unwrap_or(config.default_ecn_kmax),
            bdp: raw.get("bdp").copied().unwrap_or(config.default_bdp),
            linkspeed_gbps: raw
                .get("linkspeed_gbps")
                .copied()
                .unwrap_or(config.default_linkspeed_gbps),
            marking,
        }
    }

    /// The fabric marks packets whenever a low threshold is configured
    pub fn fabric_ecn(&self) -> bool {
        self.ecn_kmin > 0.0
    }

    pub fn marking_for(&self, protocol: Protocol) -> MarkingState {
        self.marking
            .get(&protocol)
            .copied()
            .unwrap_or(MarkingState::Unknown)
    }

    /// One-line description of the run, e.g. for figure titles
    pub fn title(&self) -> String {
        format!(
            "NSCC vs TCP Cubic (fabric_ecn={}, tcp_ecn={}, Kmin={:.0}KB, Kmax={:.0}KB, BDP={:.0}KB)",
            if self.fabric_ecn() { "on" } else { "off" },
            self.marking_for(Protocol::Cubic).label(),
            self.ecn_kmin.trunc() / 1000.0,
            self.ecn_kmax.trunc() / 1000.0,
            self.bdp.trunc() / 1000.0,
        )
    }
}

/// Sampled series of one tracked flow
#[derive(Debug, Clone, PartialEq)]
pub struct FlowSeries {
    pub protocol: Protocol,
    pub index: usize,
    pub cwnd: Vec<f64>,
    /// Cumulative bytes delivered (acked for TCP, unique for NSCC)
    pub bytes: Vec<f64>,
    /// Per-flow drop counter, when the sampler records one
    pub drops: Option<Vec<f64>>,
}

impl FlowSeries {
    pub fn label(&self) -> String {
        format!("{} {}", self.protocol.display_name(), self.index)
    }
}

/// A parsed telemetry trace
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesTrace {
    pub metadata: TraceMetadata,
    pub time_us: Vec<f64>,
    pub queue_bytes: Vec<f64>,
    pub queue_drops: Vec<f64>,
    pub flows: Vec<FlowSeries>,
}

impl TimeSeriesTrace {
    pub fn len(&self) -> usize {
        self.time_us.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time_us.is_empty()
    }

    pub fn flow_count(&self, protocol: Protocol) -> usize {
        self.flows.iter().filter(|f| f.protocol == protocol).count()
    }
}

#[derive(Debug, Default)]
struct FlowColumns {
    cwnd: Option<usize>,
    bytes: Option<usize>,
    bytes_acked: Option<usize>,
    drops: Option<usize>,
}

impl FlowColumns {
    /// Delivered-bytes column: TCP samplers log acked bytes, NSCC samplers
    /// log `bytes`. The other spelling is a fallback.
    fn delivered_bytes(&self, protocol: Protocol) -> Option<usize> {
        match protocol {
            Protocol::Cubic => self.bytes_acked.or(self.bytes),
            Protocol::Nscc => self.bytes.or(self.bytes_acked),
        }
    }
}

/// Parse trace text. `source` names the trace in messages and feeds
/// marking-flag inference.
pub fn parse_trace(text: &str, source: &str, config: &TimeSeriesConfig) -> Result<TimeSeriesTrace> {
    let first_line = text.lines().next().unwrap_or("");
    let metadata = TraceMetadata::parse(first_line, source, config);

    let mut reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read trace header: {}", source))?
        .clone();

    let column = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| eyre!("{} is missing required column '{}'", source, name))
    };
    let time_col = column("time_us")?;
    let queue_col = column("queue_bytes")?;
    let drops_col = column("queue_drops")?;

    let mut flow_columns: BTreeMap<(Protocol, usize), FlowColumns> = BTreeMap::new();
    for (idx, header) in headers.iter().enumerate() {
        let Some(caps) = FLOW_COLUMN.captures(header) else {
            continue;
        };
        let (Some(protocol), Ok(flow_index)) =
            (protocol_for_prefix(&caps[1]), caps[2].parse::<usize>())
        else {
            continue;
        };
        let entry = flow_columns.entry((protocol, flow_index)).or_default();
        match &caps[3] {
            "cwnd" => entry.cwnd = Some(idx),
            "bytes" => entry.bytes = Some(idx),
            "bytes_acked" => entry.bytes_acked = Some(idx),
            "drops" => entry.drops = Some(idx),
            _ => {}
        }
    }

    let mut flows = Vec::new();
    let mut flow_cols = Vec::new();
    for ((protocol, index), cols) in flow_columns {
        let (Some(cwnd), Some(bytes)) = (cols.cwnd, cols.delivered_bytes(protocol)) else {
            log::warn!(
                "{}: {}{} lacks a cwnd or bytes column, skipping flow",
                source,
                column_prefix(protocol),
                index
            );
            continue;
        };
        flows.push(FlowSeries {
            protocol,
            index,
            cwnd: Vec::new(),
            bytes: Vec::new(),
            drops: cols.drops.map(|_| Vec::new()),
        });
        flow_cols.push((cwnd, bytes, cols.drops));
    }

    let mut time_us = Vec::new();
    let mut queue_bytes = Vec::new();
    let mut queue_drops = Vec::new();
    let mut skipped = 0usize;

    for record in reader.records() {
        let Ok(record) = record else {
            skipped += 1;
            continue;
        };
        let field = |idx: usize| -> Option<f64> { record.get(idx)?.parse().ok() };

        let Some(t) = field(time_col) else {
            skipped += 1;
            continue;
        };
        let (Some(q), Some(d)) = (field(queue_col), field(drops_col)) else {
            skipped += 1;
            continue;
        };
        let per_flow: Option<Vec<(f64, f64, Option<f64>)>> = flow_cols
            .iter()
            .map(|&(cwnd, bytes, drops)| {
                let drop_value = match drops {
                    Some(col) => Some(field(col)?),
                    None => None,
                };
                Some((field(cwnd)?, field(bytes)?, drop_value))
            })
            .collect();
        let Some(per_flow) = per_flow else {
            skipped += 1;
            continue;
        };

        time_us.push(t);
        queue_bytes.push(q);
        queue_drops.push(d);
        for (flow, (cwnd, bytes, drops)) in flows.iter_mut().zip(per_flow) {
            flow.cwnd.push(cwnd);
            flow.bytes.push(bytes);
            if let (Some(series), Some(value)) = (flow.drops.as_mut(), drops) {
                series.push(value);
            }
        }
    }

    if skipped > 0 {
        log::warn!("{}: skipped {} malformed samples", source, skipped);
    }

    Ok(TimeSeriesTrace {
        metadata,
        time_us,
        queue_bytes,
        queue_drops,
        flows,
    })
}

/// Read and parse a trace file
pub fn read_trace(path: &Path, config: &TimeSeriesConfig) -> Result<TimeSeriesTrace> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read trace: {}", path.display()))?;
    let source = path.to_string_lossy();
    let trace = parse_trace(&text, &source, config)?;
    log::info!(
        "Loaded {} samples, {} TCP and {} NSCC flows from {}",
        trace.len(),
        trace.flow_count(Protocol::Cubic),
        trace.flow_count(Protocol::Nscc),
        path.display()
    );
    Ok(trace)
}

/// Spacing of the first two samples; 1.0 when it cannot be determined
pub fn sample_interval(time_us: &[f64]) -> f64 {
    match time_us {
        [first, second, ..] if second - first > 0.0 => second - first,
        _ => 1.0,
    }
}

/// Number of samples covered by a smoothing duration, at least one
pub fn smoothing_window_samples(window_us: f64, dt: f64) -> usize {
    let samples = (window_us / dt).floor();
    if samples.is_finite() && samples >= 1.0 {
        samples as usize
    } else {
        1
    }
}

/// Per-sample increments of a cumulative series; the first increment is 0
pub fn first_difference(cumulative: &[f64]) -> Vec<f64> {
    let mut deltas = Vec::with_capacity(cumulative.len());
    if let Some(&first) = cumulative.first() {
        let mut prev = first;
        for &value in cumulative {
            deltas.push(value - prev);
            prev = value;
        }
    }
    deltas
}

/// Convolve with a uniform kernel of `width` samples, keeping the input
/// length. The kernel is centered at offset `(width-1)/2`; samples near the
/// edges average over the part of the window inside the series but are
/// still divided by the full width.
pub fn uniform_smooth_same(values: &[f64], width: usize) -> Vec<f64> {
    let n = values.len();
    let width = width.max(1);
    let offset = (width - 1) / 2;

    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0);
    for &v in values {
        prefix.push(prefix[prefix.len() - 1] + v);
    }

    (0..n)
        .map(|i| {
            let k = i + offset;
            let lo = (k + 1).saturating_sub(width);
            let hi = k.min(n - 1) + 1;
            if lo >= hi {
                0.0
            } else {
                (prefix[hi] - prefix[lo]) / width as f64
            }
        })
        .collect()
}

/// Rolling goodput in Gbps from a cumulative byte counter sampled every
/// `dt` microseconds
pub fn rolling_goodput_gbps(cumulative_bytes: &[f64], dt: f64, window: usize) -> Vec<f64> {
    let deltas = first_difference(cumulative_bytes);
    uniform_smooth_same(&deltas, window)
        .into_iter()
        // bytes per sample -> bytes/us -> Gbps
        .map(|bytes| bytes / dt * 8.0 / 1e3)
        .collect()
}

/// Element-wise sum of equally long series
fn sum_series<'a>(series: impl IntoIterator<Item = &'a Vec<f64>>, len: usize) -> Vec<f64> {
    let mut total = vec![0.0; len];
    for s in series {
        for (acc, v) in total.iter_mut().zip(s) {
            *acc += v;
        }
    }
    total
}

/// Percentage `100·part/total`, NaN wherever `total <= epsilon`
pub fn share_series(part: &[f64], total: &[f64], epsilon: f64) -> Vec<f64> {
    part.iter()
        .zip(total)
        .map(|(&p, &t)| if t > epsilon { 100.0 * p / t } else { f64::NAN })
        .collect()
}

/// Detector for the bottleneck queue collapsing from above the high ECN
/// threshold to near the low one.
///
/// A candidate index `i` qualifies when the mean occupancy of the `window`
/// samples before it exceeds `high_fraction · Kmax` and the mean of the
/// `window` samples from it is below `low_fraction · Kmin`. Candidates are
/// restricted to `[edge_margin, n - edge_margin)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionDetector {
    pub edge_margin: usize,
    pub window: usize,
    pub high_fraction: f64,
    pub low_fraction: f64,
}

impl Default for TransitionDetector {
    fn default() -> Self {
        Self {
            edge_margin: 1000,
            window: 500,
            high_fraction: 0.95,
            low_fraction: 1.1,
        }
    }
}

impl TransitionDetector {
    /// First qualifying index, if any
    pub fn detect(&self, queue_bytes: &[f64], kmin: f64, kmax: f64) -> Option<usize> {
        let n = queue_bytes.len();
        if n <= 2 * self.edge_margin || self.window == 0 {
            return None;
        }

        let mut prefix = Vec::with_capacity(n + 1);
        prefix.push(0.0);
        for &q in queue_bytes {
            prefix.push(prefix[prefix.len() - 1] + q);
        }
        let range_mean = |lo: usize, hi: usize| (prefix[hi] - prefix[lo]) / (hi - lo) as f64;

        let high = self.high_fraction * kmax;
        let low = self.low_fraction * kmin;

        (self.edge_margin.max(1)..n - self.edge_margin).find(|&i| {
            let before = range_mean(i.saturating_sub(self.window), i);
            let after = range_mean(i, (i + self.window).min(n));
            before > high && after < low
        })
    }
}

/// Where the bottleneck left its congested regime
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeTransition {
    pub index: usize,
    pub time_us: f64,
}

/// Derived series of one flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowGoodput {
    pub protocol: Protocol,
    pub index: usize,
    pub label: String,
    pub goodput_gbps: Vec<f64>,
    pub cwnd_over_bdp: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drops: Option<Vec<f64>>,
}

/// Bandwidth share of each protocol over time, in percent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareSeries {
    /// From smoothed goodput; NaN where total goodput is ~0
    pub instantaneous: BTreeMap<Protocol, Vec<f64>>,
    /// From cumulative bytes; lower variance than the instantaneous share
    pub cumulative: BTreeMap<Protocol, Vec<f64>>,
}

/// Everything derived from one trace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeriesAnalysis {
    pub metadata: TraceMetadata,
    pub title: String,
    pub sample_interval_us: f64,
    pub smoothing_window_us: f64,
    pub window_samples: usize,
    pub time_us: Vec<f64>,
    pub flows: Vec<FlowGoodput>,
    pub protocol_goodput_gbps: BTreeMap<Protocol, Vec<f64>>,
    /// Present only when both protocols have at least one flow
    pub shares: Option<ShareSeries>,
    pub transition: Option<RegimeTransition>,
    pub queue_bytes: Vec<f64>,
    pub queue_drops: Vec<f64>,
}

/// Derive goodput, shares, normalized windows and the regime transition
pub fn analyze_trace(trace: &TimeSeriesTrace, config: &TimeSeriesConfig) -> TimeSeriesAnalysis {
    let n = trace.len();
    let dt = sample_interval(&trace.time_us);
    let window = smoothing_window_samples(config.smoothing_window_us, dt);
    let bdp = trace.metadata.bdp.max(1.0);
    log::debug!("Sample interval {}us, smoothing over {} samples", dt, window);

    let flows: Vec<FlowGoodput> = trace
        .flows
        .iter()
        .map(|flow| FlowGoodput {
            protocol: flow.protocol,
            index: flow.index,
            label: flow.label(),
            goodput_gbps: rolling_goodput_gbps(&flow.bytes, dt, window),
            cwnd_over_bdp: flow.cwnd.iter().map(|c| c / bdp).collect(),
            drops: flow.drops.clone(),
        })
        .collect();

    let present: Vec<Protocol> = Protocol::ALL
        .into_iter()
        .filter(|&p| trace.flow_count(p) > 0)
        .collect();

    let protocol_goodput_gbps: BTreeMap<Protocol, Vec<f64>> = present
        .iter()
        .map(|&p| {
            let series = flows.iter().filter(|f| f.protocol == p).map(|f| &f.goodput_gbps);
            (p, sum_series(series, n))
        })
        .collect();

    let shares = (present.len() == Protocol::ALL.len()).then(|| {
        let total_goodput = sum_series(protocol_goodput_gbps.values(), n);
        let cumulative_bytes: BTreeMap<Protocol, Vec<f64>> = present
            .iter()
            .map(|&p| {
                let series = trace.flows.iter().filter(|f| f.protocol == p).map(|f| &f.bytes);
                (p, sum_series(series, n))
            })
            .collect();
        let total_bytes = sum_series(cumulative_bytes.values(), n);

        ShareSeries {
            instantaneous: protocol_goodput_gbps
                .iter()
                .map(|(&p, gp)| (p, share_series(gp, &total_goodput, config.share_epsilon)))
                .collect(),
            cumulative: cumulative_bytes
                .iter()
                .map(|(&p, b)| (p, share_series(b, &total_bytes, config.share_epsilon)))
                .collect(),
        }
    });

    let transition = config
        .transition
        .detect(&trace.queue_bytes, trace.metadata.ecn_kmin, trace.metadata.ecn_kmax)
        .map(|index| RegimeTransition {
            index,
            time_us: trace.time_us[index],
        });
    match transition {
        Some(t) => log::info!("Regime shift at sample {} ({:.1}k us)", t.index, t.time_us / 1000.0),
        None => log::info!("No regime shift detected"),
    }

    TimeSeriesAnalysis {
        metadata: trace.metadata.clone(),
        title: trace.metadata.title(),
        sample_interval_us: dt,
        smoothing_window_us: config.smoothing_window_us,
        window_samples: window,
        time_us: trace.time_us.clone(),
        flows,
        protocol_goodput_gbps,
        shares,
        transition,
        queue_bytes: trace.queue_bytes.clone(),
        queue_drops: trace.queue_drops.clone(),
    }
}

/// Scalar digest of a trace analysis for console output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceDigest {
    pub samples: usize,
    pub flows_per_protocol: BTreeMap<Protocol, usize>,
    pub mean_goodput_gbps: BTreeMap<Protocol, f64>,
    /// Mean of the defined instantaneous share samples
    pub mean_share_pct: BTreeMap<Protocol, f64>,
    /// Last defined cumulative share
    pub final_cumulative_share_pct: BTreeMap<Protocol, f64>,
    pub peak_queue_bytes: f64,
    pub total_queue_drops: f64,
    pub transition_time_us: Option<f64>,
}

impl TimeSeriesAnalysis {
    pub fn digest(&self) -> TraceDigest {
        let mut flows_per_protocol = BTreeMap::new();
        for flow in &self.flows {
            *flows_per_protocol.entry(flow.protocol).or_insert(0) += 1;
        }

        let mean_goodput_gbps = self
            .protocol_goodput_gbps
            .iter()
            .map(|(&p, gp)| (p, mean(gp)))
            .collect();

        let (mean_share_pct, final_cumulative_share_pct) = match &self.shares {
            Some(shares) => (
                shares
                    .instantaneous
                    .iter()
                    .map(|(&p, s)| {
                        let defined: Vec<f64> = s.iter().copied().filter(|v| !v.is_nan()).collect();
                        (p, mean(&defined))
                    })
                    .collect(),
                shares
                    .cumulative
                    .iter()
                    .filter_map(|(&p, s)| Some((p, s.iter().rev().copied().find(|v| !v.is_nan())?)))
                    .collect(),
            ),
            None => (BTreeMap::new(), BTreeMap::new()),
        };

        TraceDigest {
            samples: self.time_us.len(),
            flows_per_protocol,
            mean_goodput_gbps,
            mean_share_pct,
            final_cumulative_share_pct,
            peak_queue_bytes: self.queue_bytes.iter().copied().fold(0.0, f64::max),
            total_queue_drops: self.queue_drops.last().copied().unwrap_or(0.0),
            transition_time_us: self.transition.map(|t| t.time_us),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TimeSeriesConfig {
        TimeSeriesConfig::default()
    }

    #[test]
    fn test_metadata_line() {
        let meta = TraceMetadata::parse(
            "# ecn_kmin=20000 ecn_kmax=80000 bdp=1.25e5 linkspeed_gbps=400 tcp_ecn=0",
            "trace.csv",
            &config(),
        );
        assert_eq!(meta.ecn_kmin, 20000.0);
        assert_eq!(meta.ecn_kmax, 80000.0);
        assert_eq!(meta.bdp, 125000.0);
        assert_eq!(meta.linkspeed_gbps, 400.0);
        assert_eq!(meta.marking_for(Protocol::Cubic), MarkingState::Off);
        assert_eq!(meta.marking_for(Protocol::Nscc), MarkingState::Unknown);
    }

    #[test]
    fn test_metadata_defaults_and_filename_inference() {
        let meta =
            TraceMetadata::parse("time_us,queue_bytes", "runs/mixed_tcpecnon.csv", &config());
        assert_eq!(meta.ecn_kmin, DEFAULT_ECN_KMIN);
        assert_eq!(meta.ecn_kmax, DEFAULT_ECN_KMAX);
        assert_eq!(meta.bdp, DEFAULT_BDP);
        assert_eq!(meta.linkspeed_gbps, DEFAULT_LINKSPEED_GBPS);
        assert_eq!(meta.marking_for(Protocol::Cubic), MarkingState::On);

        let meta = TraceMetadata::parse("# bdp=1", "TCP_ECN_OFF.csv", &config());
        assert_eq!(meta.marking_for(Protocol::Cubic), MarkingState::Off);
        assert!(meta.fabric_ecn());
    }

    #[test]
    fn test_title() {
        let meta = TraceMetadata::parse("# ecn_kmin=0 tcp_ecn=1", "t.csv", &config());
        assert_eq!(
            meta.title(),
            "NSCC vs TCP Cubic (fabric_ecn=off, tcp_ecn=on, Kmin=0KB, Kmax=146KB, BDP=100KB)"
        );
    }

    #[test]
    fn test_window_samples() {
        assert_eq!(smoothing_window_samples(2000.0, 1.0), 2000);
        assert_eq!(smoothing_window_samples(2000.0, 3.0), 666);
        assert_eq!(smoothing_window_samples(2000.0, 5000.0), 1);
        assert_eq!(sample_interval(&[0.0, 0.5, 1.0]), 0.5);
        assert_eq!(sample_interval(&[3.0]), 1.0);
        assert_eq!(sample_interval(&[3.0, 3.0]), 1.0);
    }

    #[test]
    fn test_first_difference() {
        assert_eq!(first_difference(&[5.0, 7.0, 10.0]), vec![0.0, 2.0, 3.0]);
        assert!(first_difference(&[]).is_empty());
    }

    #[test]
    fn test_uniform_smooth_same_matches_centered_convolution() {
        // full convolution of [1,2,3] with [1/3;3] is [1,3,6,5,3]/3; same-mode keeps [3,6,5]/3
        let out = uniform_smooth_same(&[1.0, 2.0, 3.0], 3);
        let expected = [1.0, 2.0, 5.0 / 3.0];
        for (a, b) in out.iter().zip(expected) {
            assert!((a - b).abs() < 1e-12);
        }

        // Even width keeps the leading part: offset (4-1)/2 = 1
        let out = uniform_smooth_same(&[4.0, 4.0, 4.0, 4.0, 4.0], 4);
        assert_eq!(out, vec![2.0, 3.0, 4.0, 4.0, 3.0]);

        // Wider than the series still yields one value per sample
        assert_eq!(uniform_smooth_same(&[1.0, 1.0], 10).len(), 2);
        assert_eq!(uniform_smooth_same(&[2.0, 6.0], 1), vec![2.0, 6.0]);
    }

    #[test]
    fn test_rolling_goodput_constant_rate() {
        // 12500 bytes every 1us sample == 100 Gbps
        let cumulative: Vec<f64> = (0..100).map(|i| i as f64 * 12500.0).collect();
        let gp = rolling_goodput_gbps(&cumulative, 1.0, 10);
        assert_eq!(gp.len(), 100);
        for v in &gp[10..90] {
            assert!((v - 100.0).abs() < 1e-9);
        }
        // First delta is zero, so the leading edge reads low
        assert!(gp[0] < 100.0);
    }

    #[test]
    fn test_share_series_epsilon() {
        let shares = share_series(&[1.0, 0.0, 3.0], &[4.0, 0.0, 3.0], SHARE_EPSILON);
        assert_eq!(shares[0], 25.0);
        assert!(shares[1].is_nan());
        assert_eq!(shares[2], 100.0);
    }

    #[test]
    fn test_transition_detected_near_step() {
        let (kmin, kmax) = (DEFAULT_ECN_KMIN, DEFAULT_ECN_KMAX);
        let step = 3000;
        let queue: Vec<f64> = (0..6000)
            .map(|i| if i < step { 1.2 * kmax } else { 0.5 * kmin })
            .collect();

        let idx = TransitionDetector::default().detect(&queue, kmin, kmax).unwrap();
        assert!(idx <= step);
        assert!(step - idx < 500, "detected at {}", idx);
    }

    #[test]
    fn test_transition_requires_enough_samples() {
        let detector = TransitionDetector::default();
        let queue = vec![0.0; 2000];
        assert!(detector.detect(&queue, 1.0, 2.0).is_none());

        // Flat congested queue never transitions
        let queue = vec![DEFAULT_ECN_KMAX * 1.2; 5000];
        assert!(detector.detect(&queue, DEFAULT_ECN_KMIN, DEFAULT_ECN_KMAX).is_none());
    }

    fn trace_text(samples: usize) -> String {
        let mut text = String::from("# ecn_kmin=37500 ecn_kmax=145500 bdp=100000 linkspeed_gbps=100 tcp_ecn=1\n");
        text.push_str("time_us,tcp0_cwnd,tcp0_bytes_acked,tcp0_drops,nscc0_cwnd,nscc0_bytes,nscc0_q0,queue_bytes,queue_drops\n");
        for i in 0..samples {
            let t = i as f64;
            text.push_str(&format!(
                "{},{},{},{},{},{},0,{},{}\n",
                t,
                50000,
                t * 1000.0,
                0,
                200000,
                t * 3000.0,
                10000,
                i / 10
            ));
        }
        text
    }

    #[test]
    fn test_parse_trace_discovers_flows() {
        let trace = parse_trace(&trace_text(20), "trace.csv", &config()).unwrap();
        assert_eq!(trace.len(), 20);
        assert_eq!(trace.flows.len(), 2);
        assert_eq!(trace.flow_count(Protocol::Cubic), 1);
        assert_eq!(trace.flow_count(Protocol::Nscc), 1);

        let tcp = trace.flows.iter().find(|f| f.protocol == Protocol::Cubic).unwrap();
        assert_eq!(tcp.bytes[2], 2000.0);
        assert!(tcp.drops.is_some());
        let nscc = trace.flows.iter().find(|f| f.protocol == Protocol::Nscc).unwrap();
        assert!(nscc.drops.is_none());
        assert_eq!(trace.metadata.marking_for(Protocol::Cubic), MarkingState::On);
    }

    #[test]
    fn test_delivered_bytes_column_per_protocol() {
        let text = "time_us,queue_bytes,queue_drops,tcp0_cwnd,tcp0_bytes_acked,tcp0_bytes,\
                    nscc0_cwnd,nscc0_bytes_acked,nscc0_bytes\n\
                    0,0,0,1,0,0,1,0,0\n\
                    1,0,0,1,10,999,1,7,30\n";
        let trace = parse_trace(text, "both.csv", &config()).unwrap();

        let tcp = trace.flows.iter().find(|f| f.protocol == Protocol::Cubic).unwrap();
        assert_eq!(tcp.bytes, vec![0.0, 10.0]);
        let nscc = trace.flows.iter().find(|f| f.protocol == Protocol::Nscc).unwrap();
        assert_eq!(nscc.bytes, vec![0.0, 30.0]);

        let text = "time_us,queue_bytes,queue_drops,tcp0_cwnd,tcp0_bytes\n0,0,0,1,5\n";
        let trace = parse_trace(text, "sent_only.csv", &config()).unwrap();
        assert_eq!(trace.flows[0].bytes, vec![5.0]);
    }

    #[test]
    fn test_marking_flag_values() {
        let meta = TraceMetadata::parse("# tcp_ecn=1 nscc_ecn=2", "t.csv", &config());
        assert_eq!(meta.marking_for(Protocol::Cubic), MarkingState::On);
        assert_eq!(meta.marking_for(Protocol::Nscc), MarkingState::Unknown);
        assert_eq!(MarkingState::from_flag(0.0), MarkingState::Off);
    }

    #[test]
    fn test_parse_trace_requires_queue_columns() {
        let text = "# bdp=1\ntime_us,tcp0_cwnd,tcp0_bytes_acked\n0,1,2\n";
        assert!(parse_trace(text, "bad.csv", &config()).is_err());
    }

    #[test]
    fn test_analyze_trace_shares() {
        let trace = parse_trace(&trace_text(50), "trace.csv", &config()).unwrap();
        let mut cfg = config();
        cfg.smoothing_window_us = 5.0;
        let analysis = analyze_trace(&trace, &cfg);

        assert_eq!(analysis.window_samples, 5);
        assert!(analysis.transition.is_none());
        let shares = analysis.shares.as_ref().unwrap();

        // NSCC delivers 3x the bytes of TCP
        let cumulative = &shares.cumulative[&Protocol::Nscc];
        assert!(cumulative[0].is_nan());
        assert!((cumulative[49] - 75.0).abs() < 1e-9);
        let instant = &shares.instantaneous[&Protocol::Nscc];
        assert!((instant[25] - 75.0).abs() < 1e-9);

        let tcp = analysis.flows.iter().find(|f| f.protocol == Protocol::Cubic).unwrap();
        assert_eq!(tcp.cwnd_over_bdp[0], 0.5);

        let digest = analysis.digest();
        assert_eq!(digest.samples, 50);
        assert!((digest.final_cumulative_share_pct[&Protocol::Cubic] - 25.0).abs() < 1e-9);
        assert_eq!(digest.total_queue_drops, 4.0);
        assert_eq!(digest.peak_queue_bytes, 10000.0);
    }

    #[test]
    fn test_single_protocol_trace_has_no_shares() {
        let text = "time_us,tcp0_cwnd,tcp0_bytes_acked,queue_bytes,queue_drops\n0,1,0,0,0\n1,1,10,0,0\n";
        let trace = parse_trace(text, "tcp_only.csv", &config()).unwrap();
        let analysis = analyze_trace(&trace, &config());
        assert!(analysis.shares.is_none());
        assert_eq!(analysis.protocol_goodput_gbps.len(), 1);
    }
}
