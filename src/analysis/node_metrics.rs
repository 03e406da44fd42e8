//! Per-node performance metrics for one run.

use serde::{Deserialize, Serialize};

use super::correlator::RunTrace;
use super::stats::mean;
use super::types::*;

/// Denominator used for the packet delivery ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PdrPolicy {
    /// received / sent; offered load (CSMA)
    #[default]
    BySent,
    /// received / confirmed; load that got a transmission slot (TSCH)
    ByConfirmed,
}

impl PdrPolicy {
    pub fn ratio_percent(&self, sent: usize, confirmed: usize, received: usize) -> f64 {
        let denominator = match self {
            PdrPolicy::BySent => sent,
            PdrPolicy::ByConfirmed => confirmed,
        };
        if denominator == 0 {
            0.0
        } else {
            received as f64 / denominator as f64 * 100.0
        }
    }

    /// Whether a node counts toward a run's averages
    pub fn is_active(&self, metrics: &NodeMetrics) -> bool {
        let confirmed_ok = match self {
            PdrPolicy::BySent => true,
            PdrPolicy::ByConfirmed => metrics.confirmed > 0,
        };
        metrics.sent > 0 && metrics.received > 0 && confirmed_ok
    }
}

impl std::fmt::Display for PdrPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PdrPolicy::BySent => write!(f, "by-sent"),
            PdrPolicy::ByConfirmed => write!(f, "by-confirmed"),
        }
    }
}

/// Conversion between simulator ticks and wall-clock units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickRate {
    pub ticks_per_second: f64,
}

impl Default for TickRate {
    /// Cooja logs microseconds
    fn default() -> Self {
        Self { ticks_per_second: 1_000_000.0 }
    }
}

impl TickRate {
    pub fn to_millis(&self, ticks: f64) -> f64 {
        ticks * 1_000.0 / self.ticks_per_second
    }

    pub fn to_seconds(&self, ticks: f64) -> f64 {
        ticks / self.ticks_per_second
    }
}

/// Settings for metric computation
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub pdr_policy: PdrPolicy,
    pub tick_rate: TickRate,
}

/// Compute metrics for one sender from its records and raw counters
pub fn compute_node_metrics(
    node: NodeId,
    records: &[&MessageRecord],
    counters: &NodeCounters,
    config: &MetricsConfig,
) -> NodeMetrics {
    let sent = records.len();
    let confirmed = records.iter().filter(|r| r.confirmed).count();

    let received_records: Vec<&MessageRecord> =
        records.iter().copied().filter(|r| r.is_received()).collect();
    let received = received_records.len();

    let delays: Vec<f64> = received_records
        .iter()
        .filter_map(|r| r.delay_ticks())
        .map(|d| d as f64)
        .collect();
    let hops: Vec<f64> = received_records
        .iter()
        .filter_map(|r| r.hop_count)
        .map(f64::from)
        .collect();
    let received_bytes: usize = received_records.iter().map(|r| r.payload_bytes()).sum();

    let first_send = records.iter().map(|r| r.send_tick).min();
    let last_receive = received_records.iter().filter_map(|r| r.receive_tick).max();

    let active_window_seconds = match (first_send, last_receive) {
        (Some(first), Some(last)) if last > first => {
            config.tick_rate.to_seconds((last - first) as f64)
        }
        _ => 0.0,
    };

    let throughput_bytes_per_second = if active_window_seconds > 0.0 {
        received_bytes as f64 / active_window_seconds
    } else {
        0.0
    };

    NodeMetrics {
        node,
        sent,
        confirmed,
        received,
        received_bytes,
        average_delay_ms: config.tick_rate.to_millis(mean(&delays)),
        average_hop_count: mean(&hops),
        active_window_seconds,
        throughput_bytes_per_second,
        packet_delivery_ratio_percent: config.pdr_policy.ratio_percent(sent, confirmed, received),
        link_transmissions: counters.confirms,
        queue_full_drops: counters.queue_full_drops,
        not_for_us_drops: counters.not_for_us_drops,
        events: counters.events,
    }
}

/// Compute metrics for every node that sent at least one tracked message
pub fn compute_run_metrics(trace: &RunTrace, config: &MetricsConfig) -> Vec<NodeMetrics> {
    let empty = NodeCounters::default();

    trace
        .records_by_sender()
        .into_iter()
        .map(|(node, records)| {
            let counters = trace.counters.get(&node).unwrap_or(&empty);
            compute_node_metrics(node, &records, counters, config)
        })
        .collect()
}
