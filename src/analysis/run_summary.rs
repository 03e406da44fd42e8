//! Reduction of a run's node metrics to a single summary row.

use super::correlator::RunTrace;
use super::node_metrics::{PdrPolicy, TickRate};
use super::stats::{mean, spread};
use super::types::*;

/// Identity of the run being summarized
#[derive(Debug, Clone, PartialEq)]
pub struct RunIdentity {
    pub run_id: String,
    pub protocol: String,
    pub experiment_key: f64,
}

/// Network formation and end-of-schedule times of a run.
///
/// The network counts as formed at the last TSCH association of any node.
/// Senders count as finished at the latest of the tracked senders' first
/// "All messages send" markers; runs where none logged one report `None`.
pub fn readiness(trace: &RunTrace, tick_rate: TickRate) -> Readiness {
    let sending_done = trace
        .counters
        .values()
        .filter_map(|c| c.sending_done_tick)
        .max();

    Readiness {
        network_ready_seconds: trace
            .last_association_tick
            .map(|t| tick_rate.to_seconds(t as f64)),
        sending_done_seconds: sending_done.map(|t| tick_rate.to_seconds(t as f64)),
    }
}

/// Average every node metric across the run's active nodes.
///
/// Returns `None` when no node is active; such runs are excluded from
/// aggregation rather than contributing zeros.
pub fn summarize_run(
    identity: &RunIdentity,
    nodes: &[NodeMetrics],
    policy: PdrPolicy,
    readiness: Readiness,
) -> Option<RunSummary> {
    let active: Vec<&NodeMetrics> = nodes.iter().filter(|m| policy.is_active(m)).collect();
    if active.is_empty() {
        return None;
    }

    let field = |f: fn(&NodeMetrics) -> f64| -> Vec<f64> { active.iter().map(|m| f(m)).collect() };

    let latency = field(|m| m.average_delay_ms);
    let pdr = field(|m| m.packet_delivery_ratio_percent);
    let throughput = field(|m| m.throughput_bytes_per_second);

    Some(RunSummary {
        run_id: identity.run_id.clone(),
        protocol: identity.protocol.clone(),
        experiment_key: identity.experiment_key,
        active_nodes: active.len(),
        total_nodes: nodes.len(),
        sent: mean(&field(|m| m.sent as f64)),
        confirmed: mean(&field(|m| m.confirmed as f64)),
        received: mean(&field(|m| m.received as f64)),
        average_delay_ms: mean(&latency),
        average_hop_count: mean(&field(|m| m.average_hop_count)),
        active_window_seconds: mean(&field(|m| m.active_window_seconds)),
        throughput_bytes_per_second: mean(&throughput),
        packet_delivery_ratio_percent: mean(&pdr),
        spread: RunSpread {
            latency_ms: spread(&latency),
            packet_delivery_ratio_percent: spread(&pdr),
            throughput_bytes_per_second: spread(&throughput),
        },
        readiness,
    })
}
