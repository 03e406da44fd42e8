//! Core data types for trace reconstruction and metric aggregation.

use serde::{Deserialize, Serialize};

/// Simulator clock value (Cooja logs microseconds)
pub type Tick = u64;

/// Mote identifier as printed in the second column of the log
pub type NodeId = u32;

/// Why a node discarded a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DropReason {
    /// CSMA filtered a unicast frame addressed to another node
    NotForUs,
    /// Outgoing packet rejected because the MAC queue was full
    QueueFull,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::NotForUs => write!(f, "not for us"),
            DropReason::QueueFull => write!(f, "queue full"),
        }
    }
}

/// A typed event extracted from one log line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// Application handed a message to the network stack
    Send {
        tick: Tick,
        node: NodeId,
        payload: String,
    },
    /// Sink delivered a message to the application
    Receive {
        tick: Tick,
        node: NodeId,
        payload: String,
        hop_count: u32,
    },
    /// Link layer actually transmitted a queued packet
    Confirm { tick: Tick, node: NodeId },
    Drop {
        tick: Tick,
        node: NodeId,
        reason: DropReason,
    },
    /// MAC queue occupancy sample
    QueueSample {
        tick: Tick,
        node: NodeId,
        depth1: u32,
        depth2: u32,
        capacity: u32,
    },
    /// Node joined the TSCH network
    AssociationComplete { tick: Tick, node: NodeId },
    /// Sender finished its message schedule
    SendingDone { tick: Tick, node: NodeId },
    /// RPL trickle timer reset or doubling
    TrickleReset { tick: Tick, node: NodeId },
    /// Any other line carrying a tick
    Tick { tick: Tick, node: Option<NodeId> },
}

impl Event {
    pub fn tick(&self) -> Tick {
        match self {
            Event::Send { tick, .. }
            | Event::Receive { tick, .. }
            | Event::Confirm { tick, .. }
            | Event::Drop { tick, .. }
            | Event::QueueSample { tick, .. }
            | Event::AssociationComplete { tick, .. }
            | Event::SendingDone { tick, .. }
            | Event::TrickleReset { tick, .. }
            | Event::Tick { tick, .. } => *tick,
        }
    }

    pub fn node(&self) -> Option<NodeId> {
        match self {
            Event::Send { node, .. }
            | Event::Receive { node, .. }
            | Event::Confirm { node, .. }
            | Event::Drop { node, .. }
            | Event::QueueSample { node, .. }
            | Event::AssociationComplete { node, .. }
            | Event::SendingDone { node, .. }
            | Event::TrickleReset { node, .. } => Some(*node),
            Event::Tick { node, .. } => *node,
        }
    }
}

/// The reconstructed lifecycle of one Send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub sender: NodeId,
    pub payload: String,
    pub send_tick: Tick,
    pub receive_tick: Option<Tick>,
    pub hop_count: Option<u32>,
    /// A Confirm from the sender followed within the lookahead window
    pub confirmed: bool,
}

impl MessageRecord {
    pub fn is_received(&self) -> bool {
        self.receive_tick.is_some()
    }

    /// End-to-end delay in ticks, if the message arrived
    pub fn delay_ticks(&self) -> Option<Tick> {
        self.receive_tick
            .map(|receive| receive.saturating_sub(self.send_tick))
    }

    /// Payload size as counted for throughput
    pub fn payload_bytes(&self) -> usize {
        self.payload.len()
    }
}

/// Coarse per-node counters collected alongside correlation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCounters {
    pub sends: usize,
    /// Every Confirm event, regardless of which Send it belongs to
    pub confirms: usize,
    pub queue_full_drops: usize,
    pub not_for_us_drops: usize,
    /// Extracted events attributed to the node, of any kind
    pub events: usize,
    /// First "All messages send" marker of a tracked sender
    pub sending_done_tick: Option<Tick>,
}

/// Performance metrics for one sending node in one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub node: NodeId,
    pub sent: usize,
    pub confirmed: usize,
    pub received: usize,
    pub received_bytes: usize,
    pub average_delay_ms: f64,
    pub average_hop_count: f64,
    pub active_window_seconds: f64,
    pub throughput_bytes_per_second: f64,
    pub packet_delivery_ratio_percent: f64,
    pub link_transmissions: usize,
    pub queue_full_drops: usize,
    pub not_for_us_drops: usize,
    pub events: usize,
}

/// When the network formed and when senders finished, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Readiness {
    /// Last TSCH association of any node
    pub network_ready_seconds: Option<f64>,
    /// Latest of the tracked senders' first "All messages send" markers
    pub sending_done_seconds: Option<f64>,
}

/// Median/min/max of a metric across a run's active nodes
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Spread {
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

/// Node-level dispersion inside one run
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RunSpread {
    pub latency_ms: Spread,
    pub packet_delivery_ratio_percent: Spread,
    pub throughput_bytes_per_second: Spread,
}

/// One run reduced to the mean over its active nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub protocol: String,
    pub experiment_key: f64,
    pub active_nodes: usize,
    pub total_nodes: usize,
    pub sent: f64,
    pub confirmed: f64,
    pub received: f64,
    pub average_delay_ms: f64,
    pub average_hop_count: f64,
    pub active_window_seconds: f64,
    pub throughput_bytes_per_second: f64,
    pub packet_delivery_ratio_percent: f64,
    pub spread: RunSpread,
    pub readiness: Readiness,
}

/// Descriptive statistics with a Student-t 95% confidence interval
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricStatistics {
    pub mean: f64,
    pub stderr: f64,
    pub ci_half_width_95: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

/// Statistics for every tracked metric of one experiment key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStatistics {
    pub experiment_key: f64,
    pub runs: usize,
    pub latency_ms: MetricStatistics,
    pub packet_delivery_ratio_percent: MetricStatistics,
    pub throughput_bytes_per_second: MetricStatistics,
    pub bitrate_bits_per_second: MetricStatistics,
}

/// Metrics the aggregator knows how to read from a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    LatencyMs,
    PacketDeliveryRatio,
    Throughput,
}

/// Per-bucket activity for timeline plots
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimelineBucket {
    pub bucket: u64,
    pub start_seconds: f64,
    pub max_queue1: u32,
    pub max_queue2: u32,
    pub sent: usize,
    pub confirmed: usize,
    pub received: usize,
    pub average_latency_seconds: f64,
    pub trickle_resets: usize,
    pub drops: usize,
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub analysis_timestamp: String,
    pub logs_dir: String,
    pub files_found: usize,
    pub runs_analyzed: usize,
    pub runs_summarized: usize,
    pub skipped_unreadable: Vec<String>,
    pub skipped_inactive: Vec<String>,
    pub skipped_unkeyed: Vec<String>,
}

/// Complete batch report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub metadata: AnalysisMetadata,
    pub runs: Vec<RunSummary>,
    pub groups: Vec<GroupStatistics>,
}
