//! Send/Receive/Confirm correlation for one run.
//!
//! Log lines carry no message identifier, so a Send is matched to a Receive
//! by payload and to a link-layer Confirm by node within a bounded number of
//! following events.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::types::*;

/// Default number of events scanned after a Send for its Confirm
pub const DEFAULT_CONFIRM_LOOKAHEAD: usize = 10;

/// Default collector mote in the experiment topology
pub const DEFAULT_SINK_NODE: NodeId = 16;

/// Correlation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelatorConfig {
    /// Only Receives logged by this node count; `None` accepts any node
    pub sink_node: Option<NodeId>,
    /// Only Sends from these nodes are tracked; `None` tracks every node
    pub sender_nodes: Option<BTreeSet<NodeId>>,
    /// Number of subsequent events searched for a Confirm
    pub confirm_lookahead: usize,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            sink_node: Some(DEFAULT_SINK_NODE),
            sender_nodes: None,
            confirm_lookahead: DEFAULT_CONFIRM_LOOKAHEAD,
        }
    }
}

impl CorrelatorConfig {
    fn tracks_sender(&self, node: NodeId) -> bool {
        self.sender_nodes
            .as_ref()
            .map_or(true, |senders| senders.contains(&node))
    }

    fn is_sink(&self, node: NodeId) -> bool {
        self.sink_node.map_or(true, |sink| sink == node)
    }
}

/// Pending-match table between Sends and Receives.
///
/// Implementations map whatever correlation key the log provides to the
/// index of the record awaiting its Receive.
pub trait CorrelationTable {
    /// Register a Send; returns the record index it displaced, if any
    fn open(&mut self, payload: &str, record: usize) -> Option<usize>;
    /// Close the correlation for a Receive, returning the matched record index
    fn close(&mut self, payload: &str) -> Option<usize>;
    /// Number of correlations still open
    fn pending(&self) -> usize;
}

/// Single-slot table keyed by payload text; the last Send of a payload wins
#[derive(Debug, Default)]
pub struct PayloadTable {
    slots: HashMap<String, usize>,
}

impl CorrelationTable for PayloadTable {
    fn open(&mut self, payload: &str, record: usize) -> Option<usize> {
        self.slots.insert(payload.to_string(), record)
    }

    fn close(&mut self, payload: &str) -> Option<usize> {
        self.slots.remove(payload)
    }

    fn pending(&self) -> usize {
        self.slots.len()
    }
}

/// Correlation output for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunTrace {
    /// One record per tracked Send, in file order
    pub records: Vec<MessageRecord>,
    /// Raw per-node counters
    pub counters: BTreeMap<NodeId, NodeCounters>,
    /// Sends overwritten before any Receive closed them
    pub overwritten: usize,
    /// Receives with no pending Send
    pub unmatched_receives: usize,
    /// Last TSCH association of any node
    pub last_association_tick: Option<Tick>,
}

impl RunTrace {
    /// Records grouped by sending node
    pub fn records_by_sender(&self) -> BTreeMap<NodeId, Vec<&MessageRecord>> {
        let mut by_sender: BTreeMap<NodeId, Vec<&MessageRecord>> = BTreeMap::new();
        for record in &self.records {
            by_sender.entry(record.sender).or_default().push(record);
        }
        by_sender
    }
}

/// Whether a Confirm from `node` appears in the `lookahead` events after `index`
fn confirmed_within(events: &[Event], index: usize, node: NodeId, lookahead: usize) -> bool {
    events
        .iter()
        .skip(index + 1)
        .take(lookahead)
        .any(|event| matches!(event, Event::Confirm { node: n, .. } if *n == node))
}

/// Correlate a run's ordered event stream using payload matching
pub fn correlate(events: &[Event], config: &CorrelatorConfig) -> RunTrace {
    correlate_with(events, config, PayloadTable::default())
}

/// Correlate a run's ordered event stream with a custom pending table
pub fn correlate_with<T: CorrelationTable>(
    events: &[Event],
    config: &CorrelatorConfig,
    mut table: T,
) -> RunTrace {
    let mut trace = RunTrace::default();

    for (index, event) in events.iter().enumerate() {
        if let Some(node) = event.node() {
            trace.counters.entry(node).or_default().events += 1;
        }

        match event {
            Event::Send { tick, node, payload } => {
                if !config.tracks_sender(*node) {
                    continue;
                }
                trace.counters.entry(*node).or_default().sends += 1;

                let record_index = trace.records.len();
                trace.records.push(MessageRecord {
                    sender: *node,
                    payload: payload.clone(),
                    send_tick: *tick,
                    receive_tick: None,
                    hop_count: None,
                    confirmed: confirmed_within(events, index, *node, config.confirm_lookahead),
                });

                if let Some(previous) = table.open(payload, record_index) {
                    // The displaced Send stays in the record set, unreceived
                    log::trace!(
                        "Payload '{}' reused by node {} before record {} was received",
                        payload,
                        node,
                        previous
                    );
                    trace.overwritten += 1;
                }
            }
            Event::Receive { tick, node, payload, hop_count } => {
                if !config.is_sink(*node) {
                    continue;
                }
                match table.close(payload) {
                    Some(record_index) => {
                        if let Some(record) = trace.records.get_mut(record_index) {
                            record.receive_tick = Some(*tick);
                            record.hop_count = Some(*hop_count);
                        }
                    }
                    None => trace.unmatched_receives += 1,
                }
            }
            Event::Confirm { node, .. } => {
                trace.counters.entry(*node).or_default().confirms += 1;
            }
            Event::AssociationComplete { tick, .. } => {
                trace.last_association_tick = trace.last_association_tick.max(Some(*tick));
            }
            Event::SendingDone { tick, node } => {
                if config.tracks_sender(*node) {
                    let counters = trace.counters.entry(*node).or_default();
                    counters.sending_done_tick.get_or_insert(*tick);
                }
            }
            Event::Drop { node, reason, .. } => {
                let counters = trace.counters.entry(*node).or_default();
                match reason {
                    DropReason::QueueFull => counters.queue_full_drops += 1,
                    DropReason::NotForUs => counters.not_for_us_drops += 1,
                }
            }
            _ => {}
        }
    }

    log::debug!(
        "Correlated {} sends: {} still pending, {} overwritten, {} unmatched receives",
        trace.records.len(),
        table.pending(),
        trace.overwritten,
        trace.unmatched_receives
    );

    trace
}
