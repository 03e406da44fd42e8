//! Fixed-width time buckets over one run.
//!
//! Used to inspect how queues, deliveries and latency evolve during a
//! simulation, e.g. whether a network settles before load is applied.

use std::collections::BTreeMap;
use std::time::Duration;

use super::correlator::RunTrace;
use super::node_metrics::TickRate;
use super::stats::mean;
use super::types::*;

/// Bucket events and correlated records into windows of `bucket` length.
///
/// Sends and confirmations count in the bucket of their send tick,
/// receptions and latency in the bucket of their receive tick.
pub fn build_timeline(
    events: &[Event],
    trace: &RunTrace,
    tick_rate: TickRate,
    bucket: Duration,
) -> Vec<TimelineBucket> {
    let bucket_ticks = (bucket.as_secs_f64() * tick_rate.ticks_per_second).round() as u64;
    if bucket_ticks == 0 {
        log::warn!("Timeline bucket shorter than one tick, no timeline produced");
        return Vec::new();
    }
    let index_of = |tick: Tick| tick / bucket_ticks;

    let mut buckets: BTreeMap<u64, TimelineBucket> = BTreeMap::new();
    let mut latencies: BTreeMap<u64, Vec<f64>> = BTreeMap::new();

    for event in events {
        let slot = buckets.entry(index_of(event.tick())).or_default();
        match event {
            Event::QueueSample { depth1, depth2, .. } => {
                slot.max_queue1 = slot.max_queue1.max(*depth1);
                slot.max_queue2 = slot.max_queue2.max(*depth2);
            }
            Event::TrickleReset { .. } => slot.trickle_resets += 1,
            Event::Drop { .. } => slot.drops += 1,
            _ => {}
        }
    }

    for record in &trace.records {
        let slot = buckets.entry(index_of(record.send_tick)).or_default();
        slot.sent += 1;
        if record.confirmed {
            slot.confirmed += 1;
        }

        if let (Some(receive), Some(delay)) = (record.receive_tick, record.delay_ticks()) {
            let index = index_of(receive);
            buckets.entry(index).or_default().received += 1;
            latencies
                .entry(index)
                .or_default()
                .push(tick_rate.to_seconds(delay as f64));
        }
    }

    buckets
        .into_iter()
        .map(|(index, mut slot)| {
            slot.bucket = index;
            slot.start_seconds = tick_rate.to_seconds((index * bucket_ticks) as f64);
            slot.average_latency_seconds = latencies.get(&index).map_or(0.0, |l| mean(l));
            slot
        })
        .collect()
}
