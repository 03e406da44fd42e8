//! Report generation for run and batch analysis.
//!
//! Tabular results go to CSV files, the full batch report to JSON, and a
//! short human-readable summary to stdout.

use std::fs;
use std::path::Path;

use color_eyre::eyre::{Context, Result};
use serde::Serialize;

use super::pipeline::RunAnalysis;
use super::types::*;

/// One node of one run, flattened for CSV
#[derive(Debug, Serialize)]
struct NodeRow<'a> {
    run_id: &'a str,
    protocol: &'a str,
    experiment_key: Option<f64>,
    node: NodeId,
    sent: usize,
    confirmed: usize,
    received: usize,
    received_bytes: usize,
    average_delay_ms: f64,
    average_hop_count: f64,
    active_window_seconds: f64,
    throughput_bytes_per_second: f64,
    packet_delivery_ratio_percent: f64,
    link_transmissions: usize,
    queue_full_drops: usize,
    not_for_us_drops: usize,
    events: usize,
}

#[derive(Debug, Serialize)]
struct RunRow<'a> {
    run_id: &'a str,
    protocol: &'a str,
    experiment_key: f64,
    active_nodes: usize,
    total_nodes: usize,
    sent: f64,
    confirmed: f64,
    received: f64,
    average_delay_ms: f64,
    average_hop_count: f64,
    active_window_seconds: f64,
    throughput_bytes_per_second: f64,
    packet_delivery_ratio_percent: f64,
    latency_median_ms: f64,
    latency_min_ms: f64,
    latency_max_ms: f64,
    pdr_median_percent: f64,
    pdr_min_percent: f64,
    pdr_max_percent: f64,
    throughput_median: f64,
    throughput_min: f64,
    throughput_max: f64,
    network_ready_seconds: Option<f64>,
    sending_done_seconds: Option<f64>,
}

#[derive(Debug, Serialize)]
struct GroupRow {
    experiment_key: f64,
    runs: usize,
    metric: &'static str,
    mean: f64,
    stderr: f64,
    ci_lower: f64,
    ci_upper: f64,
    median: f64,
    min: f64,
    max: f64,
}

impl GroupRow {
    fn new(group: &GroupStatistics, metric: &'static str, stats: &MetricStatistics) -> Self {
        Self {
            experiment_key: group.experiment_key,
            runs: group.runs,
            metric,
            mean: stats.mean,
            stderr: stats.stderr,
            ci_lower: stats.ci_lower,
            ci_upper: stats.ci_upper,
            median: stats.median,
            min: stats.min,
            max: stats.max,
        }
    }
}

/// Serialize `rows` to a CSV file with a header line
fn write_csv<T, I>(rows: I, output_path: &Path) -> Result<()>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let mut writer = csv::Writer::from_path(output_path)
        .with_context(|| format!("Failed to create {}", output_path.display()))?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("Failed to write row to {}", output_path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", output_path.display()))?;

    log::info!("CSV written to {}", output_path.display());
    Ok(())
}

/// Per-node metrics of every analyzed run
pub fn write_nodes_csv(runs: &[RunAnalysis], output_path: &Path) -> Result<()> {
    let rows = runs.iter().flat_map(|run| {
        run.nodes.iter().map(move |m| NodeRow {
            run_id: &run.run_id,
            protocol: &run.protocol,
            experiment_key: run.experiment_key,
            node: m.node,
            sent: m.sent,
            confirmed: m.confirmed,
            received: m.received,
            received_bytes: m.received_bytes,
            average_delay_ms: m.average_delay_ms,
            average_hop_count: m.average_hop_count,
            active_window_seconds: m.active_window_seconds,
            throughput_bytes_per_second: m.throughput_bytes_per_second,
            packet_delivery_ratio_percent: m.packet_delivery_ratio_percent,
            link_transmissions: m.link_transmissions,
            queue_full_drops: m.queue_full_drops,
            not_for_us_drops: m.not_for_us_drops,
            events: m.events,
        })
    });
    write_csv(rows, output_path)
}

/// One row per summarized run
pub fn write_runs_csv(summaries: &[RunSummary], output_path: &Path) -> Result<()> {
    let rows = summaries.iter().map(|s| RunRow {
        run_id: &s.run_id,
        protocol: &s.protocol,
        experiment_key: s.experiment_key,
        active_nodes: s.active_nodes,
        total_nodes: s.total_nodes,
        sent: s.sent,
        confirmed: s.confirmed,
        received: s.received,
        average_delay_ms: s.average_delay_ms,
        average_hop_count: s.average_hop_count,
        active_window_seconds: s.active_window_seconds,
        throughput_bytes_per_second: s.throughput_bytes_per_second,
        packet_delivery_ratio_percent: s.packet_delivery_ratio_percent,
        latency_median_ms: s.spread.latency_ms.median,
        latency_min_ms: s.spread.latency_ms.min,
        latency_max_ms: s.spread.latency_ms.max,
        pdr_median_percent: s.spread.packet_delivery_ratio_percent.median,
        pdr_min_percent: s.spread.packet_delivery_ratio_percent.min,
        pdr_max_percent: s.spread.packet_delivery_ratio_percent.max,
        throughput_median: s.spread.throughput_bytes_per_second.median,
        throughput_min: s.spread.throughput_bytes_per_second.min,
        throughput_max: s.spread.throughput_bytes_per_second.max,
        network_ready_seconds: s.readiness.network_ready_seconds,
        sending_done_seconds: s.readiness.sending_done_seconds,
    });
    write_csv(rows, output_path)
}

/// One row per experiment key and metric, ascending by key
pub fn write_groups_csv(groups: &[GroupStatistics], output_path: &Path) -> Result<()> {
    let rows = groups.iter().flat_map(|g| {
        [
            GroupRow::new(g, "latency_ms", &g.latency_ms),
            GroupRow::new(g, "pdr_percent", &g.packet_delivery_ratio_percent),
            GroupRow::new(g, "throughput_bytes_per_second", &g.throughput_bytes_per_second),
            GroupRow::new(g, "bitrate_bits_per_second", &g.bitrate_bits_per_second),
        ]
    });
    write_csv(rows, output_path)
}

pub fn write_timeline_csv(buckets: &[TimelineBucket], output_path: &Path) -> Result<()> {
    write_csv(buckets, output_path)
}

/// Write the batch report (metadata, run summaries, group statistics) as pretty JSON
pub fn generate_json_report(report: &BatchReport, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)
        .context("Failed to serialize report to JSON")?;

    fs::write(output_path, json)
        .with_context(|| format!("Failed to write JSON report to {}", output_path.display()))?;

    log::info!("JSON report written to {}", output_path.display());
    Ok(())
}

/// Print the per-node table of one run to stdout
pub fn print_run_summary(run: &RunAnalysis) {
    println!("\n=== RUN {} ({}) ===\n", run.run_id, run.protocol);
    if let Some(key) = run.experiment_key {
        println!("Experiment key: {}", key);
    }
    println!(
        "Tracked sends: {}  unmatched receives: {}  overwritten: {}",
        run.trace.records.len(),
        run.trace.unmatched_receives,
        run.trace.overwritten
    );
    let seconds = |value: Option<f64>| value.map_or("-".to_string(), |s| format!("{:.1}s", s));
    println!(
        "Network formed: {}  senders done: {}",
        seconds(run.readiness.network_ready_seconds),
        seconds(run.readiness.sending_done_seconds)
    );
    println!();
    println!(
        "{:>6} {:>6} {:>6} {:>6} {:>12} {:>6} {:>10} {:>8}",
        "node", "sent", "conf", "recv", "delay_ms", "hops", "bytes/s", "pdr_%"
    );
    for m in &run.nodes {
        println!(
            "{:>6} {:>6} {:>6} {:>6} {:>12.1} {:>6.2} {:>10.2} {:>8.1}",
            m.node,
            m.sent,
            m.confirmed,
            m.received,
            m.average_delay_ms,
            m.average_hop_count,
            m.throughput_bytes_per_second,
            m.packet_delivery_ratio_percent
        );
    }

    match &run.summary {
        Some(s) => {
            println!();
            println!("Active nodes: {}/{}", s.active_nodes, s.total_nodes);
            println!(
                "  Latency: {:.1}ms (median {:.1}, min {:.1}, max {:.1})",
                s.average_delay_ms,
                s.spread.latency_ms.median,
                s.spread.latency_ms.min,
                s.spread.latency_ms.max
            );
            println!("  PDR: {:.1}%", s.packet_delivery_ratio_percent);
            println!("  Throughput: {:.2} B/s", s.throughput_bytes_per_second);
        }
        None => println!("\nNo active nodes in this run"),
    }
    println!();
}

/// Print the per-group table of a batch to stdout
pub fn print_summary(report: &BatchReport) {
    let meta = &report.metadata;
    println!("\n=== MESH TRACE ANALYSIS SUMMARY ===\n");
    println!("Logs: {}", meta.logs_dir);
    println!("Files found: {}", meta.files_found);
    println!("Runs summarized: {}", meta.runs_summarized);
    if !meta.skipped_unreadable.is_empty() {
        println!("  Unreadable: {}", meta.skipped_unreadable.join(", "));
    }
    if !meta.skipped_inactive.is_empty() {
        println!("  No active nodes: {}", meta.skipped_inactive.join(", "));
    }
    if !meta.skipped_unkeyed.is_empty() {
        println!("  No experiment key: {}", meta.skipped_unkeyed.join(", "));
    }

    println!();
    println!(
        "{:>10} {:>5} {:>22} {:>20} {:>22}",
        "key", "runs", "latency_ms (±95%)", "pdr_% (±95%)", "bytes/s (±95%)"
    );
    for g in &report.groups {
        println!(
            "{:>10.2} {:>5} {:>13.1} ±{:>7.1} {:>11.1} ±{:>7.1} {:>13.2} ±{:>7.2}",
            g.experiment_key,
            g.runs,
            g.latency_ms.mean,
            g.latency_ms.ci_half_width_95,
            g.packet_delivery_ratio_percent.mean,
            g.packet_delivery_ratio_percent.ci_half_width_95,
            g.throughput_bytes_per_second.mean,
            g.throughput_bytes_per_second.ci_half_width_95
        );
    }
    println!();
}

/// Print a timeline to stdout
pub fn print_timeline(buckets: &[TimelineBucket]) {
    println!(
        "\n{:>8} {:>6} {:>6} {:>6} {:>6} {:>6} {:>12} {:>8} {:>6}",
        "start_s", "q1", "q2", "sent", "conf", "recv", "latency_s", "trickle", "drops"
    );
    for b in buckets {
        println!(
            "{:>8.0} {:>6} {:>6} {:>6} {:>6} {:>6} {:>12.3} {:>8} {:>6}",
            b.start_seconds,
            b.max_queue1,
            b.max_queue2,
            b.sent,
            b.confirmed,
            b.received,
            b.average_latency_seconds,
            b.trickle_resets,
            b.drops
        );
    }
    println!();
}
