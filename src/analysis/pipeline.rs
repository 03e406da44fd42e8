//! Per-run and batch analysis of Cooja run logs.
//!
//! A run goes extraction → correlation → node metrics → run summary. A batch
//! discovers every run log in a directory, analyzes runs in parallel and
//! aggregates the surviving summaries by experiment key.

use std::fs;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Context, Result};
use rayon::prelude::*;

use super::aggregate::aggregate;
use super::cache::EventCache;
use super::correlator::{correlate, RunTrace};
use super::experiment::ExperimentKey;
use super::log_parser::parse_log_file;
use super::node_metrics::compute_run_metrics;
use super::run_summary::{readiness, summarize_run, RunIdentity};
use super::types::*;
use crate::config::AnalysisConfig;

/// Protocol label for runs whose file name does not encode one
pub const UNKNOWN_PROTOCOL: &str = "unknown";

/// Batch-level failures that stop the analysis
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("No .{extension} log files found in {dir}")]
    NoLogFiles { dir: PathBuf, extension: String },
}

/// Everything derived from one run log
#[derive(Debug, Clone)]
pub struct RunAnalysis {
    pub path: PathBuf,
    pub run_id: String,
    pub protocol: String,
    pub experiment_key: Option<f64>,
    pub trace: RunTrace,
    pub nodes: Vec<NodeMetrics>,
    pub readiness: Readiness,
    /// `None` when the run has no active node
    pub summary: Option<RunSummary>,
}

/// Result of a batch: the report plus per-run detail for node-level output
#[derive(Debug, Clone)]
pub struct BatchAnalysis {
    pub report: BatchReport,
    pub runs: Vec<RunAnalysis>,
}

/// Run log files in `dir` with the given extension, sorted by name
pub fn discover_logs(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read log directory {}", dir.display()))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
        })
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(AnalysisError::NoLogFiles {
            dir: dir.to_path_buf(),
            extension: extension.to_string(),
        }
        .into());
    }

    Ok(files)
}

/// Events of one log, through the cache when one is configured
pub fn load_events(path: &Path, cache: Option<&EventCache>) -> Result<Vec<Event>> {
    match cache {
        Some(cache) => cache.load_or_parse(path),
        None => parse_log_file(path),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn run_id(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Analyze an already extracted event stream
pub fn analyze_events<K: ExperimentKey>(
    path: &Path,
    events: &[Event],
    config: &AnalysisConfig,
    key: &K,
) -> RunAnalysis {
    let name = file_name(path);
    let protocol = key
        .protocol(&name)
        .unwrap_or_else(|| UNKNOWN_PROTOCOL.to_string());
    let experiment_key = key.experiment_key(&name);

    let trace = correlate(events, &config.correlator_config(&protocol));
    let metrics_config = config.metrics_config(&protocol);
    let nodes = compute_run_metrics(&trace, &metrics_config);

    let identity = RunIdentity {
        run_id: run_id(path),
        protocol: protocol.clone(),
        experiment_key: experiment_key.unwrap_or(f64::NAN),
    };
    let ready = readiness(&trace, metrics_config.tick_rate);
    let summary = summarize_run(&identity, &nodes, metrics_config.pdr_policy, ready);

    if trace.overwritten > 0 {
        log::debug!(
            "{}: {} pending sends overwritten by a reused payload",
            name,
            trace.overwritten
        );
    }

    RunAnalysis {
        path: path.to_path_buf(),
        run_id: identity.run_id,
        protocol,
        experiment_key,
        trace,
        nodes,
        readiness: ready,
        summary,
    }
}

/// Read and analyze one run log
pub fn analyze_run<K: ExperimentKey>(
    path: &Path,
    config: &AnalysisConfig,
    key: &K,
    cache: Option<&EventCache>,
) -> Result<RunAnalysis> {
    let events = load_events(path, cache)?;
    log::debug!("Parsed {}: {} events", path.display(), events.len());
    Ok(analyze_events(path, &events, config, key))
}

enum RunOutcome {
    Analyzed(RunAnalysis),
    Unreadable(String),
}

/// Analyze every run log in `dir` and aggregate by experiment key
pub fn analyze_batch<K: ExperimentKey>(
    dir: &Path,
    config: &AnalysisConfig,
    key: &K,
    cache: Option<&EventCache>,
) -> Result<BatchAnalysis> {
    let files = discover_logs(dir, &config.log_extension)?;
    log::info!("Analyzing {} run logs from {}", files.len(), dir.display());

    let outcomes: Vec<RunOutcome> = files
        .par_iter()
        .map(|path| match analyze_run(path, config, key, cache) {
            Ok(run) => RunOutcome::Analyzed(run),
            Err(e) => {
                log::warn!("Skipping unreadable log {}: {:#}", path.display(), e);
                RunOutcome::Unreadable(file_name(path))
            }
        })
        .collect();

    let mut runs = Vec::new();
    let mut skipped_unreadable = Vec::new();
    for outcome in outcomes {
        match outcome {
            RunOutcome::Analyzed(run) => runs.push(run),
            RunOutcome::Unreadable(name) => skipped_unreadable.push(name),
        }
    }

    let mut summaries = Vec::new();
    let mut skipped_inactive = Vec::new();
    let mut skipped_unkeyed = Vec::new();
    for run in &runs {
        let name = file_name(&run.path);
        if run.experiment_key.is_none() {
            log::warn!("No experiment key in file name {}, run excluded", name);
            skipped_unkeyed.push(name);
            continue;
        }
        match &run.summary {
            Some(summary) => summaries.push(summary.clone()),
            None => {
                log::info!("{}: no active nodes, run excluded", name);
                skipped_inactive.push(name);
            }
        }
    }

    let groups = aggregate(&summaries);
    log::info!(
        "Summarized {} of {} runs into {} groups",
        summaries.len(),
        files.len(),
        groups.len()
    );

    let metadata = AnalysisMetadata {
        analysis_timestamp: chrono::Utc::now().to_rfc3339(),
        logs_dir: dir.display().to_string(),
        files_found: files.len(),
        runs_analyzed: runs.len(),
        runs_summarized: summaries.len(),
        skipped_unreadable,
        skipped_inactive,
        skipped_unkeyed,
    };

    Ok(BatchAnalysis {
        report: BatchReport {
            metadata,
            runs: summaries,
            groups,
        },
        runs,
    })
}
