//! Trace reconstruction and performance analysis for Cooja mesh simulations.
//!
//! This module turns simulator logs into message lifecycles, per-node
//! metrics, run summaries and per-experiment statistics.

pub mod types;
pub mod log_parser;
pub mod correlator;
pub mod node_metrics;
pub mod run_summary;
pub mod stats;
pub mod aggregate;
pub mod experiment;
pub mod cache;
pub mod timeline;
pub mod pipeline;
pub mod report;

pub use types::*;
pub use log_parser::{extract_event, extract_events, parse_log_file};
pub use correlator::{correlate, CorrelatorConfig, RunTrace};
pub use node_metrics::{compute_run_metrics, MetricsConfig, PdrPolicy, TickRate};
pub use run_summary::summarize_run;
pub use aggregate::aggregate;
pub use experiment::{ExperimentKey, FilenameKey, KeyMode};
pub use cache::EventCache;
pub use timeline::build_timeline;
pub use pipeline::{analyze_batch, analyze_run, AnalysisError, BatchAnalysis, RunAnalysis};
pub use report::generate_json_report;
