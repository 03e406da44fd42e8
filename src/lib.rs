//! # Meshtrace - Performance analysis for Cooja mesh network simulations
//!
//! This library reconstructs message lifecycles from Cooja/Contiki-NG
//! simulation logs and reduces them to latency, delivery ratio and
//! throughput figures per node, per run and per experiment.
//!
//! ## Overview
//!
//! Each simulation run writes one log. Sensor nodes send payloads towards a
//! sink node over a multi-hop mesh (CSMA or TSCH MAC). A run's log is
//! processed in four stages:
//!
//! - **Extraction**: log lines become typed events (`analysis::log_parser`)
//! - **Correlation**: sends are matched to receptions at the sink by payload
//!   and to link-layer confirmations by lookahead (`analysis::correlator`)
//! - **Node metrics**: per-sender delay, hop count, throughput and PDR
//!   (`analysis::node_metrics`)
//! - **Run summary**: the mean over the run's active nodes
//!   (`analysis::run_summary`)
//!
//! Batches of runs are grouped by an experiment key taken from the file name
//! and reduced to means with 95% confidence intervals (`analysis::aggregate`).
//!
//! ## Architecture
//!
//! - `analysis`: extraction, correlation, metrics, aggregation and reports
//! - `config`: analysis settings and validation
//! - `config_loader`: YAML configuration loading
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use meshtrace::analysis::{analyze_batch, FilenameKey};
//! use meshtrace::config_loader;
//!
//! let config = config_loader::load_or_default(None)?;
//! let key = FilenameKey::new(config.key_mode);
//! let batch = analyze_batch(Path::new("logs"), &config, &key, None)?;
//!
//! for group in &batch.report.groups {
//!     println!("{}: {:.1}ms", group.experiment_key, group.latency_ms.mean);
//! }
//! # Ok::<(), color_eyre::eyre::Error>(())
//! ```
//!
//! ## Configuration Format
//!
//! ```yaml
//! sink_node: 16
//! confirm_lookahead: 10
//! ticks_per_second: 1000000
//! key_mode: messages_per_minute   # or interval
//! timeline_bucket: 1m
//! protocols:
//!   TSCH:
//!     pdr_policy: by_confirmed
//!   CSMA:
//!     pdr_policy: by_sent
//! ```
//!
//! ## Error Handling
//!
//! Library errors are typed with `thiserror`; file-level helpers and the
//! binary report through `color_eyre` with context.

pub mod analysis;
pub mod config;
pub mod config_loader;
