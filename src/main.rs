//! Performance analysis CLI for Cooja mesh network simulations.
//!
//! Reconstructs message lifecycles from run logs and reports latency,
//! delivery ratio and throughput per node, per run and per experiment.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result};

use meshtrace::analysis::{
    self,
    aggregate::{aggregate, NodeSample},
    report, EventCache, FilenameKey,
};
use meshtrace::config::AnalysisConfig;
use meshtrace::config_loader;

#[derive(Parser, Debug)]
#[command(name = "meshtrace")]
#[command(about = "Performance analysis for Cooja mesh network simulations")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the analysis configuration YAML file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory for reports
    #[arg(short, long, default_value = "analysis_output")]
    output: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Number of parallel workers (0 = auto-detect)
    #[arg(short = 'j', long, default_value = "0")]
    threads: usize,

    /// Directory for cached parsed events
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a single run log
    Run {
        /// Run log file
        log: PathBuf,
    },

    /// Analyze every run log in a directory and aggregate by experiment key
    Batch {
        /// Directory containing run logs
        dir: PathBuf,

        /// Also aggregate active nodes individually instead of per-run means
        #[arg(long)]
        node_groups: bool,
    },

    /// Bucketed activity of a single run
    Timeline {
        /// Run log file
        log: PathBuf,

        /// Bucket width in seconds (overrides the configuration)
        #[arg(long)]
        bucket_secs: Option<u64>,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .init();

    // Set thread pool size
    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    let config = config_loader::load_or_default(cli.config.as_deref())?;
    let key = FilenameKey::new(config.key_mode);
    let cache = cli.cache_dir.as_ref().map(EventCache::new);

    fs::create_dir_all(&cli.output)
        .with_context(|| format!("Failed to create output directory: {}", cli.output.display()))?;

    match cli.command {
        Commands::Run { log } => {
            let run = analysis::analyze_run(&log, &config, &key, cache.as_ref())?;
            report::write_nodes_csv(std::slice::from_ref(&run), &cli.output.join("nodes.csv"))?;
            report::print_run_summary(&run);
        }
        Commands::Batch { dir, node_groups } => {
            run_batch(&cli.output, &dir, &config, &key, cache.as_ref(), node_groups)?;
        }
        Commands::Timeline { log, bucket_secs } => {
            let bucket = bucket_secs
                .map(Duration::from_secs)
                .unwrap_or(config.timeline_bucket);
            let events = analysis::pipeline::load_events(&log, cache.as_ref())?;
            let run = analysis::pipeline::analyze_events(&log, &events, &config, &key);
            let timeline = analysis::build_timeline(&events, &run.trace, config.tick_rate(), bucket);

            report::write_timeline_csv(&timeline, &cli.output.join("timeline.csv"))?;
            report::print_timeline(&timeline);
        }
    }

    Ok(())
}

fn run_batch(
    output_dir: &Path,
    logs_dir: &Path,
    config: &AnalysisConfig,
    key: &FilenameKey,
    cache: Option<&EventCache>,
    node_groups: bool,
) -> Result<()> {
    log::info!("Running batch analysis...");
    let batch = analysis::analyze_batch(logs_dir, config, key, cache)?;

    report::write_nodes_csv(&batch.runs, &output_dir.join("nodes.csv"))?;
    report::write_runs_csv(&batch.report.runs, &output_dir.join("runs.csv"))?;
    report::write_groups_csv(&batch.report.groups, &output_dir.join("groups.csv"))?;
    analysis::generate_json_report(&batch.report, &output_dir.join("report.json"))?;

    if node_groups {
        let samples: Vec<NodeSample> = batch
            .runs
            .iter()
            .filter_map(|run| run.experiment_key.map(|k| (run, k)))
            .flat_map(|(run, experiment_key)| {
                let policy = config.pdr_policy(&run.protocol);
                run.nodes
                    .iter()
                    .filter(move |m| policy.is_active(m))
                    .map(move |m| NodeSample { experiment_key, metrics: m.clone() })
            })
            .collect();
        let groups = aggregate(&samples);
        report::write_groups_csv(&groups, &output_dir.join("node_groups.csv"))?;
    }

    report::print_summary(&batch.report);

    log::info!("Analysis complete. Reports written to {}", output_dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["meshtrace", "batch", "logs"]);

        assert_eq!(cli.output, PathBuf::from("analysis_output"));
        assert_eq!(cli.log_level, "info");
        assert_eq!(cli.threads, 0);
        assert!(cli.config.is_none());
        match cli.command {
            Commands::Batch { dir, node_groups } => {
                assert_eq!(dir, PathBuf::from("logs"));
                assert!(!node_groups);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_options() {
        let cli = Cli::parse_from([
            "meshtrace",
            "--config", "analysis.yaml",
            "-j", "4",
            "--cache-dir", "/tmp/meshtrace",
            "timeline", "TSCH_6_1.testlog",
            "--bucket-secs", "30",
        ]);

        assert_eq!(cli.config, Some(PathBuf::from("analysis.yaml")));
        assert_eq!(cli.threads, 4);
        assert_eq!(cli.cache_dir, Some(PathBuf::from("/tmp/meshtrace")));
        assert!(matches!(
            cli.command,
            Commands::Timeline { bucket_secs: Some(30), .. }
        ));
    }

    #[test]
    fn test_missing_subcommand_rejected() {
        assert!(Cli::try_parse_from(["meshtrace", "--output", "out"]).is_err());
    }
}
