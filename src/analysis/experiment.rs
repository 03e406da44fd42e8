//! Experiment keys derived from log file names.
//!
//! Batch runs are named `<PROTOCOL>_<interval>_<run>.testlog`, e.g.
//! `TSCH_50_3.testlog` or `CSMA_0.1_2.testlog`, where the interval is the
//! number of seconds between two messages of one sender.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static FILENAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<protocol>[A-Za-z][A-Za-z0-9-]*)_(?P<interval>\d+(?:\.\d+)?)_(?P<run>\d+)")
        .expect("Invalid filename regex")
});

/// Which number identifies an experiment group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyMode {
    /// Seconds between messages, as encoded in the file name
    Interval,
    /// Messages per minute (60 / interval)
    #[default]
    MessagesPerMinute,
}

/// Fields encoded in a run's file name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunName {
    pub protocol: String,
    pub interval_seconds: f64,
    pub run: u32,
}

impl RunName {
    pub fn parse(filename: &str) -> Option<Self> {
        let caps = FILENAME_PATTERN.captures(filename)?;
        Some(Self {
            protocol: caps.name("protocol")?.as_str().to_string(),
            interval_seconds: caps.name("interval")?.as_str().parse().ok()?,
            run: caps.name("run")?.as_str().parse().ok()?,
        })
    }

    pub fn messages_per_minute(&self) -> Option<f64> {
        if self.interval_seconds <= 0.0 {
            return None;
        }
        Some(round2(60.0 / self.interval_seconds))
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Maps a run's file name to its experiment key
pub trait ExperimentKey: Sync {
    fn experiment_key(&self, filename: &str) -> Option<f64>;

    /// Protocol variant encoded in the name, if any
    fn protocol(&self, filename: &str) -> Option<String>;
}

/// Key extraction for the `<PROTOCOL>_<interval>_<run>` naming convention
#[derive(Debug, Clone, Copy, Default)]
pub struct FilenameKey {
    pub mode: KeyMode,
}

impl FilenameKey {
    pub fn new(mode: KeyMode) -> Self {
        Self { mode }
    }
}

impl ExperimentKey for FilenameKey {
    fn experiment_key(&self, filename: &str) -> Option<f64> {
        let name = RunName::parse(filename)?;
        match self.mode {
            KeyMode::Interval => Some(name.interval_seconds),
            KeyMode::MessagesPerMinute => name.messages_per_minute(),
        }
    }

    fn protocol(&self, filename: &str) -> Option<String> {
        RunName::parse(filename).map(|n| n.protocol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_name() {
        let name = RunName::parse("TSCH_50_3.testlog").unwrap();
        assert_eq!(name.protocol, "TSCH");
        assert_eq!(name.interval_seconds, 50.0);
        assert_eq!(name.run, 3);

        let name = RunName::parse("CSMA_0.1_12.testlog").unwrap();
        assert_eq!(name.protocol, "CSMA");
        assert_eq!(name.interval_seconds, 0.1);
        assert_eq!(name.run, 12);

        assert!(RunName::parse("COOJA.testlog").is_none());
    }

    #[test]
    fn test_key_modes() {
        let per_minute = FilenameKey::default();
        assert_eq!(per_minute.experiment_key("TSCH_6_1.testlog"), Some(10.0));
        assert_eq!(per_minute.experiment_key("CSMA_0.1_1.testlog"), Some(600.0));
        assert_eq!(per_minute.experiment_key("TSCH_7_1.testlog"), Some(8.57));
        assert_eq!(per_minute.experiment_key("TSCH_0_1.testlog"), None);

        let interval = FilenameKey::new(KeyMode::Interval);
        assert_eq!(interval.experiment_key("TSCH_50_1.testlog"), Some(50.0));
        assert_eq!(interval.protocol("TSCH_50_1.testlog").as_deref(), Some("TSCH"));
    }
}
