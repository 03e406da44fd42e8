use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::analysis::correlator::{CorrelatorConfig, DEFAULT_CONFIRM_LOOKAHEAD, DEFAULT_SINK_NODE};
use crate::analysis::experiment::KeyMode;
use crate::analysis::node_metrics::{MetricsConfig, PdrPolicy, TickRate};
use crate::analysis::types::NodeId;

/// Per-protocol analysis settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProtocolProfile {
    /// Denominator of the delivery ratio for this MAC layer
    pub pdr_policy: PdrPolicy,
    /// Overrides the global confirmation lookahead
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm_lookahead: Option<usize>,
}

/// Analysis configuration, loaded from YAML or defaulted
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Collector node whose receptions close correlations
    pub sink_node: Option<NodeId>,
    /// Sending nodes to track; all nodes when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_nodes: Option<Vec<NodeId>>,
    /// Events searched after a send for the link-layer confirmation
    pub confirm_lookahead: usize,
    /// Simulator ticks per second (Cooja logs microseconds)
    pub ticks_per_second: f64,
    /// Extension of run log files in batch mode
    pub log_extension: String,
    /// How the experiment key is derived from file names
    pub key_mode: KeyMode,
    /// Policy for protocols without a profile
    pub default_pdr_policy: PdrPolicy,
    /// Profiles keyed by the protocol prefix of the file name
    pub protocols: BTreeMap<String, ProtocolProfile>,
    /// Width of timeline buckets
    #[serde(with = "humantime_serde")]
    pub timeline_bucket: Duration,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let mut protocols = BTreeMap::new();
        protocols.insert(
            "TSCH".to_string(),
            ProtocolProfile { pdr_policy: PdrPolicy::ByConfirmed, confirm_lookahead: None },
        );
        protocols.insert(
            "CSMA".to_string(),
            ProtocolProfile { pdr_policy: PdrPolicy::BySent, confirm_lookahead: None },
        );

        Self {
            sink_node: Some(DEFAULT_SINK_NODE),
            sender_nodes: None,
            confirm_lookahead: DEFAULT_CONFIRM_LOOKAHEAD,
            ticks_per_second: 1_000_000.0,
            log_extension: "testlog".to_string(),
            key_mode: KeyMode::default(),
            default_pdr_policy: PdrPolicy::default(),
            protocols,
            timeline_bucket: Duration::from_secs(60),
        }
    }
}

impl AnalysisConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.ticks_per_second.is_finite() && self.ticks_per_second > 0.0) {
            return Err(ValidationError::InvalidTiming(format!(
                "ticks_per_second must be positive, got {}",
                self.ticks_per_second
            )));
        }

        if self.timeline_bucket.is_zero() {
            return Err(ValidationError::InvalidTiming(
                "timeline_bucket cannot be zero".to_string(),
            ));
        }

        if self.log_extension.trim().is_empty() {
            return Err(ValidationError::InvalidInput(
                "log_extension cannot be empty".to_string(),
            ));
        }

        if let Some(senders) = &self.sender_nodes {
            if senders.is_empty() {
                return Err(ValidationError::InvalidNodes(
                    "sender_nodes cannot be an empty list".to_string(),
                ));
            }
            if let Some(sink) = self.sink_node {
                if senders.contains(&sink) {
                    return Err(ValidationError::InvalidNodes(format!(
                        "sink node {} cannot also be a sender",
                        sink
                    )));
                }
            }
        }

        Ok(())
    }

    /// Profile for a protocol name, matched case-insensitively
    pub fn profile(&self, protocol: &str) -> Option<&ProtocolProfile> {
        self.protocols
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(protocol))
            .map(|(_, profile)| profile)
    }

    pub fn pdr_policy(&self, protocol: &str) -> PdrPolicy {
        self.profile(protocol)
            .map(|p| p.pdr_policy)
            .unwrap_or(self.default_pdr_policy)
    }

    pub fn tick_rate(&self) -> TickRate {
        TickRate { ticks_per_second: self.ticks_per_second }
    }

    pub fn correlator_config(&self, protocol: &str) -> CorrelatorConfig {
        CorrelatorConfig {
            sink_node: self.sink_node,
            sender_nodes: self.sender_nodes.as_ref().map(|s| s.iter().copied().collect()),
            confirm_lookahead: self
                .profile(protocol)
                .and_then(|p| p.confirm_lookahead)
                .unwrap_or(self.confirm_lookahead),
        }
    }

    pub fn metrics_config(&self, protocol: &str) -> MetricsConfig {
        MetricsConfig {
            pdr_policy: self.pdr_policy(protocol),
            tick_rate: self.tick_rate(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid timing configuration: {0}")]
    InvalidTiming(String),
    #[error("Invalid node configuration: {0}")]
    InvalidNodes(String),
    #[error("Invalid input configuration: {0}")]
    InvalidInput(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_parsing() {
        let yaml = r#"
sink_node: 1
sender_nodes: [2, 3, 4]
confirm_lookahead: 12
timeline_bucket: 30s
key_mode: interval
protocols:
  TSCH:
    pdr_policy: by_confirmed
    confirm_lookahead: 20
"#;

        let config: AnalysisConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.sink_node, Some(1));
        assert_eq!(config.timeline_bucket, Duration::from_secs(30));
        assert_eq!(config.key_mode, KeyMode::Interval);
        assert_eq!(config.ticks_per_second, 1_000_000.0);

        // Protocol override wins over the global lookahead
        assert_eq!(config.correlator_config("tsch").confirm_lookahead, 20);
        assert_eq!(config.correlator_config("CSMA").confirm_lookahead, 12);
        assert_eq!(config.pdr_policy("CSMA"), PdrPolicy::BySent);
    }

    #[test]
    fn test_default_policies() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pdr_policy("TSCH"), PdrPolicy::ByConfirmed);
        assert_eq!(config.pdr_policy("CSMA"), PdrPolicy::BySent);
        assert_eq!(config.pdr_policy("unknown"), PdrPolicy::BySent);
        assert_eq!(config.correlator_config("TSCH").sink_node, Some(16));
    }

    #[test]
    fn test_validation_errors() {
        let config = AnalysisConfig { ticks_per_second: 0.0, ..Default::default() };
        assert!(matches!(config.validate(), Err(ValidationError::InvalidTiming(_))));

        let config = AnalysisConfig { sender_nodes: Some(vec![16]), ..Default::default() };
        assert!(matches!(config.validate(), Err(ValidationError::InvalidNodes(_))));

        let config = AnalysisConfig { sender_nodes: Some(Vec::new()), ..Default::default() };
        assert!(config.validate().is_err());

        let config = AnalysisConfig { timeline_bucket: Duration::ZERO, ..Default::default() };
        assert!(config.validate().is_err());
    }
}
