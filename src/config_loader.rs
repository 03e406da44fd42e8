use crate::config::AnalysisConfig;
use color_eyre::eyre::{Context, Result};
use log::info;
use std::fs::File;
use std::path::Path;

/// Load and parse configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<AnalysisConfig> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .with_context(|| format!("Failed to open config {}", config_path.display()))?;

    let config: AnalysisConfig = serde_yaml::from_reader(file)
        .with_context(|| format!("Failed to parse config {}", config_path.display()))?;

    config.validate()?;

    Ok(config)
}

/// Load the configuration file if one is given, otherwise use defaults
pub fn load_or_default(config_path: Option<&Path>) -> Result<AnalysisConfig> {
    match config_path {
        Some(path) => load_config(path),
        None => {
            info!("No configuration file given, using defaults");
            Ok(AnalysisConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::node_metrics::PdrPolicy;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let yaml = r#"
sink_node: 1
ticks_per_second: 1000
timeline_bucket: 2m
default_pdr_policy: by_confirmed
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.sink_node, Some(1));
        assert_eq!(config.ticks_per_second, 1000.0);
        assert_eq!(config.timeline_bucket, Duration::from_secs(120));
        assert_eq!(config.pdr_policy("RPL"), PdrPolicy::ByConfirmed);
        // Unspecified fields keep their defaults
        assert_eq!(config.log_extension, "testlog");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "ticks_per_second: -5\n").unwrap();
        assert!(load_config(temp_file.path()).is_err());

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "sink_node: [not, a, number]\n").unwrap();
        assert!(load_config(temp_file.path()).is_err());
    }

    #[test]
    fn test_defaults_without_file() {
        let config = load_or_default(None).unwrap();
        assert_eq!(config, AnalysisConfig::default());
        assert!(load_or_default(Some(Path::new("/nonexistent/meshtrace.yaml"))).is_err());
    }
}
