//! Bot configuration loaded from a YAML file with environment overrides.
//!
//! Every section has workable defaults, so a config file is only needed to
//! change them. Secrets (`TELEGRAM_BOT_TOKEN`, `CDSAPI_KEY`) come from the
//! environment and never live in the file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info};
use turb_common::{BoundingBox, RegionRegistry};

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub chart: ChartConfig,
    /// Regions added on top of the built-in continents.
    #[serde(default)]
    pub regions: Vec<RegionEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Overridden by `TELEGRAM_BOT_TOKEN` when set.
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Long-poll timeout for getUpdates.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

fn default_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout() -> u64 {
    50
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_url: default_api_url(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    /// Where downloaded NetCDF fields are kept.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Days ERA5 trails real time.
    #[serde(default = "default_latency_days")]
    pub latency_days: i64,
    /// Distinct (date, hour) fields held in memory.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Total wait for a CDS job before it counts as timed out.
    #[serde(default = "default_download_wait")]
    pub download_wait_secs: u64,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/data/era5")
}

fn default_latency_days() -> i64 {
    5
}

fn default_cache_capacity() -> usize {
    8
}

fn default_download_wait() -> u64 {
    600
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            latency_days: default_latency_days(),
            cache_capacity: default_cache_capacity(),
            download_wait_secs: default_download_wait(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Lower analysis level in hPa (larger number, lower altitude).
    #[serde(default = "default_lower_hpa")]
    pub lower_hpa: f32,
    #[serde(default = "default_upper_hpa")]
    pub upper_hpa: f32,
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
}

fn default_lower_hpa() -> f32 {
    500.0
}

fn default_upper_hpa() -> f32 {
    300.0
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            lower_hpa: default_lower_hpa(),
            upper_hpa: default_upper_hpa(),
            thresholds: ThresholdsConfig::default(),
        }
    }
}

/// Severity breakpoints in m/s per km, ascending.
#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdsConfig {
    #[serde(default = "default_light")]
    pub light: f32,
    #[serde(default = "default_moderate")]
    pub moderate: f32,
    #[serde(default = "default_severe")]
    pub severe: f32,
    #[serde(default = "default_extreme")]
    pub extreme: f32,
}

fn default_light() -> f32 {
    2.0
}

fn default_moderate() -> f32 {
    4.0
}

fn default_severe() -> f32 {
    7.0
}

fn default_extreme() -> f32 {
    10.0
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            light: default_light(),
            moderate: default_moderate(),
            severe: default_severe(),
            extreme: default_extreme(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// How many times a timed-out download is retried.
    #[serde(default = "default_timeout_retries")]
    pub max_timeout_retries: u32,
    /// First retry delay; doubles per attempt.
    #[serde(default = "default_retry_delay")]
    pub retry_initial_delay_secs: u64,
}

fn default_timeout_retries() -> u32 {
    2
}

fn default_retry_delay() -> u64 {
    2
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_timeout_retries: default_timeout_retries(),
            retry_initial_delay_secs: default_retry_delay(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartConfig {
    #[serde(default = "default_panel_width")]
    pub panel_width: u32,
    /// Font files tried before the built-in system candidates.
    #[serde(default)]
    pub font_paths: Vec<String>,
}

fn default_panel_width() -> u32 {
    900
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            panel_width: default_panel_width(),
            font_paths: Vec::new(),
        }
    }
}

/// Extra region as (north, west, south, east) edges in degrees.
#[derive(Debug, Clone, Deserialize)]
pub struct RegionEntry {
    pub name: String,
    pub north: f64,
    pub west: f64,
    pub south: f64,
    pub east: f64,
}

impl BotConfig {
    /// Load from a YAML file, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                let config: BotConfig = serde_yaml::from_str(&content)
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
                debug!(path = %path.display(), "Loaded bot config");
                config
            }
            None => BotConfig::default(),
        };

        if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
            if !token.trim().is_empty() {
                config.telegram.token = token;
            }
        }

        Ok(config)
    }

    /// Built-in regions plus any configured extras.
    pub fn region_registry(&self) -> Result<RegionRegistry> {
        let mut registry = RegionRegistry::builtin();
        for entry in &self.regions {
            let bbox = BoundingBox::from_nwse(entry.north, entry.west, entry.south, entry.east)
                .with_context(|| format!("Bad bounding box for region {:?}", entry.name))?;
            registry.insert(&entry.name, bbox);
        }
        info!(count = registry.len(), "Region registry ready");
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BotConfig::default();
        assert_eq!(config.analysis.lower_hpa, 500.0);
        assert_eq!(config.analysis.upper_hpa, 300.0);
        assert_eq!(config.analysis.thresholds.light, 2.0);
        assert_eq!(config.data.latency_days, 5);
        assert_eq!(config.pipeline.max_timeout_retries, 2);
        assert_eq!(config.chart.panel_width, 900);
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
telegram:
  api_url: "https://api.telegram.example"
  poll_timeout_secs: 30

data:
  data_dir: /tmp/era5-test
  latency_days: 6
  cache_capacity: 4

analysis:
  lower_hpa: 700
  upper_hpa: 400
  thresholds:
    light: 3
    moderate: 6
    severe: 9
    extreme: 12

pipeline:
  max_timeout_retries: 1

chart:
  panel_width: 1200
  font_paths:
    - /opt/fonts/Custom.ttf

regions:
  - name: Alps
    north: 48.0
    west: 5.0
    south: 44.0
    east: 17.0
"#;
        let config: BotConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.telegram.poll_timeout_secs, 30);
        assert_eq!(config.data.latency_days, 6);
        assert_eq!(config.analysis.upper_hpa, 400.0);
        assert_eq!(config.analysis.thresholds.extreme, 12.0);
        assert_eq!(config.pipeline.max_timeout_retries, 1);
        assert_eq!(config.chart.panel_width, 1200);
        assert_eq!(config.regions.len(), 1);

        let registry = config.region_registry().unwrap();
        assert!(registry.resolve("alps").is_ok());
        assert!(registry.resolve("Europe").is_ok());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let yaml = r#"
data:
  latency_days: 7
"#;
        let config: BotConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.data.latency_days, 7);
        assert_eq!(config.data.cache_capacity, default_cache_capacity());
        assert_eq!(config.analysis.thresholds.severe, 7.0);
    }
}
