use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use validator::Validate;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Config {
    /// Model artifact locations
    #[validate(nested)]
    pub artifacts: ArtifactConfig,

    /// Feature pipeline configuration
    #[serde(default)]
    pub features: FeatureConfig,

    /// Ranking configuration
    #[serde(default)]
    #[validate(nested)]
    pub ranking: RankingConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("FLEET_RISK_CONFIG").unwrap_or_else(|_| "config/local.toml".to_string());
        Self::load_from(&config_path)
    }

    /// Load with an explicit override file
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(config_path).required(false))
            // Override with environment variables (prefix: FLEET_RISK_)
            .add_source(
                config::Environment::with_prefix("FLEET_RISK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ArtifactConfig {
    /// Fitted scaler (`.json` or `.bin`)
    pub scaler_path: PathBuf,

    /// Trained classifier (`.json` or `.bin`)
    pub model_path: PathBuf,

    /// Expected SHA-256 of the scaler file, lowercase hex
    #[serde(default)]
    #[validate(length(equal = 64))]
    pub scaler_sha256: Option<String>,

    /// Expected SHA-256 of the model file, lowercase hex
    #[serde(default)]
    #[validate(length(equal = 64))]
    pub model_sha256: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Base features the model consumes unscaled
    #[serde(default)]
    pub passthrough: Vec<String>,

    /// Extra raw field name -> canonical name mappings
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RankingConfig {
    /// Score records on the rayon pool
    #[serde(default = "default_true")]
    pub parallel: bool,

    /// Smallest batch worth parallelising
    #[serde(default = "default_parallel_threshold")]
    #[validate(range(min = 1))]
    pub parallel_threshold: usize,

    /// A vehicle is due for maintenance once its last service is older than this
    #[serde(default = "default_maintenance_interval_days")]
    #[validate(range(min = 1, max = 3650))]
    pub maintenance_interval_days: i64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            parallel: default_true(),
            parallel_threshold: default_parallel_threshold(),
            maintenance_interval_days: default_maintenance_interval_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            prometheus_enabled: default_true(),
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_parallel_threshold() -> usize {
    64
}

fn default_maintenance_interval_days() -> i64 {
    365
}

fn default_log_level() -> String {
    "info".to_string()
}
