//! Agent configuration
//!
//! Layered as defaults, then the YAML file, then `SCREENPILOT_*`
//! environment overrides. CLI flags are applied last by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use action_primitives::DecoderConfig;
use inference_engine::TensorSpec;
use screenpilot_core_types::ScreenSize;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub const ENV_PERIOD_MS: &str = "SCREENPILOT_PERIOD_MS";
pub const ENV_MODEL_DIR: &str = "SCREENPILOT_MODEL_DIR";
pub const ENV_MODEL_SHA256: &str = "SCREENPILOT_MODEL_SHA256";
pub const ENV_DEBUG_DIR: &str = "SCREENPILOT_DEBUG_DIR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid value for {key}: {value:?}")]
    InvalidOverride { key: String, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    pub period_ms: u64,
    pub model: ModelConfig,
    pub tensor: TensorSpec,
    pub decoder: DecoderConfig,
    pub screen: ScreenConfig,
    pub capture: CaptureConfig,
    /// Buffered status events per subscriber
    pub status_capacity: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            period_ms: 200,
            model: ModelConfig::default(),
            tensor: TensorSpec::default(),
            decoder: DecoderConfig::default(),
            screen: ScreenConfig::default(),
            capture: CaptureConfig::default(),
            status_capacity: 64,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModelConfig {
    pub dir: PathBuf,
    pub file_name: String,
    /// Expected artifact size; files under 90% of it are not ready
    pub min_size_bytes: u64,
    /// Hex SHA-256; integrity is only enforced when set
    pub sha256: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let dir = dirs::data_dir()
            .map(|dir| dir.join("screenpilot").join("models"))
            .unwrap_or_else(|| PathBuf::from("models"));
        Self {
            dir,
            file_name: "agent.spdn".to_string(),
            min_size_bytes: 0,
            sha256: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScreenConfig {
    pub width: u32,
    pub height: u32,
    pub click_duration_ms: u64,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 2400,
            click_duration_ms: 100,
        }
    }
}

impl ScreenConfig {
    pub fn size(&self) -> ScreenSize {
        ScreenSize::new(self.width, self.height)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CaptureConfig {
    /// Directory of images replayed as the screen
    pub replay_dir: Option<PathBuf>,
    pub frame_interval_ms: u64,
    pub looping: bool,
    /// How long a start waits for the first buffer before ticking anyway
    pub startup_timeout_ms: u64,
    /// Optional directory for debug PNG copies of captured frames
    pub debug_dir: Option<PathBuf>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            replay_dir: None,
            frame_interval_ms: 100,
            looping: true,
            startup_timeout_ms: 2000,
            debug_dir: None,
        }
    }
}

impl AgentConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("screenpilot").join("config.yaml"))
    }

    /// Apply `SCREENPILOT_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_PERIOD_MS) {
            self.period_ms = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidOverride {
                    key: ENV_PERIOD_MS.to_string(),
                    value: value.clone(),
                })?;
        }
        if let Some(value) = lookup(ENV_MODEL_DIR) {
            self.model.dir = PathBuf::from(value);
        }
        if let Some(value) = lookup(ENV_MODEL_SHA256) {
            let value = value.trim().to_string();
            self.model.sha256 = (!value.is_empty()).then_some(value);
        }
        if let Some(value) = lookup(ENV_DEBUG_DIR) {
            self.capture.debug_dir = (!value.trim().is_empty()).then(|| PathBuf::from(value));
        }
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period_ms == 0 {
            return Err(ConfigError::Invalid("period_ms must be greater than zero".into()));
        }
        if self.tensor.side == 0 {
            return Err(ConfigError::Invalid("tensor.side must be greater than zero".into()));
        }
        if self.tensor.std == 0.0 || !self.tensor.std.is_finite() {
            return Err(ConfigError::Invalid("tensor.std must be a non-zero number".into()));
        }
        if self.screen.width == 0 || self.screen.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "screen size {}x{} is empty",
                self.screen.width, self.screen.height
            )));
        }
        if self.capture.frame_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "capture.frame_interval_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Load the config file, falling back to defaults when it does not exist,
/// then apply environment overrides and validate.
pub async fn load_config(config_path: Option<&Path>) -> Result<AgentConfig, ConfigError> {
    let config_path = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => AgentConfig::default_path(),
    };

    let mut config = match config_path {
        Some(path) if path.exists() => {
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: path.clone(),
                    source,
                })?;
            let config: AgentConfig = serde_yaml::from_str(&content)
                .map_err(|source| ConfigError::Parse {
                    path: path.clone(),
                    source,
                })?;
            info!("Loaded configuration from: {}", path.display());
            config
        }
        Some(path) => {
            warn!("Config file not found, using defaults: {}", path.display());
            AgentConfig::default()
        }
        None => {
            warn!("No config directory available, using defaults");
            AgentConfig::default()
        }
    };

    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_reference_loop() {
        let config = AgentConfig::default();
        assert_eq!(config.period(), Duration::from_millis(200));
        assert_eq!(config.tensor.side, 224);
        assert_eq!(config.tensor.std, 255.0);
        assert_eq!(config.screen.click_duration_ms, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = "period_ms: 50\nmodel:\n  file_name: tiny.spdn\nscreen:\n  width: 720\n";
        let config: AgentConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.period_ms, 50);
        assert_eq!(config.model.file_name, "tiny.spdn");
        assert_eq!(config.screen.width, 720);
        assert_eq!(config.screen.height, 2400);
        assert_eq!(config.decoder, DecoderConfig::default());
    }

    #[test]
    fn overrides_apply_from_lookup() {
        let vars: HashMap<&str, &str> = [
            (ENV_PERIOD_MS, "75"),
            (ENV_MODEL_DIR, "/opt/models"),
            (ENV_MODEL_SHA256, "  "),
            (ENV_DEBUG_DIR, "/tmp/frames"),
        ]
        .into_iter()
        .collect();
        let mut config = AgentConfig::default();
        config.model.sha256 = Some("abc".into());
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.period_ms, 75);
        assert_eq!(config.model.dir, PathBuf::from("/opt/models"));
        assert_eq!(config.model.sha256, None);
        assert_eq!(config.capture.debug_dir, Some(PathBuf::from("/tmp/frames")));
    }

    #[test]
    fn bad_period_override_is_rejected() {
        let mut config = AgentConfig::default();
        let err = config
            .apply_overrides(|key| (key == ENV_PERIOD_MS).then(|| "fast".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOverride { .. }));
    }

    #[test]
    fn validate_rejects_degenerate_values() {
        let mut config = AgentConfig::default();
        config.period_ms = 0;
        assert!(config.validate().is_err());

        let mut config = AgentConfig::default();
        config.tensor.std = 0.0;
        assert!(config.validate().is_err());

        let mut config = AgentConfig::default();
        config.screen.height = 0;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    #[serial]
    async fn load_config_reads_file_then_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "period_ms: 120\n").unwrap();

        std::env::set_var(ENV_PERIOD_MS, "90");
        let config = load_config(Some(&path)).await;
        std::env::remove_var(ENV_PERIOD_MS);

        assert_eq!(config.unwrap().period_ms, 90);
    }

    #[tokio::test]
    #[serial]
    async fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("absent.yaml")))
            .await
            .unwrap();
        assert_eq!(config.model.file_name, "agent.spdn");
    }

    #[tokio::test]
    #[serial]
    async fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "period_ms: [not a number\n").unwrap();
        assert!(matches!(
            load_config(Some(&path)).await,
            Err(ConfigError::Parse { .. })
        ));
    }
}
