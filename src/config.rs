use crate::analysis::prompts::DEFAULT_CATEGORIES;
use crate::camera::FacingMode;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CamsightConfig {
    pub camera: CameraConfig,
    pub analysis: AnalysisConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Device backend used to open streams
    #[serde(default = "default_camera_backend")]
    pub backend: CameraBackend,

    /// Facing mode requested on the first acquisition
    #[serde(default = "default_camera_facing")]
    pub facing: FacingMode,

    /// Ideal capture resolution (width, height)
    #[serde(default = "default_ideal_resolution")]
    pub ideal_resolution: (u32, u32),

    /// V4L2 device index used for the front camera (/dev/videoN)
    #[serde(default = "default_front_device")]
    pub front_device: u32,

    /// V4L2 device index used for the rear camera
    #[serde(default = "default_rear_device")]
    pub rear_device: u32,

    /// Pause between stop and re-acquire so the device can release its locks
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,

    /// Attempts made while waiting for the capture surface to be mounted
    #[serde(default = "default_surface_retry_attempts")]
    pub surface_retry_attempts: u32,

    /// Delay between surface mount checks
    #[serde(default = "default_surface_retry_delay_ms")]
    pub surface_retry_delay_ms: u64,

    /// JPEG quality for captured stills (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CameraBackend {
    /// Generated test-pattern frames, no hardware required
    Synthetic,
    /// GStreamer v4l2src capture (requires the `camera` feature)
    V4l2,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AnalysisConfig {
    /// Base URL of the generative language API
    #[serde(default = "default_analysis_endpoint")]
    pub endpoint: String,

    /// Multimodal model name
    #[serde(default = "default_analysis_model")]
    pub model: String,

    /// API key; takes precedence over `api_key_env`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable consulted when `api_key` is not set
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Categories offered for selection, in display order
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,

    /// Window within which a result is matched to a pending placeholder
    #[serde(default = "default_correlation_window_ms")]
    pub correlation_window_ms: u64,

    /// TCP connect timeout for the analysis service
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl CamsightConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("camsight.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("camera.backend", "synthetic")?
            .set_default("camera.facing", "front")?
            .set_default(
                "camera.ideal_resolution",
                vec![default_ideal_resolution().0, default_ideal_resolution().1],
            )?
            .set_default("camera.front_device", default_front_device())?
            .set_default("camera.rear_device", default_rear_device())?
            .set_default(
                "camera.restart_delay_ms",
                default_restart_delay_ms() as i64,
            )?
            .set_default(
                "camera.surface_retry_attempts",
                default_surface_retry_attempts(),
            )?
            .set_default(
                "camera.surface_retry_delay_ms",
                default_surface_retry_delay_ms() as i64,
            )?
            .set_default("camera.jpeg_quality", default_jpeg_quality() as i64)?
            .set_default("analysis.endpoint", default_analysis_endpoint())?
            .set_default("analysis.model", default_analysis_model())?
            .set_default("analysis.api_key_env", default_api_key_env())?
            .set_default("analysis.categories", default_categories())?
            .set_default(
                "analysis.correlation_window_ms",
                default_correlation_window_ms() as i64,
            )?
            .set_default(
                "analysis.connect_timeout_secs",
                default_connect_timeout_secs() as i64,
            )?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // CAMSIGHT_ANALYSIS__API_KEY -> analysis.api_key
            .add_source(
                Environment::with_prefix("CAMSIGHT")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: CamsightConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config.redacted());

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.ideal_resolution.0 == 0 || self.camera.ideal_resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera ideal_resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.surface_retry_attempts == 0 {
            return Err(ConfigError::Message(
                "Camera surface_retry_attempts must be greater than 0".to_string(),
            ));
        }

        if !(1..=100).contains(&self.camera.jpeg_quality) {
            return Err(ConfigError::Message(
                "Camera jpeg_quality must be between 1 and 100".to_string(),
            ));
        }

        if self.analysis.endpoint.trim().is_empty() {
            return Err(ConfigError::Message(
                "Analysis endpoint must not be empty".to_string(),
            ));
        }

        if self.analysis.model.trim().is_empty() {
            return Err(ConfigError::Message(
                "Analysis model must not be empty".to_string(),
            ));
        }

        if self.analysis.categories.is_empty() {
            return Err(ConfigError::Message(
                "At least one analysis category must be configured".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> crate::error::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Copy with the API key masked, for logging
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.analysis.api_key.is_some() {
            copy.analysis.api_key = Some("***".to_string());
        }
        copy
    }
}

impl AnalysisConfig {
    /// Resolve the credential from the config value or the named env var
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }
}

impl Default for CamsightConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                backend: default_camera_backend(),
                facing: default_camera_facing(),
                ideal_resolution: default_ideal_resolution(),
                front_device: default_front_device(),
                rear_device: default_rear_device(),
                restart_delay_ms: default_restart_delay_ms(),
                surface_retry_attempts: default_surface_retry_attempts(),
                surface_retry_delay_ms: default_surface_retry_delay_ms(),
                jpeg_quality: default_jpeg_quality(),
            },
            analysis: AnalysisConfig {
                endpoint: default_analysis_endpoint(),
                model: default_analysis_model(),
                api_key: None,
                api_key_env: default_api_key_env(),
                categories: default_categories(),
                correlation_window_ms: default_correlation_window_ms(),
                connect_timeout_secs: default_connect_timeout_secs(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

// Default value functions
fn default_camera_backend() -> CameraBackend {
    CameraBackend::Synthetic
}
fn default_camera_facing() -> FacingMode {
    FacingMode::Front
}
fn default_ideal_resolution() -> (u32, u32) {
    (1280, 720)
}
fn default_front_device() -> u32 {
    0
}
fn default_rear_device() -> u32 {
    1
}
fn default_restart_delay_ms() -> u64 {
    300
}
fn default_surface_retry_attempts() -> u32 {
    10
}
fn default_surface_retry_delay_ms() -> u64 {
    100
}
fn default_jpeg_quality() -> u8 {
    90
}

fn default_analysis_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_analysis_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}
fn default_categories() -> Vec<String> {
    DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect()
}
fn default_correlation_window_ms() -> u64 {
    1000
}
fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_event_bus_capacity() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = CamsightConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.camera.backend, CameraBackend::Synthetic);
        assert_eq!(config.camera.facing, FacingMode::Front);
        assert_eq!(config.analysis.categories.len(), DEFAULT_CATEGORIES.len());
    }

    #[test]
    fn test_config_validation() {
        let mut config = CamsightConfig::default();
        config.camera.ideal_resolution = (0, 0);
        assert!(config.validate().is_err());

        config.camera.ideal_resolution = (640, 480);
        assert!(config.validate().is_ok());

        config.camera.jpeg_quality = 0;
        assert!(config.validate().is_err());
        config.camera.jpeg_quality = 80;

        config.analysis.categories.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[camera]
backend = "synthetic"
facing = "rear"
ideal_resolution = [640, 480]
restart_delay_ms = 50

[analysis]
model = "test-model"
categories = ["Emotion Detection", "Accessories"]
"#
        )
        .unwrap();

        let config = CamsightConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.camera.facing, FacingMode::Rear);
        assert_eq!(config.camera.ideal_resolution, (640, 480));
        assert_eq!(config.camera.restart_delay_ms, 50);
        assert_eq!(config.camera.surface_retry_attempts, 10);
        assert_eq!(config.analysis.model, "test-model");
        assert_eq!(
            config.analysis.categories,
            vec!["Emotion Detection".to_string(), "Accessories".to_string()]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip_of_defaults() {
        let config = CamsightConfig::default();
        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("[camera]"));
        assert!(rendered.contains("gemini-1.5-flash"));

        let parsed: CamsightConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.analysis.categories, config.analysis.categories);
    }

    #[test]
    fn test_resolve_api_key_prefers_config_value() {
        let mut config = CamsightConfig::default();
        config.analysis.api_key_env = "CAMSIGHT_TEST_UNSET_KEY_VAR".to_string();
        assert_eq!(config.analysis.resolve_api_key(), None);

        config.analysis.api_key = Some("  secret  ".to_string());
        assert_eq!(config.analysis.resolve_api_key().as_deref(), Some("secret"));

        config.analysis.api_key = Some("   ".to_string());
        assert_eq!(config.analysis.resolve_api_key(), None);
    }

    #[test]
    fn test_redacted_masks_key() {
        let mut config = CamsightConfig::default();
        config.analysis.api_key = Some("secret".to_string());
        assert_eq!(config.redacted().analysis.api_key.as_deref(), Some("***"));
    }
}
