//! # Configuration System
//!
//! YAML-based configuration for magpipe runs, covering:
//!
//! - Pipeline settings (source/output rates, anti-alias cutoff, filter
//!   order, resample path)
//! - Calibration search settings (step sizes, convergence, bias handling)
//! - Output locations and artifact switches
//! - Logging configuration
//! - The station list a run processes
//!
//! ## Configuration Search Path
//!
//! Configuration is loaded from the first file found:
//! 1. Path specified via `MAGPIPE_CONFIG` environment variable
//! 2. `./magpipe.yaml` (current directory)
//! 3. `~/.config/magpipe/config.yaml` (user config)
//! 4. `/etc/magpipe/config.yaml` (system config)
//!
//! ## Example Configuration
//!
//! ```yaml
//! pipeline:
//!   source_rate_hz: 100.0
//!   output_rate_hz: 1.0
//!   cutoff_hz: 0.5
//!   filter_order: 5
//!   resample_path: spectral
//!
//! calibration:
//!   initial_step: 0.1
//!   epsilon: 1.0e-7
//!
//! stations: ["LRE", "LRS", "LRO"]
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::calibration_search::{AngleSearchConfig, ScaleSearchConfig};
use crate::observe::LogConfig;

/// Error type for configuration operations.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Configuration file not found
    NotFound(String),
    /// Failed to read configuration file
    ReadError(String),
    /// Failed to parse configuration
    ParseError(String),
    /// Invalid configuration value
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound(msg) => write!(f, "config not found: {}", msg),
            ConfigError::ReadError(msg) => write!(f, "failed to read config: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "failed to parse config: {}", msg),
            ConfigError::ValidationError(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// How the conditioned window is taken down to the output rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResamplePath {
    /// Frequency-domain resampling with power-of-two padding
    Spectral,
    /// Zero-phase low-pass followed by stride sampling
    Decimate,
}

impl Default for ResamplePath {
    fn default() -> Self {
        ResamplePath::Spectral
    }
}

/// Conditioning pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Raw instrument sample rate in Hz
    pub source_rate_hz: f64,
    /// Output product sample rate in Hz
    pub output_rate_hz: f64,
    /// Anti-alias cutoff frequency in Hz
    pub cutoff_hz: f64,
    /// Butterworth order for the anti-alias filter
    pub filter_order: usize,
    /// Rate conversion strategy
    pub resample_path: ResamplePath,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            source_rate_hz: 100.0,
            output_rate_hz: 1.0,
            cutoff_hz: 0.5,
            filter_order: 5,
            resample_path: ResamplePath::Spectral,
        }
    }
}

/// Orientation and scale calibration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationSettings {
    /// First coordinate-descent step (radians for angles, unitless for scale)
    pub initial_step: f64,
    /// Step size below which the searches stop
    pub epsilon: f64,
    /// Remove per-channel means before the rotation search
    pub remove_bias: bool,
    /// Constant baseline subtracted from both series before the scale search
    pub scale_offset: f64,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            initial_step: 0.1,
            epsilon: 1e-7,
            remove_bias: false,
            scale_offset: 0.0,
        }
    }
}

impl CalibrationSettings {
    /// View as the rotation-search tunables.
    pub fn angle_search(&self) -> AngleSearchConfig {
        AngleSearchConfig {
            initial_step: self.initial_step,
            epsilon: self.epsilon,
            remove_bias: self.remove_bias,
        }
    }

    /// View as the scale-search tunables.
    pub fn scale_search(&self) -> ScaleSearchConfig {
        ScaleSearchConfig {
            initial_step: self.initial_step,
            epsilon: self.epsilon,
            offset: self.scale_offset,
        }
    }
}

/// Where run products land.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Directory day records are written into
    pub directory: PathBuf,
    /// Also write the per-sample rotation trace artifact
    pub rotation_trace: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            rotation_trace: false,
        }
    }
}

/// Top-level magpipe configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MagpipeConfig {
    /// Conditioning pipeline settings
    pub pipeline: PipelineSettings,
    /// Calibration search settings
    pub calibration: CalibrationSettings,
    /// Output settings
    pub output: OutputSettings,
    /// Logging configuration
    pub logging: LogConfig,
    /// Stations to process, in run order
    pub stations: Vec<String>,
}

impl Default for MagpipeConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineSettings::default(),
            calibration: CalibrationSettings::default(),
            output: OutputSettings::default(),
            logging: LogConfig::default(),
            stations: vec!["LRE".to_string(), "LRS".to_string(), "LRO".to_string()],
        }
    }
}

impl MagpipeConfig {
    /// Load configuration from the default search path.
    ///
    /// Search order:
    /// 1. `MAGPIPE_CONFIG` environment variable
    /// 2. `./magpipe.yaml`
    /// 3. `~/.config/magpipe/config.yaml`
    /// 4. `/etc/magpipe/config.yaml`
    ///
    /// Returns default config if no file is found.
    pub fn load() -> Result<Self, ConfigError> {
        // Check environment variable first
        if let Ok(path) = std::env::var("MAGPIPE_CONFIG") {
            if Path::new(&path).exists() {
                return Self::load_from(Path::new(&path));
            }
        }

        // Check standard paths
        let paths = Self::config_search_paths();
        for path in &paths {
            if path.exists() {
                return Self::load_from(path);
            }
        }

        // No config found, return defaults
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        Self::parse(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            serde_yaml::to_string(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))
    }

    /// Get configuration search paths.
    pub fn config_search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./magpipe.yaml")];

        // User config directory
        if let Some(config_dir) = directories::ProjectDirs::from("", "", "magpipe") {
            paths.push(config_dir.config_dir().join("config.yaml"));
        }

        // System config
        paths.push(PathBuf::from("/etc/magpipe/config.yaml"));

        paths
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.pipeline.source_rate_hz.is_finite() || self.pipeline.source_rate_hz <= 0.0 {
            return Err(ConfigError::ValidationError(
                "source_rate_hz must be positive".to_string(),
            ));
        }
        if !self.pipeline.output_rate_hz.is_finite() || self.pipeline.output_rate_hz <= 0.0 {
            return Err(ConfigError::ValidationError(
                "output_rate_hz must be positive".to_string(),
            ));
        }
        if self.pipeline.output_rate_hz > self.pipeline.source_rate_hz {
            return Err(ConfigError::ValidationError(
                "output_rate_hz cannot exceed source_rate_hz".to_string(),
            ));
        }
        if self.pipeline.cutoff_hz <= 0.0
            || self.pipeline.cutoff_hz >= self.pipeline.source_rate_hz / 2.0
        {
            return Err(ConfigError::ValidationError(
                "cutoff_hz must sit between 0 and the source Nyquist frequency".to_string(),
            ));
        }
        if self.pipeline.filter_order == 0 || self.pipeline.filter_order > 20 {
            return Err(ConfigError::ValidationError(
                "filter_order must be 1-20".to_string(),
            ));
        }

        if self.calibration.initial_step <= 0.0 {
            return Err(ConfigError::ValidationError(
                "calibration initial_step must be positive".to_string(),
            ));
        }
        if self.calibration.epsilon <= 0.0 {
            return Err(ConfigError::ValidationError(
                "calibration epsilon must be positive".to_string(),
            ));
        }

        if self.stations.is_empty() {
            return Err(ConfigError::ValidationError(
                "stations must name at least one station".to_string(),
            ));
        }

        Ok(())
    }

    /// Generate example configuration YAML.
    pub fn example_yaml() -> String {
        serde_yaml::to_string(&Self::default()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MagpipeConfig::default();
        assert_eq!(config.pipeline.source_rate_hz, 100.0);
        assert_eq!(config.pipeline.output_rate_hz, 1.0);
        assert_eq!(config.pipeline.filter_order, 5);
        assert_eq!(config.pipeline.resample_path, ResamplePath::Spectral);
        assert_eq!(config.stations, vec!["LRE", "LRS", "LRO"]);
        assert!(!config.calibration.remove_bias);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
pipeline:
  source_rate_hz: 32.0
  output_rate_hz: 1.0
  cutoff_hz: 0.4
  filter_order: 4
  resample_path: decimate

calibration:
  initial_step: 0.05
  remove_bias: true

stations: ["LRT"]
"#;
        let config = MagpipeConfig::parse(yaml).unwrap();
        assert_eq!(config.pipeline.source_rate_hz, 32.0);
        assert_eq!(config.pipeline.cutoff_hz, 0.4);
        assert_eq!(config.pipeline.resample_path, ResamplePath::Decimate);
        assert_eq!(config.calibration.initial_step, 0.05);
        assert!(config.calibration.remove_bias);
        assert_eq!(config.stations, vec!["LRT"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_yaml_fills_defaults() {
        let yaml = r#"
pipeline:
  cutoff_hz: 0.3
"#;
        let config = MagpipeConfig::parse(yaml).unwrap();
        assert_eq!(config.pipeline.cutoff_hz, 0.3);
        assert_eq!(config.pipeline.source_rate_hz, 100.0);
        assert_eq!(config.pipeline.filter_order, 5);
        assert_eq!(config.stations.len(), 3);
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let result = MagpipeConfig::parse("pipeline: [not, a, map]");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validation_rejects_bad_rates() {
        let mut config = MagpipeConfig::default();
        config.pipeline.source_rate_hz = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        let mut config = MagpipeConfig::default();
        config.pipeline.output_rate_hz = 200.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_cutoff() {
        let mut config = MagpipeConfig::default();
        config.pipeline.cutoff_hz = 60.0; // above Nyquist for 100 Hz
        assert!(config.validate().is_err());

        config.pipeline.cutoff_hz = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_search_settings() {
        let mut config = MagpipeConfig::default();
        config.calibration.initial_step = -0.1;
        assert!(config.validate().is_err());

        let mut config = MagpipeConfig::default();
        config.stations.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_calibration_settings_convert() {
        let settings = CalibrationSettings {
            initial_step: 0.2,
            scale_offset: 50_000.0,
            ..Default::default()
        };

        let angle = settings.angle_search();
        assert_eq!(angle.initial_step, 0.2);
        assert_eq!(angle.epsilon, 1e-7);

        let scale = settings.scale_search();
        assert_eq!(scale.offset, 50_000.0);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let mut config = MagpipeConfig::default();
        config.pipeline.cutoff_hz = 0.25;
        config.stations = vec!["LRE".to_string()];

        let path = std::env::temp_dir().join("magpipe_config_round_trip.yaml");
        config.save(&path).unwrap();
        let loaded = MagpipeConfig::load_from(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.pipeline.cutoff_hz, 0.25);
        assert_eq!(loaded.stations, vec!["LRE"]);
    }

    #[test]
    fn test_search_paths_shape() {
        let paths = MagpipeConfig::config_search_paths();
        assert_eq!(paths[0], PathBuf::from("./magpipe.yaml"));
        assert_eq!(
            paths.last().unwrap(),
            &PathBuf::from("/etc/magpipe/config.yaml")
        );
    }

    #[test]
    fn test_example_yaml_parses() {
        let yaml = MagpipeConfig::example_yaml();
        let config = MagpipeConfig::parse(&yaml).unwrap();
        assert!(config.validate().is_ok());
    }
}
