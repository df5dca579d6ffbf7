//! Configuration management

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Execution provider preference for the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accelerator {
    #[default]
    Cpu,
    Cuda,
}

impl fmt::Display for Accelerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Accelerator::Cpu => write!(f, "CPU"),
            Accelerator::Cuda => write!(f, "CUDA"),
        }
    }
}

/// Model and class-list configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the exported ONNX model
    pub model_path: PathBuf,
    /// Newline-delimited class labels, index-aligned with the class scores
    pub class_names_path: PathBuf,
    /// Output rows of the exported model
    pub rows: usize,
    /// Values per output row (5 + number of classes)
    pub dimensions: usize,
    pub input_width: u32,
    pub input_height: u32,
    pub accelerator: Accelerator,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("config_files/yolov5n.onnx"),
            class_names_path: PathBuf::from("config_files/classes.txt"),
            rows: 25200,
            dimensions: 85,
            input_width: 640,
            input_height: 640,
            accelerator: Accelerator::Cpu,
        }
    }
}

/// Decode and suppression thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Minimum objectness for a row to be considered
    pub confidence_threshold: f32,
    /// Best class score must exceed this
    pub score_threshold: f32,
    /// IoU above which the weaker of two boxes is suppressed
    pub nms_threshold: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
            score_threshold: 0.2,
            nms_threshold: 0.4,
        }
    }
}

/// How alert playback is scheduled relative to the frame loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertMode {
    /// Play inline; the frame loop waits for the clip to finish
    Blocking,
    /// Hand requests to a dedicated playback worker
    #[default]
    Queued,
}

/// Proximity alert configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Raw S16LE PCM or WAV clip played on alert
    pub asset_path: PathBuf,
    /// Box area is divided by this before comparing against `area_threshold`.
    /// Calibrated for one camera placement and lens.
    pub area_divisor: u32,
    /// Alert when the normalized area is strictly greater than this
    pub area_threshold: u32,
    pub sample_rate: u32,
    pub channels: u16,
    /// Frames per period requested from the output device
    pub period_frames: u32,
    pub mode: AlertMode,
    /// Pending alerts the worker queue holds before dropping new ones
    pub queue_capacity: usize,
    /// Stop playback after this long, if set
    pub play_timeout_ms: Option<u64>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            asset_path: PathBuf::from("sound/sound.wav"),
            area_divisor: 3072,
            area_threshold: 25,
            sample_rate: 44100,
            channels: 2,
            period_frames: 1024,
            mode: AlertMode::Queued,
            queue_capacity: 4,
            play_timeout_ms: None,
        }
    }
}

/// Frame source and display configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Camera index (e.g. "0"), video file, or image directory
    pub source: String,
    /// Whether to show the annotated frames in a window
    pub display_enabled: bool,
    pub window_name: String,
    /// Log FPS every this many frames
    pub fps_report_interval: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source: "0".to_string(),
            display_enabled: true,
            window_name: "FRAME".to_string(),
            fps_report_interval: 30,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub model: ModelConfig,
    pub detection: DetectionConfig,
    pub alert: AlertConfig,
    pub capture: CaptureConfig,
}

impl AppConfig {
    /// Load configuration from TOML file
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileReadError(path.to_path_buf(), e))?;

        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_toml_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(format!("TOML serialize error: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::FileWriteError(path.to_path_buf(), e))?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let thresholds = [
            ("confidence_threshold", self.detection.confidence_threshold),
            ("score_threshold", self.detection.score_threshold),
            ("nms_threshold", self.detection.nms_threshold),
        ];
        for (name, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must be between 0.0 and 1.0, got {}",
                    name, value
                )));
            }
        }

        if self.model.rows == 0 {
            return Err(ConfigError::InvalidValue(
                "model rows must be greater than 0".to_string(),
            ));
        }

        if self.model.dimensions <= 5 {
            return Err(ConfigError::InvalidValue(format!(
                "model dimensions must be greater than 5, got {}",
                self.model.dimensions
            )));
        }

        if self.model.input_width == 0 || self.model.input_height == 0 {
            return Err(ConfigError::InvalidValue(
                "model input dimensions must be greater than 0".to_string(),
            ));
        }

        if self.alert.area_divisor == 0 {
            return Err(ConfigError::InvalidValue(
                "area_divisor must be greater than 0".to_string(),
            ));
        }

        if self.alert.sample_rate == 0 || self.alert.period_frames == 0 {
            return Err(ConfigError::InvalidValue(
                "sample_rate and period_frames must be greater than 0".to_string(),
            ));
        }

        if !(1..=2).contains(&self.alert.channels) {
            return Err(ConfigError::InvalidValue(format!(
                "channels must be 1 or 2, got {}",
                self.alert.channels
            )));
        }

        if self.alert.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "queue_capacity must be greater than 0".to_string(),
            ));
        }

        if self.capture.fps_report_interval == 0 {
            return Err(ConfigError::InvalidValue(
                "fps_report_interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {err}", path = .0.display(), err = .1)]
    FileReadError(PathBuf, std::io::Error),

    #[error("Failed to write config file {path}: {err}", path = .0.display(), err = .1)]
    FileWriteError(PathBuf, std::io::Error),

    #[error("Config parse error: {0}")]
    ParseError(String),

    #[error("Config serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}
