//! Producer and collector settings.
//!
//! Both structs deserialize from JSON with every field optional, so a config
//! file only needs the keys it overrides. CLI flags are applied on top by
//! the binaries, then [`ProducerConfig::validate`] /
//! [`CollectorConfig::validate`] run once before anything is opened.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::motion::infrastructure::ransac_affine::MotionModel;
use crate::shared::constants::{
    DEFAULT_COLLECTOR_ADDR, DEFAULT_DETECT_INTERVAL, DEFAULT_DOWNSCALE_FACTOR,
    DEFAULT_FPS_SMOOTHING, DEFAULT_JPEG_QUALITY, DEFAULT_MAX_DATAGRAM_BYTES, DEFAULT_OUTPUT_DIR,
    FALLBACK_FPS, MAX_UDP_PAYLOAD_BYTES, RECEIVE_BUFFER_BYTES, SESSION_LOG_FILE_NAME,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid setting: {0}")]
    Invalid(String),
}

fn load_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ConfigError> {
    let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    pub collector_addr: String,
    pub downscale_factor: u32,
    pub detect_interval: usize,
    pub max_corners: usize,
    pub corner_quality: f64,
    pub corner_min_distance: f64,
    pub corner_block_size: usize,
    pub lk_window: usize,
    pub lk_levels: usize,
    pub lk_max_iterations: usize,
    pub lk_epsilon: f64,
    pub motion_model: MotionModel,
    pub ransac_threshold: f64,
    pub ransac_max_iterations: usize,
    pub ransac_confidence: f64,
    pub jpeg_quality: u8,
    pub max_datagram_bytes: usize,
    pub detector_confidence: f64,
    pub model_path: Option<PathBuf>,
    pub fallback_fps: f64,
    pub pace: bool,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            collector_addr: DEFAULT_COLLECTOR_ADDR.to_string(),
            downscale_factor: DEFAULT_DOWNSCALE_FACTOR,
            detect_interval: DEFAULT_DETECT_INTERVAL,
            max_corners: 100,
            corner_quality: 0.3,
            corner_min_distance: 7.0,
            corner_block_size: 7,
            lk_window: 21,
            lk_levels: 3,
            lk_max_iterations: 30,
            lk_epsilon: 0.01,
            motion_model: MotionModel::Affine,
            ransac_threshold: 3.0,
            ransac_max_iterations: 2000,
            ransac_confidence: 0.99,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            max_datagram_bytes: DEFAULT_MAX_DATAGRAM_BYTES,
            detector_confidence: 0.2,
            model_path: None,
            fallback_fps: FALLBACK_FPS,
            pace: true,
        }
    }
}

impl ProducerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        load_json(path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.downscale_factor < 1 {
            return Err(ConfigError::Invalid(
                "downscale_factor must be >= 1".to_string(),
            ));
        }
        if self.detect_interval < 1 {
            return Err(ConfigError::Invalid(
                "detect_interval must be >= 1".to_string(),
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "jpeg_quality must be between 1 and 100, got {}",
                self.jpeg_quality
            )));
        }
        if self.max_datagram_bytes == 0 || self.max_datagram_bytes > MAX_UDP_PAYLOAD_BYTES {
            return Err(ConfigError::Invalid(format!(
                "max_datagram_bytes must be between 1 and {MAX_UDP_PAYLOAD_BYTES}, got {}",
                self.max_datagram_bytes
            )));
        }
        if !(0.0..=1.0).contains(&self.detector_confidence) {
            return Err(ConfigError::Invalid(format!(
                "detector_confidence must be between 0.0 and 1.0, got {}",
                self.detector_confidence
            )));
        }
        if !(0.0..=1.0).contains(&self.corner_quality) || self.corner_quality == 0.0 {
            return Err(ConfigError::Invalid(format!(
                "corner_quality must be in (0.0, 1.0], got {}",
                self.corner_quality
            )));
        }
        if self.corner_block_size < 3 || self.corner_block_size % 2 == 0 {
            return Err(ConfigError::Invalid(format!(
                "corner_block_size must be an odd integer >= 3, got {}",
                self.corner_block_size
            )));
        }
        if self.lk_window < 3 || self.lk_window % 2 == 0 {
            return Err(ConfigError::Invalid(format!(
                "lk_window must be an odd integer >= 3, got {}",
                self.lk_window
            )));
        }
        if self.lk_levels < 1 {
            return Err(ConfigError::Invalid("lk_levels must be >= 1".to_string()));
        }
        if self.ransac_confidence.is_nan()
            || self.ransac_confidence <= 0.0
            || self.ransac_confidence >= 1.0
        {
            return Err(ConfigError::Invalid(format!(
                "ransac_confidence must be in (0.0, 1.0), got {}",
                self.ransac_confidence
            )));
        }
        if self.fallback_fps.is_nan() || self.fallback_fps <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "fallback_fps must be positive, got {}",
                self.fallback_fps
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub bind_addr: String,
    pub output_dir: PathBuf,
    pub log_file_name: String,
    pub fps_smoothing: f64,
    pub report_every: usize,
    pub max_datagram_bytes: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_COLLECTOR_ADDR.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            log_file_name: SESSION_LOG_FILE_NAME.to_string(),
            fps_smoothing: DEFAULT_FPS_SMOOTHING,
            report_every: 100,
            max_datagram_bytes: RECEIVE_BUFFER_BYTES,
        }
    }
}

impl CollectorConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        load_json(path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fps_smoothing.is_nan() || self.fps_smoothing <= 0.0 || self.fps_smoothing >= 1.0 {
            return Err(ConfigError::Invalid(format!(
                "fps_smoothing must be in (0.0, 1.0), got {}",
                self.fps_smoothing
            )));
        }
        if self.log_file_name.is_empty() || self.log_file_name.contains(['/', '\\']) {
            return Err(ConfigError::Invalid(format!(
                "log_file_name must be a plain file name, got '{}'",
                self.log_file_name
            )));
        }
        if self.max_datagram_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_datagram_bytes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_producer_defaults_are_valid() {
        let cfg = ProducerConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.detect_interval, 10);
        assert_eq!(cfg.downscale_factor, 4);
        assert_eq!(cfg.jpeg_quality, 60);
        assert_eq!(cfg.max_datagram_bytes, 60_000);
        assert_eq!(cfg.max_corners, 100);
    }

    #[test]
    fn test_collector_defaults_are_valid() {
        let cfg = CollectorConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.log_file_name, "session_data.csv");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg: ProducerConfig =
            serde_json::from_str(r#"{"detect_interval": 5, "motion_model": "similarity"}"#)
                .unwrap();
        assert_eq!(cfg.detect_interval, 5);
        assert_eq!(cfg.motion_model, MotionModel::Similarity);
        assert_eq!(cfg.jpeg_quality, 60);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("collector.json");
        fs::write(&path, r#"{"output_dir": "/tmp/logs", "report_every": 7}"#).unwrap();
        let cfg = CollectorConfig::load(&path).unwrap();
        assert_eq!(cfg.output_dir, PathBuf::from("/tmp/logs"));
        assert_eq!(cfg.report_every, 7);
        assert_eq!(cfg.bind_addr, DEFAULT_COLLECTOR_ADDR);
    }

    #[test]
    fn test_load_missing_file_errors() {
        let err = ProducerConfig::load(Path::new("/nonexistent/producer.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_malformed_json_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        let err = ProducerConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_zero_detect_interval_rejected() {
        let cfg = ProducerConfig {
            detect_interval: 0,
            ..ProducerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_oversized_datagram_bound_rejected() {
        let cfg = ProducerConfig {
            max_datagram_bytes: 70_000,
            ..ProducerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_even_lk_window_rejected() {
        let cfg = ProducerConfig {
            lk_window: 20,
            ..ProducerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_smoothing_bounds() {
        let cfg = CollectorConfig {
            fps_smoothing: 1.0,
            ..CollectorConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_log_file_name_with_separator_rejected() {
        let cfg = CollectorConfig {
            log_file_name: "../escape.csv".to_string(),
            ..CollectorConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
