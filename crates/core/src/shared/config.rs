use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::domain::target_zone::TargetZone;
use crate::detection::domain::detection::DetectorMode;

#[derive(Error, Debug)]
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
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Everything the kiosk reads at startup. Every section falls back to the
/// deployment defaults when absent from the file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    pub camera: CameraConfig,
    pub zone: ZoneConfig,
    pub capture: CaptureConfig,
    pub detector: DetectorConfig,
    pub stream: StreamConfig,
    pub overlay: OverlayConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub uri: String,
    pub width: u32,
    pub height: u32,
    pub warmup_ms: u64,
    pub max_reconnect_attempts: u32,
    pub reconnect_delay_ms: u64,
    pub exhausted_retry_interval_ms: u64,
    pub stale_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub rtsp_transport: String,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            uri: String::new(),
            width: 640,
            height: 480,
            warmup_ms: 2000,
            max_reconnect_attempts: 5,
            reconnect_delay_ms: 1000,
            exhausted_retry_interval_ms: 10_000,
            stale_timeout_ms: 5000,
            read_timeout_ms: 5000,
            rtsp_transport: "tcp".to_string(),
        }
    }
}

impl CameraConfig {
    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn exhausted_retry_interval(&self) -> Duration {
        Duration::from_millis(self.exhausted_retry_interval_ms)
    }

    pub fn stale_timeout(&self) -> Duration {
        Duration::from_millis(self.stale_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            width: 180,
            height: 260,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub required_frames: u32,
    pub min_face_ratio: f64,
    pub max_face_ratio: f64,
    pub center_tolerance: i32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            required_frames: 30,
            min_face_ratio: 0.6,
            max_face_ratio: 0.9,
            center_tolerance: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub confidence: f64,
    pub mode: DetectorMode,
    pub model_path: Option<PathBuf>,
    pub model_url: Option<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            confidence: 0.7,
            mode: DetectorMode::Near,
            model_path: None,
            model_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub max_fps: u32,
    pub jpeg_quality: u8,
    /// Upper bound on an encoded video frame; 0 disables the budget.
    pub max_frame_bytes: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_fps: 30,
            jpeg_quality: 80,
            max_frame_bytes: 0,
        }
    }
}

impl StreamConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.max_fps.max(1) as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub zone_fill_opacity: f32,
    pub ellipse_opacity: f32,
    pub ellipse_offset: i32,
    pub ellipse_thickness: i32,
    pub icon_path: Option<PathBuf>,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            zone_fill_opacity: 0.0,
            ellipse_opacity: 1.0,
            ellipse_offset: 10,
            ellipse_thickness: 6,
            icon_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub image_dir: PathBuf,
    pub image_prefix: String,
    pub base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            image_dir: PathBuf::from("captured_faces"),
            image_prefix: "face_".to_string(),
            base_url: "http://localhost:5000/images".to_string(),
        }
    }
}

impl KioskConfig {
    /// Default location: `<config dir>/FaceCapture/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("FaceCapture").join("config.json"))
    }

    /// Loads the config from `path`, or from [`default_path`](Self::default_path)
    /// when `path` is `None`.
    ///
    /// A missing default file yields the defaults; a missing explicit file
    /// and a malformed file are errors.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) if p.exists() => p,
                Some(p) => {
                    log::info!("No config at {}, using defaults", p.display());
                    return Ok(Self::default());
                }
                None => return Ok(Self::default()),
            },
        };

        let json = fs::read_to_string(&path).map_err(|e| ConfigError::Read {
            path: path.clone(),
            source: e,
        })?;
        let config: KioskConfig =
            serde_json::from_str(&json).map_err(|e| ConfigError::Parse { path, source: e })?;
        Ok(config)
    }

    /// The zone rectangle, centered in the output frame.
    pub fn target_zone(&self) -> TargetZone {
        TargetZone::centered(
            self.camera.width,
            self.camera.height,
            self.zone.width,
            self.zone.height,
        )
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.camera.width == 0 || self.camera.height == 0 {
            return invalid(format!(
                "frame size must be non-zero, got {}x{}",
                self.camera.width, self.camera.height
            ));
        }
        if self.zone.width == 0
            || self.zone.height == 0
            || self.zone.width > self.camera.width
            || self.zone.height > self.camera.height
        {
            return invalid(format!(
                "zone {}x{} must fit inside frame {}x{}",
                self.zone.width, self.zone.height, self.camera.width, self.camera.height
            ));
        }
        if self.capture.required_frames == 0 {
            return invalid("required_frames must be at least 1".to_string());
        }
        if !(self.capture.min_face_ratio > 0.0
            && self.capture.min_face_ratio <= self.capture.max_face_ratio)
        {
            return invalid(format!(
                "face ratio bounds must satisfy 0 < min <= max, got {}..{}",
                self.capture.min_face_ratio, self.capture.max_face_ratio
            ));
        }
        if self.capture.center_tolerance < 0 {
            return invalid(format!(
                "center_tolerance must be non-negative, got {}",
                self.capture.center_tolerance
            ));
        }
        if !(0.0..=1.0).contains(&self.detector.confidence) {
            return invalid(format!(
                "confidence must be between 0.0 and 1.0, got {}",
                self.detector.confidence
            ));
        }
        if !(0.0..=1.0).contains(&self.overlay.zone_fill_opacity)
            || !(0.0..=1.0).contains(&self.overlay.ellipse_opacity)
        {
            return invalid("overlay opacities must be between 0.0 and 1.0".to_string());
        }
        if !(1..=100).contains(&self.stream.jpeg_quality) {
            return invalid(format!(
                "jpeg_quality must be between 1 and 100, got {}",
                self.stream.jpeg_quality
            ));
        }
        if self.stream.max_fps == 0 {
            return invalid("max_fps must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults_match_deployment() {
        let config = KioskConfig::default();
        assert_eq!((config.camera.width, config.camera.height), (640, 480));
        assert_eq!(config.capture.required_frames, 30);
        assert_eq!(config.capture.center_tolerance, 50);
        assert_eq!(config.detector.mode, DetectorMode::Near);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_zone_is_centered() {
        let zone = KioskConfig::default().target_zone();
        assert_eq!((zone.x, zone.y, zone.width, zone.height), (230, 110, 180, 260));
    }

    #[test]
    fn test_load_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            KioskConfig::load(Some(&dir.path().join("nope.json"))),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"camera": {"uri": "rtsp://cam/stream"}, "detector": {"mode": "far"}}"#,
        )
        .unwrap();

        let config = KioskConfig::load(Some(&path)).unwrap();
        assert_eq!(config.camera.uri, "rtsp://cam/stream");
        assert_eq!(config.camera.width, 640);
        assert_eq!(config.detector.mode, DetectorMode::Far);
        assert_eq!(config.capture, CaptureConfig::default());
    }

    #[test]
    fn test_load_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            KioskConfig::load(Some(&path)),
            Err(ConfigError::Parse { .. })
        ));
    }

    fn with(f: impl FnOnce(&mut KioskConfig)) -> KioskConfig {
        let mut config = KioskConfig::default();
        f(&mut config);
        config
    }

    #[rstest]
    #[case::zone_too_wide(with(|c| c.zone.width = 700))]
    #[case::zero_required_frames(with(|c| c.capture.required_frames = 0))]
    #[case::inverted_ratios(with(|c| { c.capture.min_face_ratio = 0.9; c.capture.max_face_ratio = 0.6; }))]
    #[case::confidence_above_one(with(|c| c.detector.confidence = 1.5))]
    #[case::opacity_out_of_range(with(|c| c.overlay.zone_fill_opacity = -0.1))]
    #[case::quality_zero(with(|c| c.stream.jpeg_quality = 0))]
    #[case::fps_zero(with(|c| c.stream.max_fps = 0))]
    fn test_validate_rejects(#[case] config: KioskConfig) {
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_frame_interval() {
        let stream = StreamConfig {
            max_fps: 20,
            ..StreamConfig::default()
        };
        assert_eq!(stream.frame_interval(), Duration::from_millis(50));
    }
}
