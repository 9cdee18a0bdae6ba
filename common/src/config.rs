use serde::Deserialize;
use std::path::Path;

/// Slowest accepted capture rate: one frame every 1000 seconds.
pub const MIN_REFRESH_HZ: f64 = 1e-3;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub smoother: SmootherConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    /// `stub://<name>` for the synthetic camera, or an `http(s)://` MJPEG stream URL.
    #[serde(default = "default_camera_url")]
    pub url: String,
    #[serde(default = "default_facing_mode")]
    pub facing_mode: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// Synthetic camera only: ticks reported as not ready after the stream opens.
    #[serde(default = "default_warmup_ticks")]
    pub warmup_ticks: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_refresh_hz")]
    pub refresh_hz: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    #[serde(default = "default_detection_rate")]
    pub detection_rate: f64,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    #[serde(default = "default_max_confidence")]
    pub max_confidence: f64,
    /// Fixed RNG seed; `None` seeds from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_signs")]
    pub signs: Vec<SignEntry>,
}

/// One row of the sign catalog: a label and its reference feature vector.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SignEntry {
    pub label: String,
    pub features: Vec<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmootherConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_history_len")]
    pub history_len: usize,
    #[serde(default = "default_display_epsilon")]
    pub display_epsilon: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            url: default_camera_url(),
            facing_mode: default_facing_mode(),
            width: default_width(),
            height: default_height(),
            warmup_ticks: default_warmup_ticks(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            refresh_hz: default_refresh_hz(),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            detection_rate: default_detection_rate(),
            min_confidence: default_min_confidence(),
            max_confidence: default_max_confidence(),
            seed: None,
            signs: default_signs(),
        }
    }
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            delay_ms: default_delay_ms(),
            history_len: default_history_len(),
            display_epsilon: default_display_epsilon(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.detector;
        for (name, value) in [
            ("detector.detection_rate", d.detection_rate),
            ("detector.min_confidence", d.min_confidence),
            ("detector.max_confidence", d.max_confidence),
            ("smoother.threshold", self.smoother.threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if d.min_confidence > d.max_confidence {
            return Err(ConfigError::Invalid(format!(
                "detector.min_confidence ({}) exceeds detector.max_confidence ({})",
                d.min_confidence, d.max_confidence
            )));
        }
        let hz = self.capture.refresh_hz;
        if !hz.is_finite() || hz < MIN_REFRESH_HZ {
            return Err(ConfigError::Invalid(format!(
                "capture.refresh_hz must be a finite rate of at least {MIN_REFRESH_HZ}, got {hz}"
            )));
        }
        if self.smoother.history_len == 0 {
            return Err(ConfigError::Invalid(
                "smoother.history_len must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// Default value functions
fn default_camera_url() -> String {
    "stub://webcam".into()
}
fn default_facing_mode() -> String {
    "user".into()
}
fn default_width() -> u32 {
    640
}
fn default_height() -> u32 {
    480
}
fn default_warmup_ticks() -> u32 {
    3
}
fn default_refresh_hz() -> f64 {
    60.0
}
fn default_detection_rate() -> f64 {
    0.4
}
fn default_min_confidence() -> f64 {
    0.7
}
fn default_max_confidence() -> f64 {
    0.95
}
fn default_signs() -> Vec<SignEntry> {
    [
        ("hello", [0, 1, 2, 3, 4]),
        ("thank you", [1, 2, 3, 4, 0]),
        ("yes", [2, 3, 4, 0, 1]),
        ("no", [3, 4, 0, 1, 2]),
        ("please", [4, 0, 1, 2, 3]),
    ]
    .into_iter()
    .map(|(label, features)| SignEntry {
        label: label.into(),
        features: features.to_vec(),
    })
    .collect()
}
fn default_threshold() -> f64 {
    0.7
}
fn default_delay_ms() -> u64 {
    800
}
fn default_history_len() -> usize {
    5
}
fn default_display_epsilon() -> f64 {
    0.1
}
fn default_log_level() -> String {
    "info".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.camera.url, "stub://webcam");
        assert_eq!(config.camera.width, 640);
        assert_eq!(config.camera.height, 480);
        assert_eq!(config.smoother.delay_ms, 800);
        assert_eq!(config.smoother.history_len, 5);
        assert_eq!(config.detector.signs.len(), 5);
        assert_eq!(config.detector.signs[1].label, "thank you");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
            [camera]
            url = "http://127.0.0.1:8080/stream"
            facing_mode = "environment"

            [detector]
            seed = 7
            signs = [{ label = "wave", features = [1, 1] }]
            "#,
        )
        .unwrap();
        assert_eq!(config.camera.facing_mode, "environment");
        assert_eq!(config.camera.width, 640);
        assert_eq!(config.detector.seed, Some(7));
        assert_eq!(config.detector.signs.len(), 1);
        assert_eq!(config.detector.detection_rate, 0.4);
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let err = Config::from_toml("[smoother]\nthreshold = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_inverted_confidence_range() {
        let err = Config::from_toml("[detector]\nmin_confidence = 0.9\nmax_confidence = 0.8\n")
            .unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn rejects_zero_refresh_rate() {
        assert!(Config::from_toml("[capture]\nrefresh_hz = 0.0\n").is_err());
    }

    #[test]
    fn rejects_vanishing_refresh_rate() {
        let err = Config::from_toml("[capture]\nrefresh_hz = 1e-30\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(Config::from_toml("[capture]\nrefresh_hz = inf\n").is_err());
        assert!(Config::from_toml("[capture]\nrefresh_hz = 0.001\n").is_ok());
    }

    #[test]
    fn parse_error_is_reported() {
        let err = Config::from_toml("[camera\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = Config::load(Path::new("/nonexistent/sign-sense.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile(..)));
    }
}
