//! Camera capabilities consumed by the frame source.
//!
//! A `CameraDevice` hands out a `VideoStream` for a set of constraints. The
//! stream reports readiness, copies its current picture into a caller-owned
//! `Frame`, and exposes its tracks so the owner can stop them on release.
//!
//! Backends:
//! - `stub://...`: synthetic camera, used for demos and tests
//! - `http(s)://...`: multipart MJPEG stream served by a camera process

pub mod mjpeg;
pub mod synthetic;

use std::future::Future;
use std::str::FromStr;

use sign_sense_common::config::CameraConfig;
use sign_sense_common::frame::Frame;

pub use mjpeg::MjpegCamera;
pub use synthetic::SyntheticCamera;

#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("failed to read frame: {0}")]
    Read(String),
}

/// Which way the requested camera should face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    User,
    Environment,
}

impl FacingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FacingMode::User => "user",
            FacingMode::Environment => "environment",
        }
    }
}

impl FromStr for FacingMode {
    type Err = CameraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(FacingMode::User),
            "environment" => Ok(FacingMode::Environment),
            other => Err(CameraError::DeviceUnavailable(format!(
                "unknown facing mode '{other}', expected 'user' or 'environment'"
            ))),
        }
    }
}

/// What the caller asks of a stream. Resolution is a preference, not a
/// requirement: the stream reports what it actually delivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConstraints {
    pub facing_mode: FacingMode,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self {
            facing_mode: FacingMode::User,
            ideal_width: 640,
            ideal_height: 480,
        }
    }
}

impl StreamConstraints {
    pub fn from_config(config: &CameraConfig) -> Result<Self, CameraError> {
        Ok(Self {
            facing_mode: config.facing_mode.parse()?,
            ideal_width: config.width,
            ideal_height: config.height,
        })
    }
}

/// How much data a stream has buffered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    HaveNothing,
    HaveMetadata,
    HaveEnoughData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub id: String,
    pub live: bool,
}

/// A live stream from a camera device.
pub trait VideoStream: Send {
    fn ready_state(&self) -> ReadyState;

    /// Current (width, height) of the delivered picture.
    fn dimensions(&self) -> (u32, u32);

    /// Copy the current picture into `frame`, which the caller has sized to
    /// `dimensions()` with RGBA channels.
    fn read_pixels(&mut self, frame: &mut Frame) -> Result<(), CameraError>;

    fn tracks(&self) -> Vec<TrackInfo>;

    /// Stop one track. Returns `true` if the track was live.
    fn stop_track(&mut self, id: &str) -> bool;
}

/// Stop every live track of `stream`, returning how many were stopped.
pub fn stop_all_tracks(stream: &mut dyn VideoStream) -> usize {
    stream
        .tracks()
        .into_iter()
        .filter(|track| track.live)
        .filter(|track| stream.stop_track(&track.id))
        .count()
}

/// Source of video streams.
pub trait CameraDevice: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    fn request_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> impl Future<Output = Result<Box<dyn VideoStream>, CameraError>> + Send;
}

/// Camera selected from configuration.
pub enum Camera {
    Synthetic(SyntheticCamera),
    Mjpeg(MjpegCamera),
}

impl Camera {
    pub fn from_config(config: &CameraConfig) -> Result<Self, CameraError> {
        let url = config.url.as_str();
        if url.starts_with("stub://") {
            Ok(Camera::Synthetic(SyntheticCamera::from_url(
                url,
                config.warmup_ticks,
            )))
        } else if url.starts_with("http://") || url.starts_with("https://") {
            Ok(Camera::Mjpeg(MjpegCamera::new(url)?))
        } else {
            Err(CameraError::DeviceUnavailable(format!(
                "unsupported camera url '{url}', expected stub:// or http(s)://"
            )))
        }
    }
}

impl CameraDevice for Camera {
    fn name(&self) -> &str {
        match self {
            Camera::Synthetic(camera) => camera.name(),
            Camera::Mjpeg(camera) => camera.name(),
        }
    }

    async fn request_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn VideoStream>, CameraError> {
        match self {
            Camera::Synthetic(camera) => camera.request_stream(constraints).await,
            Camera::Mjpeg(camera) => camera.request_stream(constraints).await,
        }
    }
}
