use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use sign_sense_common::frame::{Frame, RGBA_CHANNELS};
use tracing::{debug, info};

use super::{CameraDevice, CameraError, ReadyState, StreamConstraints, TrackInfo, VideoStream};

const TRACK_ID: &str = "synthetic-video-0";

/// How the synthetic device answers a stream request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Granted,
    Denied,
    Unavailable,
}

/// Generated camera for demos and tests.
///
/// `stub://denied` and `stub://unavailable` simulate the two failure modes;
/// any other `stub://` URL grants access. Clones share the same device, so
/// only one stream can be open at a time across all of them.
#[derive(Debug, Clone)]
pub struct SyntheticCamera {
    name: String,
    access: Access,
    warmup_ticks: u32,
    native_resolution: Option<(u32, u32)>,
    device: Arc<DeviceState>,
}

#[derive(Debug, Default)]
struct DeviceState {
    in_use: AtomicBool,
    opened: AtomicUsize,
    released: AtomicUsize,
}

impl SyntheticCamera {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            access: Access::Granted,
            warmup_ticks: 0,
            native_resolution: None,
            device: Arc::default(),
        }
    }

    pub fn from_url(url: &str, warmup_ticks: u32) -> Self {
        let access = match url.trim_start_matches("stub://") {
            "denied" => Access::Denied,
            "unavailable" => Access::Unavailable,
            _ => Access::Granted,
        };
        Self::new(url).with_access(access).with_warmup(warmup_ticks)
    }

    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    /// Number of readiness polls that report `HaveMetadata` before frames flow.
    pub fn with_warmup(mut self, ticks: u32) -> Self {
        self.warmup_ticks = ticks;
        self
    }

    /// Deliver this resolution regardless of the requested ideal.
    pub fn with_native_resolution(mut self, width: u32, height: u32) -> Self {
        self.native_resolution = Some((width, height));
        self
    }

    pub fn in_use(&self) -> bool {
        self.device.in_use.load(Ordering::SeqCst)
    }

    /// Streams successfully opened on this device.
    pub fn open_count(&self) -> usize {
        self.device.opened.load(Ordering::SeqCst)
    }

    /// Times the device was released by stopping its last live track.
    pub fn release_count(&self) -> usize {
        self.device.released.load(Ordering::SeqCst)
    }
}

impl CameraDevice for SyntheticCamera {
    fn name(&self) -> &str {
        &self.name
    }

    async fn request_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn VideoStream>, CameraError> {
        match self.access {
            Access::Denied => return Err(CameraError::PermissionDenied),
            Access::Unavailable => {
                return Err(CameraError::DeviceUnavailable(format!(
                    "{}: no camera attached",
                    self.name
                )))
            }
            Access::Granted => {}
        }

        if self
            .device
            .in_use
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(CameraError::DeviceUnavailable(format!(
                "{}: device is busy",
                self.name
            )));
        }
        self.device.opened.fetch_add(1, Ordering::SeqCst);

        let (width, height) = self
            .native_resolution
            .unwrap_or((constraints.ideal_width, constraints.ideal_height));
        info!(
            camera = self.name,
            width,
            height,
            facing = constraints.facing_mode.as_str(),
            "synthetic stream opened"
        );

        Ok(Box::new(SyntheticStream {
            device: Arc::clone(&self.device),
            width,
            height,
            warmup_remaining: Cell::new(self.warmup_ticks),
            frames: 0,
            live: true,
        }))
    }
}

struct SyntheticStream {
    device: Arc<DeviceState>,
    width: u32,
    height: u32,
    warmup_remaining: Cell<u32>,
    frames: u64,
    live: bool,
}

impl SyntheticStream {
    /// Fill `pixels` with a diagonal gradient that drifts one step per frame.
    fn paint(&self, pixels: &mut [u8]) {
        let width = self.width as usize;
        let stride = RGBA_CHANNELS as usize;
        for (i, px) in pixels.chunks_exact_mut(stride).enumerate() {
            let x = (i % width) as u64;
            let y = (i / width) as u64;
            px[0] = ((x + y + self.frames) % 256) as u8;
            px[1] = (x % 256) as u8;
            px[2] = (y % 256) as u8;
            px[3] = 0xFF;
        }
    }
}

impl VideoStream for SyntheticStream {
    fn ready_state(&self) -> ReadyState {
        if !self.live {
            return ReadyState::HaveNothing;
        }
        let remaining = self.warmup_remaining.get();
        if remaining > 0 {
            self.warmup_remaining.set(remaining - 1);
            return ReadyState::HaveMetadata;
        }
        ReadyState::HaveEnoughData
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn read_pixels(&mut self, frame: &mut Frame) -> Result<(), CameraError> {
        if !self.live {
            return Err(CameraError::Read("track stopped".into()));
        }
        if (frame.width(), frame.height()) != (self.width, self.height)
            || frame.channels() != RGBA_CHANNELS
        {
            return Err(CameraError::Read(format!(
                "buffer is {}x{}x{}, stream is {}x{}x{}",
                frame.width(),
                frame.height(),
                frame.channels(),
                self.width,
                self.height,
                RGBA_CHANNELS
            )));
        }
        self.paint(frame.pixels_mut());
        self.frames += 1;
        Ok(())
    }

    fn tracks(&self) -> Vec<TrackInfo> {
        vec![TrackInfo {
            id: TRACK_ID.into(),
            live: self.live,
        }]
    }

    fn stop_track(&mut self, id: &str) -> bool {
        if id != TRACK_ID || !self.live {
            return false;
        }
        self.live = false;
        self.device.in_use.store(false, Ordering::SeqCst);
        self.device.released.fetch_add(1, Ordering::SeqCst);
        debug!(track = id, frames = self.frames, "synthetic track stopped");
        true
    }
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        self.stop_track(TRACK_ID);
    }
}
