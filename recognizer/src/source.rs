use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use sign_sense_common::frame::{Frame, RGBA_CHANNELS};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace, warn};

use crate::camera::{
    stop_all_tracks, CameraDevice, CameraError, ReadyState, StreamConstraints, VideoStream,
};

/// A message for the person in front of the camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub description: String,
}

impl Notification {
    fn camera_error() -> Self {
        Self {
            title: "Camera Error".into(),
            description: "Unable to access webcam. Please check permissions.".into(),
        }
    }
}

/// Delivery of user-visible notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        error!(
            title = notification.title,
            description = notification.description,
            "notification"
        );
    }
}

/// Outcome of the most recent camera access request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Permission {
    #[default]
    Unknown,
    Granted,
    Denied,
}

/// Floor for the refresh period; `tokio::time::interval` rejects a zero period.
const MIN_TICK: Duration = Duration::from_micros(100);
/// Ceiling for the refresh period, matching the slowest configurable rate.
const MAX_TICK: Duration = Duration::from_secs(1000);

fn tick_period(refresh_hz: f64) -> Duration {
    Duration::try_from_secs_f64(1.0 / refresh_hz)
        .unwrap_or(MAX_TICK)
        .clamp(MIN_TICK, MAX_TICK)
}

type SharedStream = Arc<Mutex<Option<Box<dyn VideoStream>>>>;

fn lock(stream: &SharedStream) -> MutexGuard<'_, Option<Box<dyn VideoStream>>> {
    stream.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Pumps frames from a camera into a callback, once per refresh tick.
///
/// The stream is shared with the capture task but released only here, by
/// `stop()` or on drop, so the device is freed synchronously on every exit
/// path even if the task has not been polled since.
pub struct FrameSource<C: CameraDevice> {
    camera: C,
    constraints: StreamConstraints,
    tick: Duration,
    notifier: Arc<dyn Notifier>,
    permission: Permission,
    session: Option<CaptureSession>,
}

struct CaptureSession {
    stream: SharedStream,
    task: JoinHandle<()>,
}

impl CaptureSession {
    /// Halt the loop and stop every track. Returns the number of tracks stopped.
    fn release(self) -> usize {
        self.task.abort();
        let stream = lock(&self.stream).take();
        match stream {
            Some(mut stream) => stop_all_tracks(stream.as_mut()),
            None => 0,
        }
    }
}

impl<C: CameraDevice> FrameSource<C> {
    pub fn new(
        camera: C,
        constraints: StreamConstraints,
        refresh_hz: f64,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            camera,
            constraints,
            tick: tick_period(refresh_hz),
            notifier,
            permission: Permission::Unknown,
            session: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn permission(&self) -> Permission {
        self.permission
    }

    pub fn camera(&self) -> &C {
        &self.camera
    }

    /// Open the camera and start the capture loop.
    ///
    /// On failure the caller's notifier is told once, the source stays
    /// inactive, and the error is returned. Calling `start` while active is a
    /// no-op.
    pub async fn start<F>(&mut self, on_frame: F) -> Result<(), CameraError>
    where
        F: FnMut(&Frame) + Send + 'static,
    {
        if self.is_active() {
            warn!(camera = self.camera.name(), "frame source already active");
            return Ok(());
        }

        let stream = match self.camera.request_stream(&self.constraints).await {
            Ok(stream) => stream,
            Err(e) => {
                if matches!(e, CameraError::PermissionDenied) {
                    self.permission = Permission::Denied;
                }
                error!(error = %e, camera = self.camera.name(), "error accessing camera");
                self.notifier.notify(Notification::camera_error());
                return Err(e);
            }
        };

        self.permission = Permission::Granted;
        let stream: SharedStream = Arc::new(Mutex::new(Some(stream)));
        let task = tokio::spawn(run_capture_loop(Arc::clone(&stream), self.tick, on_frame));
        self.session = Some(CaptureSession { stream, task });
        info!(
            camera = self.camera.name(),
            tick_ms = format!("{:.2}", self.tick.as_secs_f64() * 1000.0),
            "capture started"
        );
        Ok(())
    }

    /// Stop the capture loop and release the camera. Returns the number of
    /// tracks stopped, which is 0 when already inactive.
    pub fn stop(&mut self) -> usize {
        match self.session.take() {
            Some(session) => {
                let stopped = session.release();
                info!(camera = self.camera.name(), tracks = stopped, "capture stopped");
                stopped
            }
            None => 0,
        }
    }
}

impl<C: CameraDevice> Drop for FrameSource<C> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug)]
enum TickOutcome {
    Captured,
    NotReady,
    Failed(CameraError),
    Ended,
    Released,
}

/// One refresh tick: copy the current picture into `frame` if the stream is ready.
fn capture_tick(stream: &SharedStream, frame: &mut Frame) -> TickOutcome {
    let mut guard = lock(stream);
    let Some(stream) = guard.as_mut() else {
        return TickOutcome::Released;
    };
    if stream.ready_state() != ReadyState::HaveEnoughData {
        if stream.tracks().iter().all(|track| !track.live) {
            return TickOutcome::Ended;
        }
        return TickOutcome::NotReady;
    }
    let (width, height) = stream.dimensions();
    frame.resize(width, height, RGBA_CHANNELS);
    match stream.read_pixels(frame) {
        Ok(()) => TickOutcome::Captured,
        Err(e) => TickOutcome::Failed(e),
    }
}

async fn run_capture_loop<F>(stream: SharedStream, tick: Duration, mut on_frame: F)
where
    F: FnMut(&Frame),
{
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut frame = Frame::default();
    let mut seq: u64 = 0;

    loop {
        ticker.tick().await;

        match capture_tick(&stream, &mut frame) {
            TickOutcome::Captured => {
                frame.stamp(seq);
                seq += 1;
                on_frame(&frame);
                if seq % 600 == 0 {
                    debug!(frames = seq, "frames captured");
                }
            }
            TickOutcome::NotReady => trace!("stream not ready, skipping tick"),
            TickOutcome::Failed(e) => warn!(error = %e, "failed to copy frame, skipping tick"),
            TickOutcome::Ended => {
                warn!(frames = seq, "camera stream ended, capture loop exiting");
                return;
            }
            TickOutcome::Released => {
                debug!(frames = seq, "stream released, capture loop exiting");
                return;
            }
        }
    }
}
