use std::sync::{Arc, Mutex};

use sign_sense_common::config::Config;
use sign_sense_common::frame::Frame;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::camera::{CameraDevice, CameraError, StreamConstraints};
use crate::detector::Detector;
use crate::smoother::{SmootherHandle, Snapshot};
use crate::source::{FrameSource, Notifier, Permission};

/// Frame source → detector → smoother, wired together.
pub struct Pipeline<C: CameraDevice> {
    source: FrameSource<C>,
    detector: Arc<Mutex<Box<dyn Detector>>>,
    smoother: SmootherHandle,
    labels: Vec<String>,
}

impl<C: CameraDevice> Pipeline<C> {
    /// Build the pipeline and spawn its smoother. Must be called inside a tokio runtime.
    pub fn new(
        camera: C,
        constraints: StreamConstraints,
        config: &Config,
        detector: Box<dyn Detector>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let labels = detector.recognizable_labels();
        info!(
            detector = detector.name(),
            signs = labels.len(),
            "detector ready"
        );
        Self {
            source: FrameSource::new(camera, constraints, config.capture.refresh_hz, notifier),
            detector: Arc::new(Mutex::new(detector)),
            smoother: SmootherHandle::spawn(&config.smoother),
            labels,
        }
    }

    pub fn recognizable_labels(&self) -> &[String] {
        &self.labels
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.smoother.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.smoother.snapshot()
    }

    pub fn is_active(&self) -> bool {
        self.source.is_active()
    }

    pub fn permission(&self) -> Permission {
        self.source.permission()
    }

    pub fn source(&self) -> &FrameSource<C> {
        &self.source
    }

    /// Start capturing. Each frame is run through the detector and its result
    /// handed to the smoother.
    pub async fn start(&mut self) -> Result<(), CameraError> {
        let detector = Arc::clone(&self.detector);
        let observer = self.smoother.observer();
        self.source
            .start(move |frame: &Frame| {
                let result = detector
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .detect(frame);
                observer.observe(result);
            })
            .await
    }

    pub fn stop(&mut self) -> usize {
        self.source.stop()
    }

    /// Stop capturing and tear down the smoother, discarding pending appends.
    pub async fn shutdown(mut self) {
        self.source.stop();
        let Self { smoother, .. } = self;
        smoother.shutdown().await;
        debug!("pipeline shut down");
    }
}
