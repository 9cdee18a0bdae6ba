use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::BytesMut;
use futures_util::StreamExt;
use sign_sense_common::frame::{Frame, RGBA_CHANNELS};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{CameraDevice, CameraError, ReadyState, StreamConstraints, TrackInfo, VideoStream};

const BOUNDARY: &[u8] = b"--frame\r\n";
const HEADER_END: &[u8] = b"\r\n\r\n";
const TRACK_ID: &str = "mjpeg-video-0";
/// Largest part the parser buffers before giving up on it and resyncing.
const MAX_PART_BYTES: usize = 8 * 1024 * 1024;

/// Camera served as a multipart MJPEG stream over HTTP.
///
/// The facing mode and ideal resolution are passed to the camera server as
/// query parameters; the delivered resolution is whatever the JPEGs decode to.
pub struct MjpegCamera {
    url: String,
    client: reqwest::Client,
}

impl MjpegCamera {
    pub fn new(url: &str) -> Result<Self, CameraError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| CameraError::DeviceUnavailable(e.to_string()))?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }

    fn stream_url(&self, constraints: &StreamConstraints) -> String {
        let sep = if self.url.contains('?') { '&' } else { '?' };
        format!(
            "{}{sep}facingMode={}&width={}&height={}",
            self.url,
            constraints.facing_mode.as_str(),
            constraints.ideal_width,
            constraints.ideal_height
        )
    }
}

impl CameraDevice for MjpegCamera {
    fn name(&self) -> &str {
        &self.url
    }

    async fn request_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn VideoStream>, CameraError> {
        let url = self.stream_url(constraints);
        info!(url, "connecting to MJPEG stream");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CameraError::DeviceUnavailable(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(CameraError::PermissionDenied);
        }
        if !status.is_success() {
            return Err(CameraError::DeviceUnavailable(format!(
                "HTTP status {}",
                status.as_u16()
            )));
        }

        info!(status = %status, "connected to MJPEG stream");

        let shared = Arc::new(Mutex::new(SharedPicture::default()));
        let reader = tokio::spawn(read_stream(response, Arc::clone(&shared)));
        Ok(Box::new(MjpegStream {
            shared,
            reader: Some(reader),
        }))
    }
}

#[derive(Default)]
struct SharedPicture {
    latest: Option<DecodedPicture>,
    ended: bool,
}

struct DecodedPicture {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

fn lock(shared: &Mutex<SharedPicture>) -> MutexGuard<'_, SharedPicture> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn read_stream(response: reqwest::Response, shared: Arc<Mutex<SharedPicture>>) {
    let mut byte_stream = response.bytes_stream();
    let mut parser = MultipartParser::new();
    let mut decoded: u64 = 0;

    while let Some(chunk) = byte_stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "MJPEG stream error");
                break;
            }
        };

        for jpeg in parser.push(&chunk) {
            match decode_jpeg(&jpeg) {
                Some(picture) => {
                    decoded += 1;
                    lock(&shared).latest = Some(picture);
                }
                None => warn!(bytes = jpeg.len(), "failed to decode JPEG part, skipping"),
            }
        }
    }

    info!(decoded, "MJPEG stream ended");
    lock(&shared).ended = true;
}

fn decode_jpeg(data: &[u8]) -> Option<DecodedPicture> {
    let img = image::load_from_memory(data).ok()?.to_rgba8();
    Some(DecodedPicture {
        width: img.width(),
        height: img.height(),
        rgba: img.into_raw(),
    })
}

struct MjpegStream {
    shared: Arc<Mutex<SharedPicture>>,
    reader: Option<JoinHandle<()>>,
}

impl VideoStream for MjpegStream {
    fn ready_state(&self) -> ReadyState {
        if self.reader.is_none() {
            return ReadyState::HaveNothing;
        }
        let shared = lock(&self.shared);
        match (&shared.latest, shared.ended) {
            (_, true) => ReadyState::HaveNothing,
            (Some(_), false) => ReadyState::HaveEnoughData,
            (None, false) => ReadyState::HaveMetadata,
        }
    }

    fn dimensions(&self) -> (u32, u32) {
        lock(&self.shared)
            .latest
            .as_ref()
            .map(|p| (p.width, p.height))
            .unwrap_or((0, 0))
    }

    fn read_pixels(&mut self, frame: &mut Frame) -> Result<(), CameraError> {
        let shared = lock(&self.shared);
        let picture = shared
            .latest
            .as_ref()
            .ok_or_else(|| CameraError::Read("no picture decoded yet".into()))?;
        if (frame.width(), frame.height(), frame.channels())
            != (picture.width, picture.height, RGBA_CHANNELS)
        {
            return Err(CameraError::Read(format!(
                "buffer is {}x{}, picture is {}x{}",
                frame.width(),
                frame.height(),
                picture.width,
                picture.height
            )));
        }
        frame
            .copy_from(&picture.rgba)
            .map_err(|e| CameraError::Read(e.to_string()))
    }

    fn tracks(&self) -> Vec<TrackInfo> {
        vec![TrackInfo {
            id: TRACK_ID.into(),
            live: self.reader.is_some() && !lock(&self.shared).ended,
        }]
    }

    fn stop_track(&mut self, id: &str) -> bool {
        if id != TRACK_ID {
            return false;
        }
        match self.reader.take() {
            Some(reader) => {
                reader.abort();
                debug!(track = id, "MJPEG track stopped");
                true
            }
            None => false,
        }
    }
}

impl Drop for MjpegStream {
    fn drop(&mut self) {
        self.stop_track(TRACK_ID);
    }
}

/// Parse state for the MJPEG multipart stream.
enum ParseState {
    /// Looking for the boundary marker `--frame\r\n`.
    SeekingBoundary,
    /// Found boundary, now looking for end of headers `\r\n\r\n`.
    SeekingHeaderEnd,
    /// Collecting JPEG bytes until the next boundary.
    CollectingJpeg,
}

/// Incremental splitter for `multipart/x-mixed-replace; boundary=frame` bodies.
pub struct MultipartParser {
    buffer: BytesMut,
    state: ParseState,
    jpeg_start: usize,
    max_part: usize,
}

impl Default for MultipartParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartParser {
    pub fn new() -> Self {
        Self::with_max_part(MAX_PART_BYTES)
    }

    /// Parser that drops any part (headers included) larger than `max_part` bytes.
    pub fn with_max_part(max_part: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(max_part.min(256 * 1024)),
            state: ParseState::SeekingBoundary,
            jpeg_start: 0,
            max_part: max_part.max(BOUNDARY.len()),
        }
    }

    /// Discard an oversized part and go back to looking for a boundary.
    fn resync(&mut self) {
        warn!(
            bytes = self.buffer.len(),
            limit = self.max_part,
            "MJPEG part exceeds size limit, dropping it"
        );
        let _ = self.buffer.split_to(self.buffer.len() - BOUNDARY.len());
        self.jpeg_start = 0;
        self.state = ParseState::SeekingBoundary;
    }

    /// Feed one chunk; returns every JPEG part completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(chunk);
        let mut parts = Vec::new();

        loop {
            match self.state {
                ParseState::SeekingBoundary => {
                    if let Some(pos) = find_subsequence(&self.buffer, BOUNDARY) {
                        let _ = self.buffer.split_to(pos + BOUNDARY.len());
                        self.state = ParseState::SeekingHeaderEnd;
                    } else {
                        // Keep a tail in case the boundary spans chunks
                        if self.buffer.len() > BOUNDARY.len() {
                            let _ = self.buffer.split_to(self.buffer.len() - BOUNDARY.len());
                        }
                        break;
                    }
                }
                ParseState::SeekingHeaderEnd => {
                    if let Some(pos) = find_subsequence(&self.buffer, HEADER_END) {
                        let _ = self.buffer.split_to(pos + HEADER_END.len());
                        self.jpeg_start = 0;
                        self.state = ParseState::CollectingJpeg;
                    } else {
                        if self.buffer.len() > self.max_part {
                            self.resync();
                        }
                        break;
                    }
                }
                ParseState::CollectingJpeg => {
                    if let Some(pos) = find_subsequence(&self.buffer[self.jpeg_start..], BOUNDARY)
                    {
                        let jpeg_end = self.jpeg_start + pos;
                        // Strip trailing \r\n before boundary
                        let end = if jpeg_end >= 2 && &self.buffer[jpeg_end - 2..jpeg_end] == b"\r\n"
                        {
                            jpeg_end - 2
                        } else {
                            jpeg_end
                        };
                        let jpeg = self.buffer[..end].to_vec();
                        let _ = self.buffer.split_to(jpeg_end + BOUNDARY.len());
                        if !jpeg.is_empty() {
                            parts.push(jpeg);
                        }
                        self.state = ParseState::SeekingHeaderEnd;
                    } else {
                        // Avoid re-scanning bytes already searched
                        self.jpeg_start = self.buffer.len().saturating_sub(BOUNDARY.len());
                        if self.buffer.len() > self.max_part {
                            self.resync();
                        }
                        break;
                    }
                }
            }
        }

        parts
    }
}

/// Find the position of `needle` in `haystack`.
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
