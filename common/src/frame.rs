/// Bytes per pixel of a captured frame (RGBA, like a canvas readback).
pub const RGBA_CHANNELS: u8 = 4;

/// A captured camera frame.
///
/// The pixel buffer is row-major, `width * height * channels` bytes long.
/// The capture loop owns one `Frame` and reuses it across ticks; consumers
/// only ever see it by reference for the duration of a callback.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    pub captured_at_ms: i64,
    pub seq: u64,
}

impl Frame {
    /// Create a zeroed frame of the given geometry.
    pub fn new(width: u32, height: u32, channels: u8) -> Self {
        let mut frame = Self::default();
        frame.resize(width, height, channels);
        frame
    }

    /// Resize the buffer in place. Existing capacity is kept, so a frame that
    /// is repeatedly resized to the same geometry does not reallocate.
    pub fn resize(&mut self, width: u32, height: u32, channels: u8) {
        if self.width == width && self.height == height && self.channels == channels {
            return;
        }
        if self.width != 0 {
            tracing::debug!(
                from_width = self.width,
                from_height = self.height,
                width,
                height,
                "frame buffer resized"
            );
        }
        self.width = width;
        self.height = height;
        self.channels = channels;
        self.pixels.resize(Self::byte_len(width, height, channels), 0);
    }

    /// Stamp the frame for a new capture cycle.
    pub fn stamp(&mut self, seq: u64) {
        self.seq = seq;
        self.captured_at_ms = chrono::Utc::now().timestamp_millis();
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Copy `src` into the buffer. Fails if the length does not match the geometry.
    pub fn copy_from(&mut self, src: &[u8]) -> Result<(), FrameError> {
        if src.len() != self.pixels.len() {
            return Err(FrameError::SizeMismatch {
                got: src.len(),
                expected: self.pixels.len(),
            });
        }
        self.pixels.copy_from_slice(src);
        Ok(())
    }

    /// Returns the sample slice of the pixel at (x, y), if in bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let stride = self.channels as usize;
        let start = (y as usize * self.width as usize + x as usize) * stride;
        self.pixels.get(start..start + stride)
    }

    fn byte_len(width: u32, height: u32, channels: u8) -> usize {
        width as usize * height as usize * channels as usize
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("pixel data size mismatch: got {got} bytes, expected {expected}")]
    SizeMismatch { got: usize, expected: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_frame_is_zeroed() {
        let frame = Frame::new(4, 2, RGBA_CHANNELS);
        assert_eq!(frame.pixels().len(), 32);
        assert!(frame.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn resize_tracks_geometry() {
        let mut frame = Frame::new(640, 480, RGBA_CHANNELS);
        frame.resize(320, 240, RGBA_CHANNELS);
        assert_eq!(frame.width(), 320);
        assert_eq!(frame.height(), 240);
        assert_eq!(frame.pixels().len(), 320 * 240 * 4);
    }

    #[test]
    fn copy_from_rejects_wrong_length() {
        let mut frame = Frame::new(2, 2, RGBA_CHANNELS);
        let err = frame.copy_from(&[0; 3]).unwrap_err();
        assert!(matches!(err, FrameError::SizeMismatch { got: 3, expected: 16 }));
    }

    #[test]
    fn pixel_lookup() {
        let mut frame = Frame::new(2, 2, RGBA_CHANNELS);
        let data: Vec<u8> = (0..16).collect();
        frame.copy_from(&data).unwrap();
        assert_eq!(frame.pixel(1, 1).unwrap(), &[12, 13, 14, 15]);
        assert!(frame.pixel(2, 0).is_none());
    }

    #[test]
    fn stamp_sets_sequence_and_time() {
        let mut frame = Frame::new(1, 1, RGBA_CHANNELS);
        frame.stamp(42);
        assert_eq!(frame.seq, 42);
        assert!(frame.captured_at_ms > 0);
    }
}
