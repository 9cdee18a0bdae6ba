//! Webcam sign recognition demo: a frame source pumping camera frames through
//! a placeholder detector into a smoothed, bounded recognition history.

pub mod camera;
pub mod detector;
pub mod pipeline;
pub mod render;
pub mod smoother;
pub mod source;
