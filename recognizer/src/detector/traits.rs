use sign_sense_common::frame::Frame;
use sign_sense_common::recognition::RecognitionResult;

/// Sign recognizer interface.
///
/// Implementations receive each captured frame by reference and report the
/// sign they see, if any. The frame must not be retained past the call.
pub trait Detector: Send {
    fn detect(&mut self, frame: &Frame) -> RecognitionResult;

    /// Labels this detector can ever report, in catalog order.
    fn recognizable_labels(&self) -> Vec<String>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}
