/// Output of a detector for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionResult {
    pub label: Option<String>,
    /// Detector certainty, always within [0, 1].
    pub confidence: f64,
}

impl RecognitionResult {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: Some(label.into()),
            confidence: clamp_unit(confidence),
        }
    }

    /// The "nothing detected" result.
    pub fn none() -> Self {
        Self {
            label: None,
            confidence: 0.0,
        }
    }

    /// Returns the label if the confidence is strictly above `threshold`.
    pub fn qualifying_label(&self, threshold: f64) -> Option<&str> {
        match &self.label {
            Some(label) if self.confidence > threshold => Some(label),
            _ => None,
        }
    }
}

impl Default for RecognitionResult {
    fn default() -> Self {
        Self::none()
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
