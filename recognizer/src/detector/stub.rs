use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sign_sense_common::config::{DetectorConfig, SignEntry};
use sign_sense_common::frame::Frame;
use sign_sense_common::recognition::RecognitionResult;
use tracing::{trace, warn};

use super::traits::Detector;

/// Immutable table of recognizable signs and their reference feature vectors.
///
/// Cheap to clone; every clone shares the same entries.
#[derive(Debug, Clone)]
pub struct SignCatalog {
    entries: Arc<[SignEntry]>,
}

impl SignCatalog {
    /// Build a catalog, dropping repeated labels (first occurrence wins).
    pub fn new(entries: impl IntoIterator<Item = SignEntry>) -> Self {
        let mut unique: Vec<SignEntry> = Vec::new();
        for entry in entries {
            if unique.iter().any(|e| e.label == entry.label) {
                warn!(label = entry.label, "duplicate sign in catalog, ignoring");
                continue;
            }
            unique.push(entry);
        }
        Self {
            entries: unique.into(),
        }
    }

    pub fn labels(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.label.clone()).collect()
    }

    pub fn features(&self, label: &str) -> Option<&[u32]> {
        self.entries
            .iter()
            .find(|e| e.label == label)
            .map(|e| e.features.as_slice())
    }

    pub fn get(&self, index: usize) -> Option<&SignEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Placeholder detector that ignores pixel content.
///
/// With probability `detection_rate` it reports a uniformly chosen catalog
/// sign with confidence uniform in `[min_confidence, max_confidence)`;
/// otherwise it reports nothing.
pub struct StubDetector {
    catalog: SignCatalog,
    detection_rate: f64,
    min_confidence: f64,
    max_confidence: f64,
    rng: StdRng,
}

impl StubDetector {
    pub fn new(catalog: SignCatalog, config: &DetectorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            catalog,
            detection_rate: config.detection_rate,
            min_confidence: config.min_confidence,
            max_confidence: config.max_confidence,
            rng,
        }
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        Self::new(SignCatalog::new(config.signs.iter().cloned()), config)
    }

    pub fn catalog(&self) -> &SignCatalog {
        &self.catalog
    }
}

impl Detector for StubDetector {
    fn detect(&mut self, frame: &Frame) -> RecognitionResult {
        if self.catalog.is_empty() || self.rng.gen::<f64>() >= self.detection_rate {
            return RecognitionResult::none();
        }

        let index = self.rng.gen_range(0..self.catalog.len());
        let confidence = if self.max_confidence > self.min_confidence {
            self.rng.gen_range(self.min_confidence..self.max_confidence)
        } else {
            self.min_confidence
        };
        let Some(entry) = self.catalog.get(index) else {
            return RecognitionResult::none();
        };

        trace!(
            seq = frame.seq,
            label = entry.label,
            confidence = format!("{:.3}", confidence),
            "stub detection"
        );
        RecognitionResult::new(entry.label.clone(), confidence)
    }

    fn recognizable_labels(&self) -> Vec<String> {
        self.catalog.labels()
    }

    fn name(&self) -> &str {
        "stub"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sign_sense_common::frame::RGBA_CHANNELS;

    fn seeded(seed: u64) -> StubDetector {
        let config = DetectorConfig {
            seed: Some(seed),
            ..DetectorConfig::default()
        };
        StubDetector::from_config(&config)
    }

    #[test]
    fn default_catalog_order() {
        let detector = seeded(1);
        assert_eq!(
            detector.recognizable_labels(),
            vec!["hello", "thank you", "yes", "no", "please"]
        );
        assert_eq!(detector.catalog().features("yes"), Some(&[2, 3, 4, 0, 1][..]));
        assert_eq!(detector.catalog().features("maybe"), None);
    }

    #[test]
    fn duplicate_labels_are_dropped() {
        let catalog = SignCatalog::new(vec![
            SignEntry {
                label: "hi".into(),
                features: vec![1],
            },
            SignEntry {
                label: "hi".into(),
                features: vec![2],
            },
        ]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.features("hi"), Some(&[1][..]));
    }

    #[test]
    fn detections_stay_in_contract() {
        let mut detector = seeded(42);
        let frame = Frame::new(2, 2, RGBA_CHANNELS);
        let labels = detector.recognizable_labels();
        let mut hits = 0;
        for _ in 0..2000 {
            let result = detector.detect(&frame);
            match &result.label {
                Some(label) => {
                    hits += 1;
                    assert!(labels.contains(label));
                    assert!((0.7..0.95).contains(&result.confidence));
                }
                None => assert_eq!(result.confidence, 0.0),
            }
        }
        // 40% nominal rate; wide bounds keep this deterministic-seed check robust
        assert!((600..1000).contains(&hits), "hits = {hits}");
    }

    #[test]
    fn same_seed_same_sequence() {
        let frame = Frame::new(1, 1, RGBA_CHANNELS);
        let mut a = seeded(9);
        let mut b = seeded(9);
        for _ in 0..50 {
            assert_eq!(a.detect(&frame), b.detect(&frame));
        }
    }

    #[test]
    fn empty_catalog_never_detects() {
        let config = DetectorConfig {
            detection_rate: 1.0,
            seed: Some(3),
            signs: Vec::new(),
            ..DetectorConfig::default()
        };
        let mut detector = StubDetector::from_config(&config);
        let frame = Frame::new(1, 1, RGBA_CHANNELS);
        for _ in 0..20 {
            assert_eq!(detector.detect(&frame), RecognitionResult::none());
        }
    }

    #[test]
    fn zero_width_confidence_range() {
        let config = DetectorConfig {
            detection_rate: 1.0,
            min_confidence: 0.8,
            max_confidence: 0.8,
            seed: Some(5),
            ..DetectorConfig::default()
        };
        let mut detector = StubDetector::from_config(&config);
        let result = detector.detect(&Frame::new(1, 1, RGBA_CHANNELS));
        assert!(result.label.is_some());
        assert_eq!(result.confidence, 0.8);
    }
}
