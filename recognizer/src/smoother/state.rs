use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Duration;

use sign_sense_common::config::SmootherConfig;
use sign_sense_common::recognition::RecognitionResult;
use tokio::time::Instant;
use tracing::{debug, info};

use super::history::History;

/// Presentational indicator; never gates `observe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingState {
    #[default]
    Idle,
    /// At least one delayed append is pending.
    Processing,
}

/// Everything the presentation layer may read.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub label: Option<String>,
    pub confidence: f64,
    pub history: Vec<String>,
    pub processing: ProcessingState,
}

/// A delayed history append. Ordered by deadline, then by issue order.
#[derive(Debug)]
struct PendingAppend {
    deadline: Instant,
    seq: u64,
    label: String,
}

impl PartialEq for PendingAppend {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PendingAppend {}

impl PartialOrd for PendingAppend {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingAppend {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.deadline, self.seq).cmp(&(other.deadline, other.seq))
    }
}

/// Reduces the per-frame recognition results into the rendered state.
///
/// Time is passed in explicitly so the reducer stays synchronous; the async
/// driver in `driver.rs` supplies `Instant::now()` and sleeps until
/// `next_deadline()`.
pub struct RecognitionSmoother {
    threshold: f64,
    delay: Duration,
    display_epsilon: f64,
    current: RecognitionResult,
    history: History,
    pending: BinaryHeap<Reverse<PendingAppend>>,
    next_seq: u64,
}

impl RecognitionSmoother {
    pub fn new(config: &SmootherConfig) -> Self {
        Self {
            threshold: config.threshold,
            delay: Duration::from_millis(config.delay_ms),
            display_epsilon: config.display_epsilon,
            current: RecognitionResult::none(),
            history: History::new(config.history_len),
            pending: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Feed one detector result observed at `now`.
    ///
    /// Updates the displayed result, and if the result qualifies schedules a
    /// history append at `now + delay`. Returns whether an append was scheduled.
    pub fn observe(&mut self, result: RecognitionResult, now: Instant) -> bool {
        let scheduled = match result.qualifying_label(self.threshold) {
            Some(label) => {
                let seq = self.next_seq;
                self.next_seq += 1;
                debug!(
                    label,
                    seq,
                    confidence = format!("{:.2}", result.confidence),
                    "scheduling history append"
                );
                self.pending.push(Reverse(PendingAppend {
                    deadline: now + self.delay,
                    seq,
                    label: label.to_string(),
                }));
                true
            }
            None => false,
        };
        self.update_current(result);
        scheduled
    }

    /// Apply every pending append whose deadline is at or before `now`, in
    /// deadline order. Returns how many labels were actually appended.
    pub fn advance(&mut self, now: Instant) -> usize {
        let mut appended = 0;
        while let Some(Reverse(next)) = self.pending.peek() {
            if next.deadline > now {
                break;
            }
            let Some(Reverse(due)) = self.pending.pop() else {
                break;
            };
            if self.history.push(&due.label) {
                appended += 1;
                info!(
                    label = due.label,
                    history_len = self.history.len(),
                    "sign added to history"
                );
            } else {
                debug!(label = due.label, "repeat of last history entry, suppressed");
            }
        }
        appended
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.peek().map(|Reverse(p)| p.deadline)
    }

    /// Drop all pending appends without applying them.
    pub fn cancel_pending(&mut self) -> usize {
        let cancelled = self.pending.len();
        self.pending.clear();
        cancelled
    }

    pub fn processing(&self) -> ProcessingState {
        if self.pending.is_empty() {
            ProcessingState::Idle
        } else {
            ProcessingState::Processing
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.current.label.as_deref()
    }

    pub fn confidence(&self) -> f64 {
        self.current.confidence
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            label: self.current.label.clone(),
            confidence: self.current.confidence,
            history: self.history.to_vec(),
            processing: self.processing(),
        }
    }

    /// The displayed result only changes when the label changes or the
    /// confidence moves by more than the display epsilon.
    fn update_current(&mut self, result: RecognitionResult) {
        if result.label != self.current.label
            || (result.confidence - self.current.confidence).abs() > self.display_epsilon
        {
            self.current = result;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(800);

    fn smoother() -> RecognitionSmoother {
        RecognitionSmoother::new(&SmootherConfig::default())
    }

    fn observe_and_settle(s: &mut RecognitionSmoother, t: &mut Instant, label: &str, conf: f64) {
        s.observe(RecognitionResult::new(label, conf), *t);
        *t += DELAY;
        s.advance(*t);
    }

    #[test]
    fn hello_then_duplicate_hello() {
        let mut s = smoother();
        let mut t = Instant::now();

        assert!(s.observe(RecognitionResult::new("hello", 0.8), t));
        assert_eq!(s.processing(), ProcessingState::Processing);
        assert_eq!(s.advance(t + Duration::from_millis(799)), 0);
        assert!(s.history().is_empty());

        t += DELAY;
        assert_eq!(s.advance(t), 1);
        assert_eq!(s.history().to_vec(), vec!["hello"]);
        assert_eq!(s.processing(), ProcessingState::Idle);

        observe_and_settle(&mut s, &mut t, "hello", 0.9);
        assert_eq!(s.history().to_vec(), vec!["hello"]);
    }

    #[test]
    fn six_distinct_labels_keep_last_five() {
        let mut s = smoother();
        let mut t = Instant::now();
        for label in ["a", "b", "c", "d", "e", "f"] {
            observe_and_settle(&mut s, &mut t, label, 0.8);
        }
        assert_eq!(s.history().to_vec(), vec!["b", "c", "d", "e", "f"]);
    }

    #[test]
    fn non_qualifying_results_never_touch_history() {
        let mut s = smoother();
        let mut t = Instant::now();
        observe_and_settle(&mut s, &mut t, "yes", 0.9);
        let before = s.history().clone();

        assert!(!s.observe(RecognitionResult::new("no", 0.7), t));
        assert!(!s.observe(RecognitionResult::new("please", 0.3), t));
        assert!(!s.observe(RecognitionResult::none(), t));
        assert_eq!(s.processing(), ProcessingState::Idle);
        assert_eq!(s.next_deadline(), None);
        s.advance(t + DELAY * 10);
        assert_eq!(s.history(), &before);
    }

    #[test]
    fn overlapping_appends_apply_in_deadline_order() {
        let mut s = smoother();
        let t0 = Instant::now();
        // Issued out of time order: "late" is observed with a later timestamp first.
        s.observe(RecognitionResult::new("late", 0.9), t0 + Duration::from_millis(300));
        s.observe(RecognitionResult::new("early", 0.9), t0);
        assert_eq!(s.next_deadline(), Some(t0 + DELAY));

        assert_eq!(s.advance(t0 + DELAY), 1);
        assert_eq!(s.history().to_vec(), vec!["early"]);
        assert_eq!(s.processing(), ProcessingState::Processing);

        assert_eq!(s.advance(t0 + DELAY + Duration::from_millis(300)), 1);
        assert_eq!(s.history().to_vec(), vec!["early", "late"]);
    }

    #[test]
    fn equal_deadlines_apply_in_issue_order() {
        let mut s = smoother();
        let t = Instant::now();
        s.observe(RecognitionResult::new("no", 0.9), t);
        s.observe(RecognitionResult::new("yes", 0.9), t);
        s.observe(RecognitionResult::new("yes", 0.8), t);
        assert_eq!(s.advance(t + DELAY), 2);
        assert_eq!(s.history().to_vec(), vec!["no", "yes"]);
    }

    #[test]
    fn cancelled_appends_never_fire() {
        let mut s = smoother();
        let t = Instant::now();
        s.observe(RecognitionResult::new("hello", 0.9), t);
        s.observe(RecognitionResult::new("yes", 0.9), t);
        assert_eq!(s.cancel_pending(), 2);
        assert_eq!(s.advance(t + DELAY), 0);
        assert!(s.history().is_empty());
        assert_eq!(s.processing(), ProcessingState::Idle);
    }

    #[test]
    fn current_result_display_gating() {
        let mut s = smoother();
        let t = Instant::now();
        s.observe(RecognitionResult::new("hello", 0.80), t);
        assert_eq!(s.label(), Some("hello"));

        // Same label, small confidence drift: display unchanged
        s.observe(RecognitionResult::new("hello", 0.85), t);
        assert_eq!(s.confidence(), 0.80);

        // Same label, large drift: display follows
        s.observe(RecognitionResult::new("hello", 0.95), t);
        assert_eq!(s.confidence(), 0.95);

        // Label change always shows, including "nothing detected"
        s.observe(RecognitionResult::none(), t);
        assert_eq!(s.label(), None);
        assert_eq!(s.confidence(), 0.0);
    }

    #[test]
    fn snapshot_reflects_state() {
        let mut s = smoother();
        let mut t = Instant::now();
        observe_and_settle(&mut s, &mut t, "thank you", 0.9);
        s.observe(RecognitionResult::new("please", 0.75), t);
        assert_eq!(
            s.snapshot(),
            Snapshot {
                label: Some("please".into()),
                confidence: 0.75,
                history: vec!["thank you".into()],
                processing: ProcessingState::Processing,
            }
        );
    }
}
