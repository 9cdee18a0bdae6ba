use std::collections::VecDeque;

/// Bounded list of recently recognized labels, most recent last.
///
/// Adjacent entries are never equal: pushing the label that is already last
/// is a no-op. When full, the oldest entry is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    entries: VecDeque<String>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Append `label` unless it repeats the last entry. Returns whether it was appended.
    pub fn push(&mut self, label: &str) -> bool {
        if self.last() == Some(label) {
            return false;
        }
        self.entries.push_back(label.to_string());
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        true
    }

    pub fn last(&self) -> Option<&str> {
        self.entries.back().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_duplicates_suppressed() {
        let mut history = History::new(5);
        assert!(history.push("hello"));
        assert!(!history.push("hello"));
        assert!(history.push("yes"));
        assert!(history.push("hello"));
        assert_eq!(history.to_vec(), vec!["hello", "yes", "hello"]);
    }

    #[test]
    fn oldest_trimmed_at_capacity() {
        let mut history = History::new(5);
        for label in ["a", "b", "c", "d", "e", "f"] {
            history.push(label);
        }
        assert_eq!(history.to_vec(), vec!["b", "c", "d", "e", "f"]);
        assert_eq!(history.last(), Some("f"));
    }

    #[test]
    fn invariants_hold_for_long_sequences() {
        let labels = ["hello", "yes", "no", "please", "thank you"];
        let mut history = History::new(5);
        // Deterministic pseudo-random walk over the labels, with many repeats
        let mut x: usize = 17;
        for _ in 0..500 {
            x = (x * 31 + 7) % 101;
            history.push(labels[x % 3 + (x % 7 == 0) as usize * 2]);
            assert!(history.len() <= 5);
            let entries = history.to_vec();
            assert!(entries.windows(2).all(|w| w[0] != w[1]), "{entries:?}");
        }
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut history = History::new(0);
        history.push("a");
        history.push("b");
        assert_eq!(history.to_vec(), vec!["b"]);
    }
}
