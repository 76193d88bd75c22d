//! Bounded latency history.

use std::collections::VecDeque;

/// Weight given to the previously stored value when smoothing.
pub const SMOOTHING_PREVIOUS: f64 = 0.7;

/// Weight given to the new raw sample when smoothing.
pub const SMOOTHING_RAW: f64 = 0.3;

/// Fixed-capacity FIFO of latency values in milliseconds.
///
/// Appending past the cap evicts the oldest entry, so `len() <= cap()`
/// holds after every operation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "RawHistory"))]
pub struct SampleHistory {
    values: VecDeque<f64>,
    cap: usize,
}

/// Wire form of [`SampleHistory`]; excess values are dropped oldest-first
/// on the way in.
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RawHistory {
    values: VecDeque<f64>,
    cap: usize,
}

#[cfg(feature = "serde")]
impl From<RawHistory> for SampleHistory {
    fn from(raw: RawHistory) -> Self {
        let mut values = raw.values;
        while values.len() > raw.cap {
            values.pop_front();
        }
        Self {
            values,
            cap: raw.cap,
        }
    }
}

impl SampleHistory {
    /// Create an empty history holding at most `cap` values.
    pub fn new(cap: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(cap),
            cap,
        }
    }

    /// Append a value as-is, evicting the oldest entry on overflow.
    pub fn push(&mut self, value: f64) {
        if self.cap == 0 {
            return;
        }
        self.values.push_back(value);
        while self.values.len() > self.cap {
            self.values.pop_front();
        }
    }

    /// Append a raw sample smoothed against the last stored value.
    ///
    /// The first sample is stored unsmoothed. Returns the value stored.
    pub fn push_smoothed(&mut self, raw: f64) -> f64 {
        let stored = match self.values.back() {
            Some(previous) => previous * SMOOTHING_PREVIOUS + raw * SMOOTHING_RAW,
            None => raw,
        };
        self.push(stored);
        stored
    }

    /// Replace the contents with `cap` copies of `value`.
    pub fn fill(&mut self, value: f64) {
        self.values.clear();
        self.values.extend(std::iter::repeat(value).take(self.cap));
    }

    /// Most recently stored value.
    pub fn last(&self) -> Option<f64> {
        self.values.back().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    /// Copy the stored values into a Vec, oldest first.
    pub fn to_vec(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_history_is_empty() {
        let h = SampleHistory::new(30);
        assert!(h.is_empty());
        assert_eq!(h.cap(), 30);
        assert_eq!(h.last(), None);
    }

    #[test]
    fn history_caps_at_max_size() {
        let mut h = SampleHistory::new(30);

        for i in 0..45 {
            h.push(i as f64);
        }

        assert_eq!(h.len(), 30);
        // Oldest 15 evicted
        assert_eq!(h.iter().next(), Some(15.0));
        assert_eq!(h.last(), Some(44.0));
    }

    #[test]
    fn first_sample_is_stored_unsmoothed() {
        let mut h = SampleHistory::new(20);
        let stored = h.push_smoothed(42.0);
        assert_eq!(stored, 42.0);
        assert_eq!(h.last(), Some(42.0));
    }

    #[test]
    fn subsequent_samples_are_smoothed_against_last_value() {
        let mut h = SampleHistory::new(20);
        h.push_smoothed(10.0);
        let stored = h.push_smoothed(110.0);

        let expected = 0.7 * 10.0 + 0.3 * 110.0;
        assert!((stored - expected).abs() < 1e-9);
        assert!((h.last().unwrap() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn smoothed_pushes_respect_cap() {
        let mut h = SampleHistory::new(5);
        for _ in 0..12 {
            h.push_smoothed(25.0);
        }
        assert_eq!(h.len(), 5);
    }

    #[test]
    fn fill_repeats_value_to_cap() {
        let mut h = SampleHistory::new(30);
        h.push(99.0);
        h.fill(12.5);

        assert_eq!(h.len(), 30);
        assert!(h.iter().all(|v| v == 12.5));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserialize_enforces_cap() {
        let h: SampleHistory =
            serde_json::from_str(r#"{"values":[1.0,2.0,3.0,4.0,5.0],"cap":3}"#).unwrap();

        assert_eq!(h.len(), 3);
        assert_eq!(h.to_vec(), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn zero_cap_never_stores() {
        let mut h = SampleHistory::new(0);
        h.push(1.0);
        h.push_smoothed(2.0);
        assert!(h.is_empty());
    }
}
