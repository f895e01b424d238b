//! Windowed median smoothing
//!
//! Ultrasonic readings are spiky: a single stray echo can jump a reading by
//! an order of magnitude. A small median window rejects those outliers
//! without the lag a mean filter would add.

use std::collections::VecDeque;

/// Fixed-window median filter over raw distance samples.
///
/// Emits nothing until the window is full; from then on every push yields
/// the median of the most recent `window` samples. The median is the element
/// at index `window / 2` of a sorted snapshot, which for an even window is
/// the upper-middle element rather than an average of the two central ones.
/// Each push re-sorts the snapshot; the window is expected to stay small.
pub struct MedianFilter {
    window: usize,
    samples: VecDeque<f64>,
}

impl MedianFilter {
    /// Create a filter over the most recent `window` samples (minimum 1).
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            samples: VecDeque::with_capacity(window + 1),
        }
    }

    /// Window size this filter smooths over.
    pub fn window(&self) -> usize {
        self.window
    }

    /// Append a sample; returns the current median once the window is full.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        self.samples.push_back(value);
        if self.samples.len() > self.window {
            self.samples.pop_front();
        }
        if self.samples.len() < self.window {
            return None;
        }
        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        Some(sorted[sorted.len() / 2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_output_until_window_full() {
        let mut filter = MedianFilter::new(5);
        for v in [1.0, 2.0, 3.0, 4.0] {
            assert_eq!(filter.push(v), None);
        }
        assert_eq!(filter.push(5.0), Some(3.0));
    }

    #[test]
    fn fifth_push_yields_third_smallest() {
        let mut filter = MedianFilter::new(5);
        for v in [9.0, 1.0, 7.0, 3.0] {
            filter.push(v);
        }
        // Sorted: [1, 3, 5, 7, 9] → median 5.
        assert_eq!(filter.push(5.0), Some(5.0));
    }

    #[test]
    fn window_slides_over_old_samples() {
        let mut filter = MedianFilter::new(5);
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            filter.push(v);
        }
        // Window is now [2, 3, 4, 5, 100]: the spike does not win.
        assert_eq!(filter.push(100.0), Some(4.0));
        // Window [3, 4, 5, 100, 100].
        assert_eq!(filter.push(100.0), Some(5.0));
    }

    #[test]
    fn even_window_takes_upper_middle() {
        let mut filter = MedianFilter::new(4);
        for v in [1.0, 2.0, 3.0] {
            assert_eq!(filter.push(v), None);
        }
        // Sorted: [1, 2, 3, 4] → index 2 → 3, not 2.5.
        assert_eq!(filter.push(4.0), Some(3.0));
    }

    #[test]
    fn window_of_one_passes_through() {
        let mut filter = MedianFilter::new(1);
        assert_eq!(filter.push(7.5), Some(7.5));
        assert_eq!(filter.push(2.5), Some(2.5));
    }
}
