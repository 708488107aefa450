use std::collections::VecDeque;

use crate::stats::median;

/// Fixed-size running median used to suppress per-frame landmark jitter.
#[derive(Debug, Clone)]
pub struct MedianFilter {
    window: VecDeque<f64>,
    capacity: usize,
}

impl MedianFilter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a sample and return the median of the current window.
    pub fn push(&mut self, value: f64) -> f64 {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(value);
        median(self.window.iter().copied()).unwrap_or(value)
    }

    pub fn clear(&mut self) {
        self.window.clear();
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}
