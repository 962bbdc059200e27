//! Bounded history buffers for trend lines.

use std::collections::VecDeque;

use serde::Serialize;

use crate::config::DEFAULT_HISTORY;

pub fn push_capped<T>(dq: &mut VecDeque<T>, v: T, cap: usize) {
    if dq.len() == cap {
        dq.pop_front();
    }
    dq.push_back(v);
}

/// Fixed-capacity ring; pushing into a full buffer drops the oldest value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryBuffer<T> {
    cap: usize,
    values: VecDeque<T>,
}

impl<T: Copy + PartialOrd> HistoryBuffer<T> {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            cap,
            values: VecDeque::with_capacity(cap),
        }
    }

    pub fn push(&mut self, v: T) {
        push_capped(&mut self.values, v, self.cap);
    }

    /// Oldest to newest.
    pub fn values(&self) -> Vec<T> {
        self.values.iter().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.values.iter()
    }

    pub fn latest(&self) -> Option<T> {
        self.values.back().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Min and max of the current contents, for auto-scaling an axis.
    pub fn bounds(&self) -> Option<(T, T)> {
        let mut it = self.values.iter().copied();
        let first = it.next()?;
        Some(it.fold((first, first), |(lo, hi), v| {
            (
                if v < lo { v } else { lo },
                if v > hi { v } else { hi },
            )
        }))
    }
}

impl<T: Copy + PartialOrd> Default for HistoryBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY)
    }
}

/// Y-axis range a consumer should draw a category's trend with.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DisplayScale {
    #[default]
    Auto,
    Fixed { min: f64, max: f64 },
}

impl DisplayScale {
    /// Concrete axis bounds given the buffer's current min/max.
    /// Auto with no data falls back to 0..1; a flat series gets a unit span.
    pub fn resolve(self, bounds: Option<(f64, f64)>) -> (f64, f64) {
        match self {
            DisplayScale::Fixed { min, max } => (min, max),
            DisplayScale::Auto => match bounds {
                None => (0.0, 1.0),
                Some((lo, hi)) if hi - lo < f64::EPSILON => (lo, lo + 1.0),
                Some(b) => b,
            },
        }
    }
}
