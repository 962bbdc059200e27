//! Delta calculators: turn two cumulative samples into a rate or percentage.
//!
//! Every calculator answers `None` ("no data") rather than dividing by zero or
//! reporting a negative rate. Trackers keep the previous sample for one
//! category and re-baseline on any discontinuity.

use std::collections::HashMap;
use std::time::Instant;

use crate::types::{CpuTimes, NetDevSample, RawCpuSample};

/// `100 * (1 - Δidle / Δtotal)` over all ten counters.
pub fn cpu_usage(prev: &RawCpuSample, cur: &RawCpuSample) -> Option<f32> {
    // any single counter going backwards means a reset, not a negative delta
    if prev
        .fields()
        .iter()
        .zip(cur.fields().iter())
        .any(|(p, c)| c < p)
    {
        return None;
    }
    let d_total = cur.total().checked_sub(prev.total())?;
    if d_total == 0 {
        return None;
    }
    let d_idle = cur.idle - prev.idle;
    let usage = 100.0 * (1.0 - d_idle as f64 / d_total as f64);
    Some(usage.clamp(0.0, 100.0) as f32)
}

/// `100 * Δticks / (Δwall * clock_ticks)`.
pub fn process_cpu(prev_ticks: u64, cur_ticks: u64, dt_secs: f64, clock_ticks: u64) -> Option<f32> {
    if dt_secs.is_nan() || dt_secs <= 0.0 || clock_ticks == 0 {
        return None;
    }
    let d = cur_ticks.checked_sub(prev_ticks)?;
    Some((100.0 * d as f64 / (dt_secs * clock_ticks as f64)) as f32)
}

/// Bytes (or any counter) per second; `None` on decrease or zero elapsed time.
pub fn counter_rate(prev: u64, cur: u64, dt_secs: f64) -> Option<f64> {
    if dt_secs.is_nan() || dt_secs <= 0.0 {
        return None;
    }
    let d = cur.checked_sub(prev)?;
    Some(d as f64 / dt_secs)
}

/// Previous CPU sample for the aggregate and each core.
#[derive(Debug, Default)]
pub struct CpuTracker {
    prev: Option<CpuTimes>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CpuDelta {
    pub total: Option<f32>,
    pub per_core: Vec<Option<f32>>,
}

impl CpuTracker {
    pub fn update(&mut self, cur: CpuTimes) -> CpuDelta {
        let delta = match &self.prev {
            Some(prev) => CpuDelta {
                total: cpu_usage(&prev.total, &cur.total),
                per_core: cur
                    .cores
                    .iter()
                    .enumerate()
                    .map(|(i, c)| prev.cores.get(i).and_then(|p| cpu_usage(p, c)))
                    .collect(),
            },
            None => CpuDelta {
                total: None,
                per_core: vec![None; cur.cores.len()],
            },
        };
        self.prev = Some(cur);
        delta
    }

    pub fn reset(&mut self) {
        self.prev = None;
    }
}

#[derive(Debug, Clone, Copy)]
struct NetBaseline {
    rx: u64,
    tx: u64,
    at: Instant,
}

/// Per-interface byte counters keyed by name; interfaces that disappear
/// are forgotten so a re-added one starts fresh.
#[derive(Debug, Default)]
pub struct NetTracker {
    prev: HashMap<String, NetBaseline>,
}

impl NetTracker {
    /// Returns `(rx_rate, tx_rate)` per sample, in input order.
    pub fn update(&mut self, samples: &[NetDevSample], now: Instant) -> Vec<(Option<f64>, Option<f64>)> {
        let mut next = HashMap::with_capacity(samples.len());
        let rates = samples
            .iter()
            .map(|s| {
                let rate = match self.prev.get(&s.name) {
                    Some(b) => {
                        let dt = now.saturating_duration_since(b.at).as_secs_f64();
                        (
                            counter_rate(b.rx, s.rx.bytes, dt),
                            counter_rate(b.tx, s.tx.bytes, dt),
                        )
                    }
                    None => (None, None),
                };
                next.insert(
                    s.name.clone(),
                    NetBaseline {
                        rx: s.rx.bytes,
                        tx: s.tx.bytes,
                        at: now,
                    },
                );
                rate
            })
            .collect();
        self.prev = next;
        rates
    }

    pub fn reset(&mut self) {
        self.prev.clear();
    }
}
