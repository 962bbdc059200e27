//! Process table: fresh enumeration each scan, CPU% against the previous scan.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Instant;

use tracing::debug;

use crate::delta::process_cpu;
use crate::error::ReadError;
use crate::source::SystemSource;
use crate::types::{ProcessRecord, ProcessTable, SortColumn};

/// Keeps only what the next scan needs: ticks per pid and when they were read.
#[derive(Debug)]
pub struct ProcessTableBuilder {
    clock_ticks: u64,
    page_size: u64,
    last_ticks: HashMap<u32, u64>,
    last_at: Option<Instant>,
}

impl ProcessTableBuilder {
    pub fn new(clock_ticks: u64, page_size: u64) -> Self {
        Self {
            clock_ticks,
            page_size,
            last_ticks: HashMap::new(),
            last_at: None,
        }
    }

    pub fn reset(&mut self) {
        self.last_ticks.clear();
        self.last_at = None;
    }

    pub fn scan(&mut self, src: &dyn SystemSource, now: Instant) -> ProcessTable {
        let pids = match src.pids() {
            Ok(p) => p,
            Err(e) => {
                debug!("process enumeration failed: {e}");
                self.reset();
                return ProcessTable::default();
            }
        };

        let dt = self
            .last_at
            .map(|t| now.saturating_duration_since(t).as_secs_f64());
        let mut rows = Vec::with_capacity(pids.len());
        let mut ticks = HashMap::with_capacity(pids.len());
        let mut skipped = 0usize;

        for pid in pids {
            let stat = match src.process_stat(pid) {
                Ok(s) => s,
                // exited between listing and read: drop silently this cycle
                Err(ReadError::Vanished(_)) => {
                    skipped += 1;
                    continue;
                }
                Err(e) => {
                    debug!("pid {pid} skipped: {e}");
                    skipped += 1;
                    continue;
                }
            };
            let cpu_ticks = stat.utime.saturating_add(stat.stime);
            let cpu_percent = match (self.last_ticks.get(&pid), dt) {
                (Some(&prev), Some(dt)) => process_cpu(prev, cpu_ticks, dt, self.clock_ticks),
                _ => None,
            };
            ticks.insert(pid, cpu_ticks);
            rows.push(ProcessRecord {
                pid,
                name: stat.name,
                state: stat.state,
                vsize: stat.vsize,
                rss: stat.rss_pages.saturating_mul(self.page_size),
                cpu_ticks,
                cpu_percent,
            });
        }

        self.last_ticks = ticks;
        self.last_at = Some(now);
        ProcessTable {
            total: rows.len(),
            rows,
            skipped,
            available: true,
        }
    }
}

/// Filter and ordering a consumer wants applied to the table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProcessQuery {
    pub filter: String,
    pub sort: SortColumn,
    pub ascending: bool,
}

fn cmp_cpu(a: Option<f32>, b: Option<f32>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

impl ProcessQuery {
    /// Derived view; the table itself is left untouched.
    pub fn view(&self, table: &ProcessTable) -> Vec<ProcessRecord> {
        let needle = self.filter.trim().to_lowercase();
        let mut rows: Vec<ProcessRecord> = table
            .rows
            .iter()
            .filter(|r| needle.is_empty() || r.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        // sort_by is stable: equal keys keep table order in both directions
        rows.sort_by(|a, b| {
            let ord = match self.sort {
                SortColumn::Pid => a.pid.cmp(&b.pid),
                SortColumn::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
                SortColumn::State => a.state.cmp(&b.state),
                SortColumn::Cpu => cmp_cpu(a.cpu_percent, b.cpu_percent),
                SortColumn::Vsize => a.vsize.cmp(&b.vsize),
                SortColumn::Rss => a.rss.cmp(&b.rss),
                SortColumn::Ticks => a.cpu_ticks.cmp(&b.cpu_ticks),
            };
            if self.ascending {
                ord
            } else {
                ord.reverse()
            }
        });
        rows
    }
}
