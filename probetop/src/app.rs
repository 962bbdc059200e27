//! App state and main loop: poll the engine at frame rate and print each new
//! snapshot revision once.

use std::io::Write;
use std::time::Duration;

use probetop_core::{Category, Engine, ProcessQuery, Snapshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::format::{human, percent, rate, sparkline, truncate_middle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Summary,
    Json,
}

pub struct App {
    engine: Engine,
    frame: Duration,
    frames: Option<u64>,
    mode: OutputMode,
    last_seq: u64,
    printed: u64,
}

impl App {
    pub fn new(engine: Engine, fps: u32, frames: Option<u64>, mode: OutputMode) -> Self {
        Self {
            engine,
            frame: Duration::from_secs_f64(1.0 / fps.max(1) as f64),
            frames,
            mode,
            last_seq: 0,
            printed: 0,
        }
    }

    pub async fn run<W: Write>(mut self, out: &mut W) -> anyhow::Result<()> {
        let res = self.frame_loop(out).await;
        info!("printed {} snapshot(s)", self.printed);
        self.engine.shutdown().await;
        res
    }

    async fn frame_loop<W: Write>(&mut self, out: &mut W) -> anyhow::Result<()> {
        let mut tick = interval(self.frame);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = tick.tick() => {}
                _ = tokio::signal::ctrl_c() => return Ok(()),
            }
            // a writer holds the lock: show the previous frame a little longer
            let Some(snap) = self.engine.try_snapshot() else {
                debug!("snapshot busy, skipping frame");
                continue;
            };
            // seq 0 is the empty initial snapshot
            if snap.seq == 0 || snap.seq == self.last_seq {
                continue;
            }
            self.last_seq = snap.seq;
            match self.mode {
                OutputMode::Json => {
                    serde_json::to_writer(&mut *out, &*snap)?;
                    writeln!(out)?;
                }
                OutputMode::Summary => writeln!(out, "{}", summary_line(&snap))?,
            }
            out.flush()?;
            self.printed += 1;
            if self.frames.is_some_and(|n| self.printed >= n) {
                return Ok(());
            }
        }
    }
}

/// One line per revision: the figures a dashboard header would show.
pub fn summary_line(s: &Snapshot) -> String {
    let mut parts = vec![format!("#{}", s.seq)];

    let spark = sparkline(&s.cpu.history, s.view.scale(Category::Cpu), 16);
    parts.push(format!("cpu {} {spark}", percent(s.cpu.usage)));
    if s.thermal.available {
        parts.push(format!("temp {:.1}°C", s.thermal.celsius));
    }
    if s.fan.available {
        parts.push(format!("fan {}rpm", s.fan.rpm));
    }

    let m = &s.memory;
    if m.available {
        parts.push(format!("mem {}/{}", human(m.ram_used), human(m.ram_total)));
        if m.swap_present {
            parts.push(format!("swap {}/{}", human(m.swap_used), human(m.swap_total)));
        }
    }
    if m.disk_available {
        parts.push(format!("disk {}/{}", human(m.disk_used), human(m.disk_total)));
    }

    if s.network.available {
        parts.push(format!(
            "net rx {} tx {}",
            rate(s.network.rx_history.latest()),
            rate(s.network.tx_history.latest())
        ));
    }

    if s.processes.available {
        let view = ProcessQuery {
            filter: s.view.filter.clone(),
            sort: s.view.sort,
            ascending: s.view.ascending,
        }
        .view(&s.processes);
        let top = view
            .first()
            .map(|p| {
                format!(
                    " top {}({}) {}",
                    truncate_middle(&p.name, 20),
                    p.pid,
                    percent(p.cpu_percent)
                )
            })
            .unwrap_or_default();
        parts.push(format!("procs {}/{}{top}", view.len(), s.processes.total));
    }

    if !s.paused.is_empty() {
        let names: Vec<&str> = s.paused.iter().map(|c| c.name()).collect();
        parts.push(format!("paused [{}]", names.join(",")));
    }
    parts.join(" | ")
}
