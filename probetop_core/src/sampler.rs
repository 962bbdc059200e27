//! Background samplers: one task per category, each reading its sources,
//! computing deltas against its own previous sample, and publishing the result
//! into the snapshot store.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::{Category, EngineConfig};
use crate::delta::{CpuDelta, CpuTracker, NetTracker};
use crate::processes::ProcessTableBuilder;
use crate::sensors::Sensors;
use crate::source::SystemSource;
use crate::state::SnapshotStore;
use crate::types::{
    FanReading, InterfaceStats, MemoryInfo, ProcessTable, Snapshot, SystemInfo, ThermalReading,
};

/// Result of one tick, applied to the snapshot under the store's write lock.
#[derive(Debug, Clone)]
pub enum Update {
    Cpu(CpuDelta),
    Sensors {
        thermal: ThermalReading,
        fan: FanReading,
    },
    Processes(ProcessTable),
    Network {
        available: bool,
        interfaces: Vec<InterfaceStats>,
        rx_rate: Option<f64>,
        tx_rate: Option<f64>,
    },
    System {
        memory: MemoryInfo,
        info: SystemInfo,
    },
}

impl Update {
    /// Current value and history of a category change together.
    pub fn apply(self, snap: &mut Snapshot) {
        match self {
            Update::Cpu(delta) => {
                snap.cpu.usage = delta.total;
                snap.cpu.per_core = delta.per_core;
                if let Some(u) = delta.total {
                    snap.cpu.history.push(u);
                }
            }
            Update::Sensors { thermal, fan } => {
                if thermal.available {
                    snap.thermal_history.push(thermal.celsius);
                } else if snap.thermal.available {
                    // stale trend would outlive the sensor
                    snap.thermal_history.clear();
                }
                snap.thermal = thermal;
                if fan.available {
                    snap.fan_history.push(fan.rpm);
                } else if snap.fan.available {
                    snap.fan_history.clear();
                }
                snap.fan = fan;
            }
            Update::Processes(table) => snap.processes = table,
            Update::Network {
                available,
                interfaces,
                rx_rate,
                tx_rate,
            } => {
                snap.network.available = available;
                snap.network.interfaces = interfaces;
                if let (Some(rx), Some(tx)) = (rx_rate, tx_rate) {
                    snap.network.rx_history.push(rx);
                    snap.network.tx_history.push(tx);
                }
            }
            Update::System { memory, info } => {
                snap.memory = memory;
                snap.system = info;
            }
        }
    }
}

/// Per-category state carried between ticks. `sample` runs on a blocking
/// thread and may do slow I/O; `reset` forgets every previous sample.
pub trait Pipeline: Send + 'static {
    fn category(&self) -> Category;
    /// Name used in log lines; several pipelines may share a category.
    fn label(&self) -> &'static str {
        self.category().name()
    }
    fn sample(&mut self, src: &dyn SystemSource, now: Instant) -> Update;
    fn reset(&mut self);
}

#[derive(Default)]
pub struct CpuPipeline {
    tracker: CpuTracker,
}

impl Pipeline for CpuPipeline {
    fn category(&self) -> Category {
        Category::Cpu
    }

    fn sample(&mut self, src: &dyn SystemSource, _now: Instant) -> Update {
        let delta = match src.cpu_times() {
            Ok(times) => self.tracker.update(times),
            Err(e) => {
                debug!("cpu counters unavailable: {e}");
                CpuDelta {
                    total: None,
                    per_core: Vec::new(),
                }
            }
        };
        Update::Cpu(delta)
    }

    fn reset(&mut self) {
        self.tracker.reset();
    }
}

/// Thermal and fan readings. Runs on the CPU cadence but in its own task,
/// so a sysfs read that hangs never holds back CPU figures.
pub struct SensorPipeline {
    sensors: Sensors,
}

impl SensorPipeline {
    pub fn new(sensors: Sensors) -> Self {
        Self { sensors }
    }
}

impl Pipeline for SensorPipeline {
    fn category(&self) -> Category {
        Category::Cpu
    }

    fn label(&self) -> &'static str {
        "sensors"
    }

    fn sample(&mut self, src: &dyn SystemSource, now: Instant) -> Update {
        Update::Sensors {
            thermal: self.sensors.read_thermal(src, now),
            fan: self.sensors.read_fan(src, now),
        }
    }

    // readings are absolute; resolver back-off survives a pause
    fn reset(&mut self) {}
}

pub struct ProcessPipeline {
    builder: ProcessTableBuilder,
}

impl ProcessPipeline {
    pub fn new(clock_ticks: u64, page_size: u64) -> Self {
        Self {
            builder: ProcessTableBuilder::new(clock_ticks, page_size),
        }
    }
}

impl Pipeline for ProcessPipeline {
    fn category(&self) -> Category {
        Category::Processes
    }

    fn sample(&mut self, src: &dyn SystemSource, now: Instant) -> Update {
        Update::Processes(self.builder.scan(src, now))
    }

    fn reset(&mut self) {
        self.builder.reset();
    }
}

#[derive(Default)]
pub struct NetworkPipeline {
    tracker: NetTracker,
}

fn sum_rates(rates: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    rates.flatten().fold(None, |acc, r| Some(acc.unwrap_or(0.0) + r))
}

impl Pipeline for NetworkPipeline {
    fn category(&self) -> Category {
        Category::Network
    }

    fn sample(&mut self, src: &dyn SystemSource, now: Instant) -> Update {
        let rows = match src.net_dev() {
            Ok(rows) => rows,
            Err(e) => {
                debug!("network counters unavailable: {e}");
                return Update::Network {
                    available: false,
                    interfaces: Vec::new(),
                    rx_rate: None,
                    tx_rate: None,
                };
            }
        };
        let rates = self.tracker.update(&rows, now);
        let mut addrs = src.interface_addrs();
        let interfaces: Vec<InterfaceStats> = rows
            .into_iter()
            .zip(rates)
            .map(|(row, (rx_rate, tx_rate))| InterfaceStats {
                ipv4: addrs.remove(&row.name).unwrap_or_default(),
                name: row.name,
                rx: row.rx,
                tx: row.tx,
                rx_rate,
                tx_rate,
            })
            .collect();
        // loopback traffic never leaves the host; keep it out of the trend
        let external = || interfaces.iter().filter(|i| i.name != "lo");
        Update::Network {
            available: true,
            rx_rate: sum_rates(external().map(|i| i.rx_rate)),
            tx_rate: sum_rates(external().map(|i| i.tx_rate)),
            interfaces,
        }
    }

    fn reset(&mut self) {
        self.tracker.reset();
    }
}

/// Memory, swap, root disk and host details. Nothing here is a delta.
#[derive(Default)]
pub struct SystemPipeline;

impl Pipeline for SystemPipeline {
    fn category(&self) -> Category {
        Category::System
    }

    fn sample(&mut self, src: &dyn SystemSource, _now: Instant) -> Update {
        let mut memory = MemoryInfo::default();
        match src.memory() {
            Ok(m) => {
                memory.available = true;
                memory.ram_total = m.total;
                memory.ram_available = m.available;
                memory.ram_used = m.total.saturating_sub(m.available);
                memory.swap_present = m.swap_total > 0;
                memory.swap_total = m.swap_total;
                memory.swap_used = m.swap_total.saturating_sub(m.swap_free);
            }
            Err(e) => debug!("memory figures unavailable: {e}"),
        }
        match src.root_disk() {
            Ok(d) => {
                memory.disk_available = true;
                memory.disk_total = d.total;
                memory.disk_used = d.total.saturating_sub(d.available);
            }
            Err(e) => debug!("root filesystem unavailable: {e}"),
        }
        Update::System {
            memory,
            info: src.host_info(),
        }
    }

    fn reset(&mut self) {}
}

/// Timer state for one category, pushed through a watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub interval: Duration,
    pub paused: bool,
}

fn ticker(period: Duration) -> Interval {
    let mut t = interval(period);
    t.set_missed_tick_behavior(MissedTickBehavior::Skip);
    t
}

/// Pipelines for every category, built from the engine config.
pub fn default_pipelines(cfg: &EngineConfig) -> Vec<Box<dyn Pipeline>> {
    vec![
        Box::new(CpuPipeline::default()),
        Box::new(SensorPipeline::new(Sensors::new(cfg.sensor_recheck))),
        Box::new(ProcessPipeline::new(
            cfg.clock_ticks_per_second,
            cfg.page_size,
        )),
        Box::new(NetworkPipeline::default()),
        Box::new(SystemPipeline),
    ]
}

impl Pipeline for Box<dyn Pipeline> {
    fn category(&self) -> Category {
        (**self).category()
    }

    fn label(&self) -> &'static str {
        (**self).label()
    }

    fn sample(&mut self, src: &dyn SystemSource, now: Instant) -> Update {
        (**self).sample(src, now)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// Run `pipeline` on its own cadence until shutdown. Reads happen on a
/// blocking thread so a stuck sysfs read only delays this pipeline. A sample
/// that completes after its category was paused is dropped.
pub fn spawn_category_sampler<P: Pipeline>(
    mut pipeline: P,
    source: Arc<dyn SystemSource>,
    store: SnapshotStore,
    mut control: watch::Receiver<Cadence>,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let category = pipeline.label();
        let mut cadence = *control.borrow_and_update();
        let mut tick = ticker(cadence.interval);
        debug!("{category} sampler started every {:?}", cadence.interval);

        loop {
            tokio::select! {
                _ = tick.tick(), if !cadence.paused => {
                    let src = Arc::clone(&source);
                    let joined = tokio::task::spawn_blocking(move || {
                        let update = pipeline.sample(&*src, Instant::now());
                        (pipeline, update)
                    })
                    .await;
                    match joined {
                        Ok((p, update)) => {
                            pipeline = p;
                            let paused = control.borrow().paused;
                            if paused {
                                debug!("{category} paused mid-sample, update dropped");
                            } else {
                                store.publish(|snap| update.apply(snap)).await;
                            }
                        }
                        Err(e) => {
                            warn!("{category} sampler stopped: {e}");
                            break;
                        }
                    }
                }
                changed = control.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let next = *control.borrow_and_update();
                    let resumed = cadence.paused && !next.paused;
                    if resumed {
                        // deltas restart from scratch rather than spanning the pause
                        pipeline.reset();
                    }
                    if resumed || next.interval != cadence.interval {
                        tick = ticker(next.interval);
                    }
                    if next.paused && !cadence.paused {
                        info!("{category} sampling paused");
                    } else if resumed {
                        info!("{category} sampling resumed every {:?}", next.interval);
                    } else if next.interval != cadence.interval {
                        info!("{category} interval now {:?}", next.interval);
                    }
                    cadence = next;
                }
                _ = shutdown.recv() => break,
            }
        }
        debug!("{category} sampler exited");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu_update(total: Option<f32>) -> Update {
        Update::Cpu(CpuDelta {
            total,
            per_core: vec![],
        })
    }

    fn sensor_update(thermal: bool, fan_rpm: Option<u32>) -> Update {
        Update::Sensors {
            thermal: ThermalReading {
                celsius: 40.0,
                available: thermal,
                source: None,
            },
            fan: match fan_rpm {
                Some(rpm) => FanReading {
                    rpm,
                    pwm: 0,
                    pwm_max: 255,
                    active: rpm > 0,
                    available: true,
                },
                None => FanReading::default(),
            },
        }
    }

    #[test]
    fn no_data_leaves_a_gap_in_history() {
        let mut snap = Snapshot::new(10);
        cpu_update(Some(10.0)).apply(&mut snap);
        cpu_update(None).apply(&mut snap);
        cpu_update(Some(30.0)).apply(&mut snap);
        assert_eq!(snap.cpu.history.values(), vec![10.0, 30.0]);
        assert_eq!(snap.cpu.usage, Some(30.0));
    }

    #[test]
    fn sensor_loss_clears_its_history() {
        let mut snap = Snapshot::new(10);
        sensor_update(true, Some(1200)).apply(&mut snap);
        sensor_update(true, Some(1300)).apply(&mut snap);
        assert_eq!(snap.thermal_history.len(), 2);
        assert_eq!(snap.fan_history.values(), vec![1200, 1300]);
        // cpu figures leave sensor state alone
        cpu_update(Some(5.0)).apply(&mut snap);
        assert!(snap.thermal.available);
        sensor_update(false, None).apply(&mut snap);
        assert!(!snap.thermal.available);
        assert!(snap.thermal_history.is_empty());
        assert!(!snap.fan.available);
        assert!(snap.fan_history.is_empty());
    }

    #[test]
    fn network_history_needs_both_directions() {
        let mut snap = Snapshot::new(10);
        Update::Network {
            available: true,
            interfaces: vec![],
            rx_rate: None,
            tx_rate: None,
        }
        .apply(&mut snap);
        Update::Network {
            available: true,
            interfaces: vec![],
            rx_rate: Some(5.0),
            tx_rate: Some(1.0),
        }
        .apply(&mut snap);
        assert_eq!(snap.network.rx_history.values(), vec![5.0]);
        assert_eq!(snap.network.tx_history.values(), vec![1.0]);
    }

    #[test]
    fn sum_rates_skips_missing() {
        assert_eq!(sum_rates(vec![None, None].into_iter()), None);
        assert_eq!(sum_rates(vec![Some(1.0), None, Some(2.5)].into_iter()), Some(3.5));
    }

    /// Blocks inside `sample` until the test releases it.
    struct Gated {
        started: tokio::sync::mpsc::UnboundedSender<()>,
        release: std::sync::mpsc::Receiver<()>,
    }

    impl Pipeline for Gated {
        fn category(&self) -> Category {
            Category::System
        }

        fn sample(&mut self, _src: &dyn SystemSource, _now: Instant) -> Update {
            let _ = self.started.send(());
            let _ = self.release.recv();
            Update::System {
                memory: MemoryInfo::default(),
                info: SystemInfo::default(),
            }
        }

        fn reset(&mut self) {}
    }

    #[tokio::test]
    async fn pause_during_sample_drops_its_update() {
        let (started_tx, mut started_rx) = tokio::sync::mpsc::unbounded_channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let store = SnapshotStore::new(10);
        let (ctl_tx, ctl_rx) = watch::channel(Cadence {
            interval: Duration::from_secs(60),
            paused: false,
        });
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let src: Arc<dyn SystemSource> =
            Arc::new(crate::source::LinuxSource::new("/nonexistent", "/nonexistent"));
        let handle = spawn_category_sampler(
            Gated {
                started: started_tx,
                release: release_rx,
            },
            src,
            store.clone(),
            ctl_rx,
            shutdown_rx,
        );

        started_rx.recv().await.unwrap();
        ctl_tx.send_modify(|c| c.paused = true);
        release_tx.send(()).unwrap();
        // shutdown is only seen once the in-flight sample has been handled
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(store.seq().await, 0);
    }
}
