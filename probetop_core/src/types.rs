//! Data model published by the engine.
//! Every "unavailable" state is a flag or an `Option`, never a magic number.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use serde::Serialize;

use crate::config::Category;
use crate::history::{DisplayScale, HistoryBuffer};

/// Cumulative CPU time counters (USER_HZ ticks since boot).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RawCpuSample {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
    pub guest: u64,
    pub guest_nice: u64,
}

impl RawCpuSample {
    pub fn fields(&self) -> [u64; 10] {
        [
            self.user,
            self.nice,
            self.system,
            self.idle,
            self.iowait,
            self.irq,
            self.softirq,
            self.steal,
            self.guest,
            self.guest_nice,
        ]
    }

    pub fn total(&self) -> u64 {
        self.fields().iter().fold(0u64, |acc, v| acc.saturating_add(*v))
    }
}

/// Aggregate counters plus one sample per logical core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CpuTimes {
    pub total: RawCpuSample,
    pub cores: Vec<RawCpuSample>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CpuStats {
    pub usage: Option<f32>,
    pub per_core: Vec<Option<f32>>,
    pub history: HistoryBuffer<f32>,
}

impl CpuStats {
    pub fn new(cap: usize) -> Self {
        Self {
            usage: None,
            per_core: Vec::new(),
            history: HistoryBuffer::new(cap),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ThermalReading {
    pub celsius: f32,
    pub available: bool,
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FanReading {
    pub rpm: u32,
    pub pwm: u32,
    pub pwm_max: u32,
    pub active: bool,
    pub available: bool,
}

/// Raw /proc/meminfo figures, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemorySample {
    pub total: u64,
    pub available: u64,
    pub swap_total: u64,
    pub swap_free: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiskUsage {
    pub total: u64,
    pub available: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemoryInfo {
    pub available: bool,
    pub ram_total: u64,
    pub ram_available: u64,
    pub ram_used: u64,
    pub swap_present: bool,
    pub swap_total: u64,
    pub swap_used: u64,
    pub disk_available: bool,
    pub disk_total: u64,
    pub disk_used: u64,
}

/// Fields taken from one /proc/<pid>/stat record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcStat {
    pub pid: u32,
    pub name: String,
    pub state: char,
    pub utime: u64,
    pub stime: u64,
    pub vsize: u64,
    pub rss_pages: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: String,
    pub state: char,
    pub vsize: u64,
    pub rss: u64,
    pub cpu_ticks: u64,
    /// `None` on the first scan that sees this pid.
    pub cpu_percent: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessTable {
    pub rows: Vec<ProcessRecord>,
    pub total: usize,
    /// Pids listed but gone before their stat could be read.
    pub skipped: usize,
    pub available: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RxCounters {
    pub bytes: u64,
    pub packets: u64,
    pub errs: u64,
    pub drop: u64,
    pub fifo: u64,
    pub frame: u64,
    pub compressed: u64,
    pub multicast: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TxCounters {
    pub bytes: u64,
    pub packets: u64,
    pub errs: u64,
    pub drop: u64,
    pub fifo: u64,
    pub colls: u64,
    pub carrier: u64,
    pub compressed: u64,
}

/// One row of /proc/net/dev.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetDevSample {
    pub name: String,
    pub rx: RxCounters,
    pub tx: TxCounters,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterfaceStats {
    pub name: String,
    pub rx: RxCounters,
    pub tx: TxCounters,
    pub ipv4: Vec<Ipv4Addr>,
    pub rx_rate: Option<f64>,
    pub tx_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkStats {
    pub available: bool,
    pub interfaces: Vec<InterfaceStats>,
    /// Aggregate bytes/sec across interfaces.
    pub rx_history: HistoryBuffer<f64>,
    pub tx_history: HistoryBuffer<f64>,
}

impl NetworkStats {
    pub fn new(cap: usize) -> Self {
        Self {
            available: false,
            interfaces: Vec::new(),
            rx_history: HistoryBuffer::new(cap),
            tx_history: HistoryBuffer::new(cap),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SystemInfo {
    pub hostname: Option<String>,
    pub os_name: Option<String>,
    pub kernel: Option<String>,
    pub cpu_model: Option<String>,
    pub cpu_count: usize,
    pub uptime_secs: u64,
    pub load_avg: (f64, f64, f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    Pid,
    Name,
    State,
    #[default]
    Cpu,
    Vsize,
    Rss,
    Ticks,
}

impl std::str::FromStr for SortColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pid" => Ok(SortColumn::Pid),
            "name" => Ok(SortColumn::Name),
            "state" => Ok(SortColumn::State),
            "cpu" => Ok(SortColumn::Cpu),
            "vsize" | "virt" => Ok(SortColumn::Vsize),
            "rss" | "mem" | "res" => Ok(SortColumn::Rss),
            "ticks" | "time" => Ok(SortColumn::Ticks),
            other => Err(format!("unknown sort column '{other}'")),
        }
    }
}

/// Consumer-facing presentation knobs. Stored in the snapshot so a change
/// produces a new revision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewSettings {
    pub filter: String,
    pub sort: SortColumn,
    pub ascending: bool,
    pub scales: Vec<(Category, DisplayScale)>,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            filter: String::new(),
            sort: SortColumn::Cpu,
            ascending: false,
            scales: Category::ALL
                .iter()
                .map(|c| (*c, DisplayScale::Auto))
                .collect(),
        }
    }
}

impl ViewSettings {
    pub fn scale(&self, category: Category) -> DisplayScale {
        self.scales
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, s)| *s)
            .unwrap_or_default()
    }

    pub fn set_scale(&mut self, category: Category, scale: DisplayScale) {
        match self.scales.iter_mut().find(|(c, _)| *c == category) {
            Some(slot) => slot.1 = scale,
            None => self.scales.push((category, scale)),
        }
    }
}

/// Everything a consumer needs for one frame.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    /// Bumped on every publish; equal values mean identical content.
    pub seq: u64,
    pub updated_at_ms: i64,
    pub cpu: CpuStats,
    pub thermal: ThermalReading,
    pub thermal_history: HistoryBuffer<f32>,
    pub fan: FanReading,
    pub fan_history: HistoryBuffer<u32>,
    pub memory: MemoryInfo,
    pub processes: ProcessTable,
    pub network: NetworkStats,
    pub system: SystemInfo,
    pub view: ViewSettings,
    pub paused: Vec<Category>,
}

impl Snapshot {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            seq: 0,
            updated_at_ms: 0,
            cpu: CpuStats::new(history_capacity),
            thermal: ThermalReading::default(),
            thermal_history: HistoryBuffer::new(history_capacity),
            fan: FanReading::default(),
            fan_history: HistoryBuffer::new(history_capacity),
            memory: MemoryInfo::default(),
            processes: ProcessTable::default(),
            network: NetworkStats::new(history_capacity),
            system: SystemInfo::default(),
            view: ViewSettings::default(),
            paused: Vec::new(),
        }
    }

    pub fn is_paused(&self, category: Category) -> bool {
        self.paused.contains(&category)
    }
}
