//! Engine configuration: sampling categories, rates, and environment overrides.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::error::EngineError;

/// Shortest interval any category may tick at.
pub const MIN_INTERVAL: Duration = Duration::from_millis(50);

pub const DEFAULT_HISTORY: usize = 100;
pub const DEFAULT_CLOCK_TICKS: u64 = 100;
pub const DEFAULT_PAGE_SIZE: u64 = 4096;
pub const DEFAULT_SENSOR_RECHECK: Duration = Duration::from_secs(60);

/// Independently scheduled groups of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// CPU usage, thermal and fan share one cadence.
    Cpu,
    Processes,
    Network,
    /// Memory, swap, root disk and host details.
    System,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Cpu,
        Category::Processes,
        Category::Network,
        Category::System,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Category::Cpu => "cpu",
            Category::Processes => "processes",
            Category::Network => "network",
            Category::System => "system",
        }
    }

    fn default_interval(self) -> Duration {
        match self {
            Category::Cpu => Duration::from_millis(500),
            Category::Processes => Duration::from_secs(2),
            Category::Network => Duration::from_secs(1),
            Category::System => Duration::from_secs(2),
        }
    }

    fn env_key(self) -> &'static str {
        match self {
            Category::Cpu => "PROBETOP_CPU_INTERVAL_MS",
            Category::Processes => "PROBETOP_PROCESSES_INTERVAL_MS",
            Category::Network => "PROBETOP_NETWORK_INTERVAL_MS",
            Category::System => "PROBETOP_SYSTEM_INTERVAL_MS",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Category::Cpu),
            "processes" | "procs" | "proc" => Ok(Category::Processes),
            "network" | "net" => Ok(Category::Network),
            "system" | "sys" => Ok(Category::System),
            other => Err(format!("unknown category '{other}'")),
        }
    }
}

/// Sampling rate as either a period or a frequency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rate {
    Interval(Duration),
    PerSecond(f64),
}

impl Rate {
    pub fn to_interval(self, category: Category) -> Result<Duration, EngineError> {
        let invalid = |reason: String| EngineError::InvalidRate { category, reason };
        let interval = match self {
            Rate::Interval(d) => d,
            Rate::PerSecond(hz) => {
                if !hz.is_finite() || hz <= 0.0 {
                    return Err(invalid(format!("{hz} per second")));
                }
                Duration::try_from_secs_f64(1.0 / hz)
                    .map_err(|_| invalid(format!("{hz} per second")))?
            }
        };
        if interval < MIN_INTERVAL {
            return Err(invalid(format!(
                "{}ms is below the {}ms floor",
                interval.as_millis(),
                MIN_INTERVAL.as_millis()
            )));
        }
        Ok(interval)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineConfig {
    pub proc_root: PathBuf,
    pub sys_root: PathBuf,
    pub cpu_interval: Duration,
    pub processes_interval: Duration,
    pub network_interval: Duration,
    pub system_interval: Duration,
    pub history_capacity: usize,
    /// USER_HZ used to normalize per-process jiffies.
    pub clock_ticks_per_second: u64,
    pub page_size: u64,
    /// How long an unresolved sensor waits before the next probe.
    pub sensor_recheck: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            sys_root: PathBuf::from("/sys"),
            cpu_interval: Category::Cpu.default_interval(),
            processes_interval: Category::Processes.default_interval(),
            network_interval: Category::Network.default_interval(),
            system_interval: Category::System.default_interval(),
            history_capacity: DEFAULT_HISTORY,
            clock_ticks_per_second: DEFAULT_CLOCK_TICKS,
            page_size: DEFAULT_PAGE_SIZE,
            sensor_recheck: DEFAULT_SENSOR_RECHECK,
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl EngineConfig {
    /// Defaults with `PROBETOP_*` environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    pub fn with_env(mut self) -> Self {
        for category in Category::ALL {
            if let Some(ms) = env_parse::<u64>(category.env_key()) {
                self.set_interval(category, Duration::from_millis(ms));
            }
        }
        if let Some(v) = env_parse("PROBETOP_HISTORY") {
            self.history_capacity = v;
        }
        if let Some(v) = env_parse("PROBETOP_CLOCK_TICKS") {
            self.clock_ticks_per_second = v;
        }
        if let Some(v) = env_parse("PROBETOP_PAGE_SIZE") {
            self.page_size = v;
        }
        if let Some(ms) = env_parse::<u64>("PROBETOP_SENSOR_RECHECK_MS") {
            self.sensor_recheck = Duration::from_millis(ms);
        }
        if let Some(p) = std::env::var_os("PROBETOP_PROC_ROOT") {
            self.proc_root = PathBuf::from(p);
        }
        if let Some(p) = std::env::var_os("PROBETOP_SYS_ROOT") {
            self.sys_root = PathBuf::from(p);
        }
        self
    }

    pub fn interval(&self, category: Category) -> Duration {
        match category {
            Category::Cpu => self.cpu_interval,
            Category::Processes => self.processes_interval,
            Category::Network => self.network_interval,
            Category::System => self.system_interval,
        }
    }

    pub fn set_interval(&mut self, category: Category, interval: Duration) {
        match category {
            Category::Cpu => self.cpu_interval = interval,
            Category::Processes => self.processes_interval = interval,
            Category::Network => self.network_interval = interval,
            Category::System => self.system_interval = interval,
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.history_capacity == 0 {
            return Err(EngineError::ZeroHistory);
        }
        if self.clock_ticks_per_second == 0 {
            return Err(EngineError::ZeroClockTicks);
        }
        if self.page_size == 0 {
            return Err(EngineError::ZeroPageSize);
        }
        for category in Category::ALL {
            Rate::Interval(self.interval(category)).to_interval(category)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_second_converts_to_interval() {
        let d = Rate::PerSecond(4.0).to_interval(Category::Cpu).unwrap();
        assert_eq!(d, Duration::from_millis(250));
    }

    #[test]
    fn rejects_degenerate_rates() {
        assert!(Rate::PerSecond(0.0).to_interval(Category::Cpu).is_err());
        assert!(Rate::PerSecond(f64::NAN).to_interval(Category::Cpu).is_err());
        assert!(Rate::PerSecond(-2.0).to_interval(Category::Network).is_err());
        assert!(Rate::Interval(Duration::from_millis(10))
            .to_interval(Category::System)
            .is_err());
        assert!(Rate::PerSecond(100.0).to_interval(Category::Cpu).is_err());
        // period too long for a Duration
        assert!(matches!(
            Rate::PerSecond(1e-30).to_interval(Category::Cpu),
            Err(EngineError::InvalidRate { .. })
        ));
    }

    #[test]
    fn defaults_validate() {
        let cfg = EngineConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.history_capacity, 100);
        assert_eq!(cfg.clock_ticks_per_second, 100);
    }

    #[test]
    fn zero_history_rejected() {
        let cfg = EngineConfig {
            history_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(EngineError::ZeroHistory)));
    }

    #[test]
    fn zero_clock_ticks_and_page_size_rejected() {
        let cfg = EngineConfig {
            clock_ticks_per_second: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(EngineError::ZeroClockTicks)));
        let cfg = EngineConfig {
            page_size: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(EngineError::ZeroPageSize)));
    }

    #[test]
    fn category_names_parse_back() {
        for c in Category::ALL {
            assert_eq!(c.name().parse::<Category>().unwrap(), c);
        }
        assert_eq!("net".parse::<Category>().unwrap(), Category::Network);
        assert!("gpu".parse::<Category>().is_err());
    }
}
