//! Counter source readers.
//!
//! `SystemSource` is the seam between the engine and the OS: each method reads
//! one source once and returns a typed sample or a `ReadError`. The engine
//! never touches the filesystem directly, so tests can substitute fakes.

use std::collections::HashMap;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sysinfo::{Disks, Networks, System};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::ReadError;
use crate::parse;
use crate::types::{CpuTimes, DiskUsage, MemorySample, NetDevSample, ProcStat, SystemInfo};

pub trait SystemSource: Send + Sync + 'static {
    fn cpu_times(&self) -> Result<CpuTimes, ReadError>;
    fn pids(&self) -> Result<Vec<u32>, ReadError>;
    fn process_stat(&self, pid: u32) -> Result<ProcStat, ReadError>;
    fn memory(&self) -> Result<MemorySample, ReadError>;
    fn root_disk(&self) -> Result<DiskUsage, ReadError>;
    fn net_dev(&self) -> Result<Vec<NetDevSample>, ReadError>;
    fn interface_addrs(&self) -> HashMap<String, Vec<Ipv4Addr>>;
    fn host_info(&self) -> SystemInfo;
    /// Root the sensor resolver's candidate patterns are relative to.
    fn sys_root(&self) -> &Path;
    /// Entry names of a directory.
    fn list_dir(&self, path: &Path) -> Result<Vec<String>, ReadError>;
    /// A single numeric attribute file.
    fn read_value(&self, path: &Path) -> Result<f64, ReadError>;
}

fn read_text(path: &Path) -> Result<String, ReadError> {
    fs::read_to_string(path).map_err(|e| ReadError::from_io(path, e))
}

/// procfs/sysfs reader, with sysinfo for disks, addresses and host details.
pub struct LinuxSource {
    proc_root: PathBuf,
    sys_root: PathBuf,
    // Persistent sysinfo handles
    disks: Mutex<Disks>,
    networks: Mutex<Networks>,
    sys: Mutex<System>,
}

impl LinuxSource {
    pub fn new(proc_root: impl Into<PathBuf>, sys_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
            sys_root: sys_root.into(),
            disks: Mutex::new(Disks::new_with_refreshed_list()),
            networks: Mutex::new(Networks::new_with_refreshed_list()),
            sys: Mutex::new(System::new()),
        }
    }

    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self::new(&cfg.proc_root, &cfg.sys_root)
    }
}

impl SystemSource for LinuxSource {
    fn cpu_times(&self) -> Result<CpuTimes, ReadError> {
        let path = self.proc_root.join("stat");
        let s = read_text(&path)?;
        parse::parse_cpu_times(&s).map_err(|r| ReadError::malformed(&path, r))
    }

    fn pids(&self) -> Result<Vec<u32>, ReadError> {
        let entries =
            fs::read_dir(&self.proc_root).map_err(|e| ReadError::from_io(&self.proc_root, e))?;
        Ok(entries
            .flatten()
            .filter_map(|e| e.file_name().to_str().and_then(|n| n.parse::<u32>().ok()))
            .collect())
    }

    fn process_stat(&self, pid: u32) -> Result<ProcStat, ReadError> {
        let path = self.proc_root.join(pid.to_string()).join("stat");
        let s = match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ReadError::Vanished(pid))
            }
            Err(e) => return Err(ReadError::from_io(&path, e)),
        };
        // An exiting process can leave an empty or half-written record
        if s.trim().is_empty() {
            return Err(ReadError::Vanished(pid));
        }
        parse::parse_pid_stat(&s).map_err(|r| ReadError::malformed(&path, r))
    }

    fn memory(&self) -> Result<MemorySample, ReadError> {
        let path = self.proc_root.join("meminfo");
        let s = read_text(&path)?;
        parse::parse_meminfo(&s).map_err(|r| ReadError::malformed(&path, r))
    }

    fn root_disk(&self) -> Result<DiskUsage, ReadError> {
        let mut disks = self
            .disks
            .lock()
            .map_err(|_| ReadError::malformed("disks", "lock poisoned"))?;
        disks.refresh(true);
        disks
            .list()
            .iter()
            .find(|d| d.mount_point() == Path::new("/"))
            .map(|d| DiskUsage {
                total: d.total_space(),
                available: d.available_space(),
            })
            .ok_or_else(|| {
                ReadError::from_io("/", std::io::Error::from(std::io::ErrorKind::NotFound))
            })
    }

    fn net_dev(&self) -> Result<Vec<NetDevSample>, ReadError> {
        let path = self.proc_root.join("net").join("dev");
        let s = read_text(&path)?;
        let rows = parse::parse_net_dev(&s);
        if rows.is_empty() && !s.trim().is_empty() && s.lines().count() > 2 {
            return Err(ReadError::malformed(&path, "no parseable interface rows"));
        }
        Ok(rows)
    }

    fn interface_addrs(&self) -> HashMap<String, Vec<Ipv4Addr>> {
        let Ok(mut nets) = self.networks.lock() else {
            return HashMap::new();
        };
        nets.refresh(true);
        nets.iter()
            .map(|(name, data)| {
                let v4 = data
                    .ip_networks()
                    .iter()
                    .filter_map(|n| match n.addr {
                        IpAddr::V4(a) => Some(a),
                        IpAddr::V6(_) => None,
                    })
                    .collect();
                (name.to_string(), v4)
            })
            .collect()
    }

    fn host_info(&self) -> SystemInfo {
        let (cpu_model, cpu_count) = match self.sys.lock() {
            Ok(mut sys) => {
                sys.refresh_cpu_list(sysinfo::CpuRefreshKind::nothing());
                let model = sys
                    .cpus()
                    .first()
                    .map(|c| c.brand().trim().to_string())
                    .filter(|b| !b.is_empty());
                (model, sys.cpus().len())
            }
            Err(_) => (None, 0),
        };
        let load = System::load_average();
        SystemInfo {
            hostname: System::host_name(),
            os_name: System::long_os_version(),
            kernel: System::kernel_version(),
            cpu_model,
            cpu_count,
            uptime_secs: System::uptime(),
            load_avg: (load.one, load.five, load.fifteen),
        }
    }

    fn sys_root(&self) -> &Path {
        &self.sys_root
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>, ReadError> {
        let entries = fs::read_dir(path).map_err(|e| ReadError::from_io(path, e))?;
        let mut names: Vec<String> = entries
            .flatten()
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        // read_dir order is arbitrary; probe order must be stable
        names.sort_by(|a, b| natural_cmp(a, b));
        Ok(names)
    }

    fn read_value(&self, path: &Path) -> Result<f64, ReadError> {
        let s = read_text(path)?;
        parse::parse_sensor_value(&s).ok_or_else(|| {
            debug!("non-numeric sensor value at {}", path.display());
            ReadError::malformed(path, "not a number")
        })
    }
}

/// Orders `hwmon2` before `hwmon10`.
pub(crate) fn natural_cmp(a: &str, b: &str) -> std::cmp::Ordering {
    let split = |s: &str| {
        let idx = s
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_ascii_digit())
            .last()
            .map(|(i, _)| i)
            .unwrap_or(s.len());
        let (head, num) = s.split_at(idx);
        (head.to_string(), num.parse::<u64>().ok())
    };
    let (ha, na) = split(a);
    let (hb, nb) = split(b);
    ha.cmp(&hb).then(na.cmp(&nb)).then(a.cmp(b))
}
