//! Deterministic in-memory source shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use probetop_core::error::ReadError;
use probetop_core::types::{
    CpuTimes, DiskUsage, MemorySample, NetDevSample, ProcStat, RawCpuSample, RxCounters,
    SystemInfo, TxCounters,
};
use probetop_core::{Snapshot, SnapshotStore, SystemSource};

/// Every `cpu_times` call advances user and idle by the same amount, so
/// any delta between two consecutive calls is exactly 50%.
#[derive(Default)]
pub struct FakeSource {
    cpu_calls: AtomicU64,
    net_calls: AtomicU64,
}

impl FakeSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn cpu_calls(&self) -> u64 {
        self.cpu_calls.load(Ordering::SeqCst)
    }
}

fn half_busy(step: u64) -> RawCpuSample {
    RawCpuSample {
        user: 100 * step,
        idle: 100 * step,
        ..Default::default()
    }
}

fn gone(path: &Path) -> ReadError {
    ReadError::from_io(path, io::Error::from(io::ErrorKind::NotFound))
}

impl SystemSource for FakeSource {
    fn cpu_times(&self) -> Result<CpuTimes, ReadError> {
        let step = self.cpu_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(CpuTimes {
            total: half_busy(2 * step),
            cores: vec![half_busy(step), half_busy(step)],
        })
    }

    fn pids(&self) -> Result<Vec<u32>, ReadError> {
        Ok(vec![1, 42])
    }

    fn process_stat(&self, pid: u32) -> Result<ProcStat, ReadError> {
        let name = match pid {
            1 => "bash",
            42 => "firefox",
            _ => return Err(ReadError::Vanished(pid)),
        };
        Ok(ProcStat {
            pid,
            name: name.into(),
            state: 'S',
            utime: 10,
            stime: 5,
            vsize: 1 << 20,
            rss_pages: 16,
        })
    }

    fn memory(&self) -> Result<MemorySample, ReadError> {
        Ok(MemorySample {
            total: 8 << 30,
            available: 6 << 30,
            swap_total: 0,
            swap_free: 0,
        })
    }

    fn root_disk(&self) -> Result<DiskUsage, ReadError> {
        Err(gone(Path::new("/")))
    }

    fn net_dev(&self) -> Result<Vec<NetDevSample>, ReadError> {
        let n = self.net_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(vec![NetDevSample {
            name: "eth0".into(),
            rx: RxCounters {
                bytes: 1000 * n,
                ..Default::default()
            },
            tx: TxCounters {
                bytes: 10 * n,
                ..Default::default()
            },
        }])
    }

    fn interface_addrs(&self) -> HashMap<String, Vec<Ipv4Addr>> {
        HashMap::from([("eth0".to_string(), vec![Ipv4Addr::new(10, 0, 0, 2)])])
    }

    fn host_info(&self) -> SystemInfo {
        SystemInfo {
            hostname: Some("fakehost".into()),
            cpu_count: 2,
            ..Default::default()
        }
    }

    fn sys_root(&self) -> &Path {
        Path::new("/nonexistent-sys")
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>, ReadError> {
        Err(gone(path))
    }

    fn read_value(&self, path: &Path) -> Result<f64, ReadError> {
        Err(gone(path))
    }
}

/// Poll the store until `pred` holds, or panic after a few seconds.
pub async fn wait_for<F>(store: &SnapshotStore, what: &str, pred: F) -> Arc<Snapshot>
where
    F: Fn(&Snapshot) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let snap = store.snapshot().await;
        if pred(&snap) {
            return snap;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}; last snapshot seq {}", snap.seq);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// `FakeSource` whose sysfs listing hangs for `delay`, like a wedged hwmon
/// driver. Everything else answers at once.
pub struct SlowSysfs {
    pub inner: Arc<FakeSource>,
    pub delay: Duration,
}

impl SystemSource for SlowSysfs {
    fn cpu_times(&self) -> Result<CpuTimes, ReadError> {
        self.inner.cpu_times()
    }

    fn pids(&self) -> Result<Vec<u32>, ReadError> {
        self.inner.pids()
    }

    fn process_stat(&self, pid: u32) -> Result<ProcStat, ReadError> {
        self.inner.process_stat(pid)
    }

    fn memory(&self) -> Result<MemorySample, ReadError> {
        self.inner.memory()
    }

    fn root_disk(&self) -> Result<DiskUsage, ReadError> {
        self.inner.root_disk()
    }

    fn net_dev(&self) -> Result<Vec<NetDevSample>, ReadError> {
        self.inner.net_dev()
    }

    fn interface_addrs(&self) -> HashMap<String, Vec<Ipv4Addr>> {
        self.inner.interface_addrs()
    }

    fn host_info(&self) -> SystemInfo {
        self.inner.host_info()
    }

    fn sys_root(&self) -> &Path {
        self.inner.sys_root()
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>, ReadError> {
        std::thread::sleep(self.delay);
        self.inner.list_dir(path)
    }

    fn read_value(&self, path: &Path) -> Result<f64, ReadError> {
        self.inner.read_value(path)
    }
}
