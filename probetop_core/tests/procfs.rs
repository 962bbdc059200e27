//! Collectors against synthetic /proc trees.

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use probetop_core::delta::CpuTracker;
use probetop_core::processes::ProcessTableBuilder;
use probetop_core::sampler::{NetworkPipeline, Pipeline, SystemPipeline, Update};
use probetop_core::{LinuxSource, SystemSource};

fn write(root: &Path, rel: &str, body: &str) {
    let p = root.join(rel);
    if let Some(parent) = p.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(p, body).unwrap();
}

fn pid_stat(pid: u32, comm: &str, utime: u64, stime: u64) -> String {
    format!("{pid} ({comm}) R 1 {pid} {pid} 0 -1 4194304 0 0 0 0 {utime} {stime} 0 0 20 0 1 0 100 8192000 250 18446744073709551615")
}

#[test]
fn cpu_usage_from_two_stat_reads() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let src = LinuxSource::new(root, root);
    let mut tracker = CpuTracker::default();

    write(root, "stat", "cpu  100 0 0 900 0 0 0 0 0 0\ncpu0 100 0 0 900 0 0 0 0 0 0\nintr 1 2 3\n");
    let first = tracker.update(src.cpu_times().unwrap());
    assert_eq!(first.total, None);

    write(root, "stat", "cpu  150 0 0 950 0 0 0 0 0 0\ncpu0 150 0 0 950 0 0 0 0 0 0\nintr 1 2 3\n");
    let second = tracker.update(src.cpu_times().unwrap());
    let usage = second.total.unwrap();
    assert!((usage - 50.0).abs() < 1e-4, "got {usage}");
    assert_eq!(second.per_core.len(), 1);

    // counters reset (e.g. after a restore): no data, then fresh baseline
    write(root, "stat", "cpu  10 0 0 20 0 0 0 0 0 0\n");
    assert_eq!(tracker.update(src.cpu_times().unwrap()).total, None);
    write(root, "stat", "cpu  20 0 0 30 0 0 0 0 0 0\n");
    let after = tracker.update(src.cpu_times().unwrap()).total.unwrap();
    assert!((after - 50.0).abs() < 1e-4);
}

#[test]
fn vanished_process_is_dropped_without_error() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "10/stat", &pid_stat(10, "worker (x)", 5, 6));
    write(root, "11/stat", &pid_stat(11, "short lived", 1, 1));
    let src = LinuxSource::new(root, root);
    let mut builder = ProcessTableBuilder::new(100, 4096);

    let t0 = Instant::now();
    let first = builder.scan(&src, t0);
    assert_eq!(first.total, 2);
    assert!(first.rows.iter().all(|r| r.cpu_percent.is_none()));
    let w = first.rows.iter().find(|r| r.pid == 10).unwrap();
    assert_eq!(w.name, "worker (x)");
    assert_eq!(w.rss, 250 * 4096);
    assert_eq!(w.state, 'R');

    fs::remove_dir_all(root.join("11")).unwrap();
    write(root, "10/stat", &pid_stat(10, "worker (x)", 55, 6));
    // listed but exited before its stat could be read
    fs::create_dir_all(root.join("12")).unwrap();

    let second = builder.scan(&src, t0 + Duration::from_secs(1));
    assert!(second.available);
    assert_eq!(second.total, 1);
    assert_eq!(second.skipped, 1);
    assert_eq!(second.rows[0].pid, 10);
    assert_eq!(second.rows[0].cpu_percent, Some(50.0));
    assert_eq!(second.rows[0].cpu_ticks, 61);
}

#[test]
fn reused_pid_slot_starts_without_cpu() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "20/stat", &pid_stat(20, "a", 10, 0));
    let src = LinuxSource::new(root, root);
    let mut builder = ProcessTableBuilder::new(100, 4096);
    let t0 = Instant::now();
    builder.scan(&src, t0);
    // same pid, fewer ticks than before: a different process
    write(root, "20/stat", &pid_stat(20, "b", 1, 0));
    let t = builder.scan(&src, t0 + Duration::from_secs(1));
    assert_eq!(t.rows[0].name, "b");
    assert_eq!(t.rows[0].cpu_percent, None);
}

#[test]
fn missing_proc_root_gives_unavailable_table() {
    let dir = tempfile::tempdir().unwrap();
    let src = LinuxSource::new(dir.path().join("absent"), dir.path());
    let t = ProcessTableBuilder::new(100, 4096).scan(&src, Instant::now());
    assert!(!t.available);
    assert!(t.rows.is_empty());
}

const NET_HEADER: &str = "Inter-|   Receive                                                |  Transmit\n face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed\n";

fn net_dev(rows: &[(&str, u64, u64)]) -> String {
    let mut s = NET_HEADER.to_string();
    for (name, rx, tx) in rows {
        s.push_str(&format!(
            "{name:>6}: {rx} 10 0 0 0 0 0 0 {tx} 5 0 0 0 0 0 0\n"
        ));
    }
    s
}

fn network_rates(update: Update) -> (Vec<(String, Option<f64>)>, Option<f64>) {
    match update {
        Update::Network {
            interfaces,
            rx_rate,
            ..
        } => (
            interfaces.into_iter().map(|i| (i.name, i.rx_rate)).collect(),
            rx_rate,
        ),
        other => panic!("unexpected update {other:?}"),
    }
}

#[test]
fn network_counter_reset_rebaselines_one_interface() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let src = LinuxSource::new(root, root);
    let mut pipe = NetworkPipeline::default();
    let t0 = Instant::now();

    write(root, "net/dev", &net_dev(&[("lo", 500, 500), ("eth0", 1000, 100)]));
    let (_, agg) = network_rates(pipe.sample(&src, t0));
    assert_eq!(agg, None);

    write(root, "net/dev", &net_dev(&[("lo", 9500, 9500), ("eth0", 3000, 300)]));
    let (rows, agg) = network_rates(pipe.sample(&src, t0 + Duration::from_secs(2)));
    assert_eq!(rows[1], ("eth0".to_string(), Some(1000.0)));
    // loopback is listed but left out of the aggregate
    assert_eq!(rows[0], ("lo".to_string(), Some(4500.0)));
    assert_eq!(agg, Some(1000.0));

    // eth0 wrapped/reset; lo keeps counting
    write(root, "net/dev", &net_dev(&[("lo", 10500, 10500), ("eth0", 50, 310)]));
    let (rows, agg) = network_rates(pipe.sample(&src, t0 + Duration::from_secs(3)));
    assert_eq!(rows[1].1, None);
    assert_eq!(agg, None);

    write(root, "net/dev", &net_dev(&[("lo", 10500, 10500), ("eth0", 550, 320)]));
    let (rows, _) = network_rates(pipe.sample(&src, t0 + Duration::from_secs(4)));
    assert_eq!(rows[1].1, Some(500.0));
}

#[test]
fn system_pipeline_reports_meminfo() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "meminfo",
        "MemTotal:       1000 kB\nMemFree:         100 kB\nMemAvailable:    400 kB\nSwapTotal:       200 kB\nSwapFree:         50 kB\n",
    );
    let src = LinuxSource::new(root, root);
    match SystemPipeline.sample(&src, Instant::now()) {
        Update::System { memory, .. } => {
            assert!(memory.available);
            assert_eq!(memory.ram_total, 1000 * 1024);
            assert_eq!(memory.ram_used, 600 * 1024);
            assert!(memory.swap_present);
            assert_eq!(memory.swap_used, 150 * 1024);
        }
        other => panic!("unexpected update {other:?}"),
    }
}
