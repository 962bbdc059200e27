//! CLI tests for probetop: help text, argument errors, and a short headless run.
use std::fs;
use std::time::Duration;

use assert_cmd::Command;

fn probetop() -> Command {
    Command::cargo_bin("probetop").expect("probetop binary")
}

#[test]
fn help_mentions_rate_and_output_flags() {
    let out = probetop().arg("--help").output().expect("run probetop --help");
    assert!(out.status.success());
    let text = String::from_utf8_lossy(&out.stdout);
    for flag in ["--cpu-ms", "--procs-ms", "--net-ms", "--sys-ms", "--fps", "--frames", "--sort", "--json"] {
        assert!(text.contains(flag), "help text missing {flag}\n{text}");
    }
}

#[test]
fn unknown_argument_fails() {
    let out = probetop().arg("--bogus").output().expect("run probetop");
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Usage:"));
}

#[test]
fn interval_below_floor_is_rejected() {
    let out = probetop()
        .args(["--cpu-ms", "5", "--frames", "1"])
        .timeout(Duration::from_secs(10))
        .output()
        .expect("run probetop");
    assert!(!out.status.success());
}

#[test]
fn json_frames_from_synthetic_proc() {
    let dir = tempfile::tempdir().unwrap();
    let proc_root = dir.path().join("proc");
    fs::create_dir_all(proc_root.join("1")).unwrap();
    fs::write(proc_root.join("stat"), "cpu 10 0 10 80 0 0 0 0 0 0\n").unwrap();
    fs::write(
        proc_root.join("1/stat"),
        "1 (init) S 0 1 1 0 -1 0 0 0 0 0 3 4 0 0 20 0 1 0 10 4096 2 0",
    )
    .unwrap();

    let out = probetop()
        .args(["--frames", "2", "--fps", "20", "--json"])
        .arg("--proc-root")
        .arg(&proc_root)
        .arg("--sys-root")
        .arg(dir.path().join("sys"))
        .env("RUST_LOG", "off")
        .timeout(Duration::from_secs(20))
        .output()
        .expect("run probetop");
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let stdout = String::from_utf8_lossy(&out.stdout);
    let docs: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).expect("one JSON document per line"))
        .collect();
    assert_eq!(docs.len(), 2);
    let seqs: Vec<u64> = docs.iter().map(|d| d["seq"].as_u64().unwrap()).collect();
    assert!(seqs[0] >= 1 && seqs[1] > seqs[0], "{seqs:?}");
    let last = &docs[1];
    assert_eq!(last["thermal"]["available"], false);
    assert_eq!(last["memory"]["available"], false);
    assert_eq!(last["view"]["sort"], "cpu");
}
