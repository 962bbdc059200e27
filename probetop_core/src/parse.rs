//! Parsers for the kernel's text formats. Pure functions over `&str` so they
//! can be tested without a /proc tree.

use crate::types::{
    CpuTimes, MemorySample, NetDevSample, ProcStat, RawCpuSample, RxCounters, TxCounters,
};

fn parse_u64(tok: &str, what: &str) -> Result<u64, String> {
    tok.parse::<u64>()
        .map_err(|_| format!("{what}: expected integer, got '{tok}'"))
}

fn parse_cpu_line(rest: &str) -> Result<RawCpuSample, String> {
    let mut vals = [0u64; 10];
    let mut n = 0;
    for tok in rest.split_whitespace().take(10) {
        vals[n] = parse_u64(tok, "cpu counter")?;
        n += 1;
    }
    // user nice system idle are present on every kernel; later fields may be absent
    if n < 4 {
        return Err(format!("cpu line has {n} fields"));
    }
    Ok(RawCpuSample {
        user: vals[0],
        nice: vals[1],
        system: vals[2],
        idle: vals[3],
        iowait: vals[4],
        irq: vals[5],
        softirq: vals[6],
        steal: vals[7],
        guest: vals[8],
        guest_nice: vals[9],
    })
}

/// `/proc/stat`: the aggregate `cpu` line plus `cpuN` lines.
pub fn parse_cpu_times(content: &str) -> Result<CpuTimes, String> {
    let mut total = None;
    let mut cores = Vec::new();
    for line in content.lines() {
        let Some(label) = line.split_whitespace().next() else {
            continue;
        };
        if !label.starts_with("cpu") {
            continue;
        }
        let rest = &line[label.len()..];
        if label == "cpu" {
            total = Some(parse_cpu_line(rest)?);
        } else if label[3..].chars().all(|c| c.is_ascii_digit()) {
            cores.push(parse_cpu_line(rest)?);
        }
    }
    let total = total.ok_or_else(|| "no aggregate cpu line".to_string())?;
    Ok(CpuTimes { total, cores })
}

/// `/proc/<pid>/stat`. The comm field may itself contain spaces or parens, so
/// the name spans the first '(' to the last ')', and the remaining fields are
/// positional from there ("state" is field 3).
pub fn parse_pid_stat(content: &str) -> Result<ProcStat, String> {
    let lpar = content.find('(').ok_or("missing '('")?;
    let rpar = content.rfind(')').ok_or("missing ')'")?;
    if rpar < lpar {
        return Err("unbalanced comm".into());
    }
    let pid = content[..lpar]
        .trim()
        .parse::<u32>()
        .map_err(|_| "bad pid".to_string())?;
    let name = content[lpar + 1..rpar].to_string();
    let fields: Vec<&str> = content[rpar + 1..].split_whitespace().collect();
    // field N (1-based, per proc(5)) lives at index N - 3
    let field = |n: usize| -> Result<&str, String> {
        fields
            .get(n - 3)
            .copied()
            .ok_or_else(|| format!("truncated: missing field {n}"))
    };
    let state = field(3)?.chars().next().ok_or("empty state")?;
    Ok(ProcStat {
        pid,
        name,
        state,
        utime: parse_u64(field(14)?, "utime")?,
        stime: parse_u64(field(15)?, "stime")?,
        vsize: parse_u64(field(23)?, "vsize")?,
        rss_pages: field(24)?
            .parse::<i64>()
            .map(|v| v.max(0) as u64)
            .map_err(|_| "rss: expected integer".to_string())?,
    })
}

/// `/proc/meminfo`, values converted from kB to bytes.
pub fn parse_meminfo(content: &str) -> Result<MemorySample, String> {
    let mut total = None;
    let mut available = None;
    let mut free = None;
    let mut swap_total = 0;
    let mut swap_free = 0;
    for line in content.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let Some(num) = rest.split_whitespace().next() else {
            continue;
        };
        let Ok(kb) = num.parse::<u64>() else {
            continue;
        };
        let bytes = kb.saturating_mul(1024);
        match key {
            "MemTotal" => total = Some(bytes),
            "MemAvailable" => available = Some(bytes),
            "MemFree" => free = Some(bytes),
            "SwapTotal" => swap_total = bytes,
            "SwapFree" => swap_free = bytes,
            _ => {}
        }
    }
    let total = total.ok_or("MemTotal missing")?;
    // kernels before 3.14 have no MemAvailable
    let available = available.or(free).ok_or("MemAvailable/MemFree missing")?;
    Ok(MemorySample {
        total,
        available: available.min(total),
        swap_total,
        swap_free: swap_free.min(swap_total),
    })
}

/// `/proc/net/dev`. Rows with fewer than 16 counters are skipped.
pub fn parse_net_dev(content: &str) -> Vec<NetDevSample> {
    let mut out = Vec::new();
    for line in content.lines().skip(2) {
        let Some((name, stats)) = line.split_once(':') else {
            continue;
        };
        let vals: Vec<u64> = stats
            .split_whitespace()
            .map_while(|t| t.parse::<u64>().ok())
            .collect();
        if vals.len() < 16 {
            continue;
        }
        out.push(NetDevSample {
            name: name.trim().to_string(),
            rx: RxCounters {
                bytes: vals[0],
                packets: vals[1],
                errs: vals[2],
                drop: vals[3],
                fifo: vals[4],
                frame: vals[5],
                compressed: vals[6],
                multicast: vals[7],
            },
            tx: TxCounters {
                bytes: vals[8],
                packets: vals[9],
                errs: vals[10],
                drop: vals[11],
                fifo: vals[12],
                colls: vals[13],
                carrier: vals[14],
                compressed: vals[15],
            },
        });
    }
    out
}

/// Single numeric sysfs attribute (temp, fan speed, pwm).
pub fn parse_sensor_value(content: &str) -> Option<f64> {
    content.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
