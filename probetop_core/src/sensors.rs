//! Thermal and fan sensor discovery.
//!
//! A resolver walks an ordered list of sysfs patterns and keeps the first path
//! that yields a number. Once resolved, only that path is read. When nothing
//! matches, further probes wait for the recheck interval so a machine without
//! sensors does not rescan sysfs every tick.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use tracing::{debug, info, warn};

use crate::source::SystemSource;
use crate::types::{FanReading, ThermalReading};

pub const DEFAULT_PWM_MAX: u32 = 255;

/// `base/dir*/file*suffix`, relative to the sysfs root. A `*` stands for a
/// non-empty run of digits; a component without `*` must match exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorPattern {
    base: PathBuf,
    dir: String,
    file: String,
}

impl SensorPattern {
    /// A pattern with fewer than two components never matches anything.
    pub fn parse(pattern: &str) -> Self {
        let mut parts: Vec<&str> = pattern.split('/').filter(|p| !p.is_empty()).collect();
        let file = parts.pop().unwrap_or_default().to_string();
        let dir = parts.pop().unwrap_or_default().to_string();
        Self {
            base: parts.iter().collect(),
            dir,
            file,
        }
    }
}

fn glob_digits(pattern: &str, name: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }
    match pattern.split_once('*') {
        None => pattern == name,
        Some((prefix, suffix)) => {
            name.len() > prefix.len() + suffix.len()
                && name.starts_with(prefix)
                && name.ends_with(suffix)
                && name[prefix.len()..name.len() - suffix.len()]
                    .chars()
                    .all(|c| c.is_ascii_digit())
        }
    }
}

pub static THERMAL_PATTERNS: Lazy<Vec<SensorPattern>> = Lazy::new(|| {
    vec![
        SensorPattern::parse("class/thermal/thermal_zone*/temp"),
        SensorPattern::parse("class/hwmon/hwmon*/temp*_input"),
    ]
});

pub static FAN_SPEED_PATTERNS: Lazy<Vec<SensorPattern>> =
    Lazy::new(|| vec![SensorPattern::parse("class/hwmon/hwmon*/fan*_input")]);

pub static FAN_PWM_PATTERNS: Lazy<Vec<SensorPattern>> =
    Lazy::new(|| vec![SensorPattern::parse("class/hwmon/hwmon*/pwm*")]);

/// sysfs temperatures are millidegrees; anything beyond a plausible Celsius
/// reading is scaled down. Reported in whole degrees.
pub fn normalize_celsius(raw: f64) -> f32 {
    let celsius = if raw.abs() > 200.0 { raw / 1000.0 } else { raw };
    celsius.round() as f32
}

#[derive(Debug)]
pub struct SensorResolver {
    label: &'static str,
    patterns: Vec<SensorPattern>,
    recheck: Duration,
    resolved: Option<PathBuf>,
    next_probe: Option<Instant>,
    probes: u64,
}

impl SensorResolver {
    pub fn new(label: &'static str, patterns: Vec<SensorPattern>, recheck: Duration) -> Self {
        Self {
            label,
            patterns,
            recheck,
            resolved: None,
            next_probe: None,
            probes: 0,
        }
    }

    pub fn probe_count(&self) -> u64 {
        self.probes
    }

    pub fn resolved_path(&self) -> Option<&Path> {
        self.resolved.as_deref()
    }

    /// Current raw value, resolving a sensor first when needed.
    pub fn read(&mut self, src: &dyn SystemSource, now: Instant) -> Option<(PathBuf, f64)> {
        if let Some(path) = self.resolved.clone() {
            match src.read_value(&path) {
                Ok(v) => return Some((path, v)),
                Err(e) => {
                    warn!("{} sensor lost: {e}", self.label);
                    self.resolved = None;
                    // allow an immediate re-probe next tick; the sensor may have been renumbered
                    self.next_probe = None;
                    return None;
                }
            }
        }
        if self.next_probe.is_some_and(|t| now < t) {
            return None;
        }
        match self.probe(src) {
            Some((path, v)) => {
                info!("{} sensor resolved: {}", self.label, path.display());
                self.resolved = Some(path.clone());
                self.next_probe = None;
                Some((path, v))
            }
            None => {
                debug!(
                    "{} sensor: no candidate, next probe in {:?}",
                    self.label, self.recheck
                );
                self.next_probe = Some(now + self.recheck);
                None
            }
        }
    }

    fn probe(&mut self, src: &dyn SystemSource) -> Option<(PathBuf, f64)> {
        self.probes += 1;
        for pat in &self.patterns {
            let base = src.sys_root().join(&pat.base);
            let Ok(dirs) = src.list_dir(&base) else {
                continue;
            };
            for dir in dirs.iter().filter(|d| glob_digits(&pat.dir, d)) {
                let dir_path = base.join(dir);
                let Ok(files) = src.list_dir(&dir_path) else {
                    continue;
                };
                for file in files.iter().filter(|f| glob_digits(&pat.file, f)) {
                    let path = dir_path.join(file);
                    match src.read_value(&path) {
                        Ok(v) => return Some((path, v)),
                        Err(e) => debug!("{} candidate rejected: {e}", self.label),
                    }
                }
            }
        }
        None
    }
}

/// Thermal plus fan resolvers for the CPU category.
#[derive(Debug)]
pub struct Sensors {
    thermal: SensorResolver,
    fan_speed: SensorResolver,
    fan_pwm: SensorResolver,
}

impl Sensors {
    pub fn new(recheck: Duration) -> Self {
        Self::with_patterns(
            THERMAL_PATTERNS.clone(),
            FAN_SPEED_PATTERNS.clone(),
            FAN_PWM_PATTERNS.clone(),
            recheck,
        )
    }

    pub fn with_patterns(
        thermal: Vec<SensorPattern>,
        fan_speed: Vec<SensorPattern>,
        fan_pwm: Vec<SensorPattern>,
        recheck: Duration,
    ) -> Self {
        Self {
            thermal: SensorResolver::new("thermal", thermal, recheck),
            fan_speed: SensorResolver::new("fan", fan_speed, recheck),
            fan_pwm: SensorResolver::new("pwm", fan_pwm, recheck),
        }
    }

    pub fn thermal(&self) -> &SensorResolver {
        &self.thermal
    }

    pub fn read_thermal(&mut self, src: &dyn SystemSource, now: Instant) -> ThermalReading {
        match self.thermal.read(src, now) {
            Some((path, raw)) => ThermalReading {
                celsius: normalize_celsius(raw),
                available: true,
                source: Some(path),
            },
            None => ThermalReading::default(),
        }
    }

    pub fn read_fan(&mut self, src: &dyn SystemSource, now: Instant) -> FanReading {
        let speed = self.fan_speed.read(src, now);
        let pwm = self.fan_pwm.read(src, now);
        if speed.is_none() && pwm.is_none() {
            return FanReading::default();
        }
        let rpm = speed.map(|(_, v)| v.max(0.0) as u32).unwrap_or(0);
        let (pwm, pwm_max) = match pwm {
            Some((path, v)) => {
                let mut max_path = path.into_os_string();
                max_path.push("_max");
                let max = src
                    .read_value(Path::new(&max_path))
                    .ok()
                    .filter(|m| *m > 0.0)
                    .map(|m| m as u32)
                    .unwrap_or(DEFAULT_PWM_MAX);
                (v.max(0.0) as u32, max)
            }
            None => (0, DEFAULT_PWM_MAX),
        };
        FanReading {
            rpm,
            pwm: pwm.min(pwm_max),
            pwm_max,
            active: rpm > 0,
            available: true,
        }
    }
}
