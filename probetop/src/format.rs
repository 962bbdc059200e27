//! Small text helpers for the summary line.

use probetop_core::{DisplayScale, HistoryBuffer};

pub fn human(b: u64) -> String {
    const K: f64 = 1024.0;
    let b = b as f64;
    if b < K {
        return format!("{b:.0}B");
    }
    let kb = b / K;
    if kb < K {
        return format!("{kb:.1}KB");
    }
    let mb = kb / K;
    if mb < K {
        return format!("{mb:.1}MB");
    }
    let gb = mb / K;
    if gb < K {
        return format!("{gb:.1}GB");
    }
    format!("{:.2}TB", gb / K)
}

pub fn rate(bytes_per_sec: Option<f64>) -> String {
    match bytes_per_sec {
        Some(r) => format!("{}/s", human(r.max(0.0) as u64)),
        None => "-".into(),
    }
}

pub fn percent(p: Option<f32>) -> String {
    p.map(|v| format!("{v:.1}%")).unwrap_or_else(|| "-".into())
}

/// Char-boundary safe; process names can be arbitrary UTF-8.
pub fn truncate_middle(s: &str, max: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max {
        return s.to_string();
    }
    if max <= 3 {
        return "...".into();
    }
    let keep = max - 3;
    let left = keep / 2;
    let right = keep - left;
    let head: String = chars[..left].iter().collect();
    let tail: String = chars[chars.len() - right..].iter().collect();
    format!("{head}...{tail}")
}

const BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Last `width` history values as a one-line sparkline, scaled per `scale`.
pub fn sparkline<T>(hist: &HistoryBuffer<T>, scale: DisplayScale, width: usize) -> String
where
    T: Copy + PartialOrd + Into<f64>,
{
    let bounds: Option<(f64, f64)> = hist.bounds().map(|(lo, hi)| (lo.into(), hi.into()));
    let (lo, hi) = scale.resolve(bounds);
    let span = hi - lo;
    let skip = hist.len().saturating_sub(width);
    hist.iter()
        .skip(skip)
        .map(|v| {
            let x: f64 = (*v).into();
            let f = (x - lo) / span;
            let idx = (f.clamp(0.0, 1.0) * (BARS.len() - 1) as f64).round() as usize;
            BARS[idx]
        })
        .collect()
}
