use std::time::Duration;

use anyhow::{bail, Result};

/// Suffix to seconds multiplier (order matters: longer suffixes first)
const UNITS: &[(&str, f64)] = &[
    ("ms", 0.001),
    ("s", 1.0),
    ("m", 60.0),
    ("h", 3_600.0),
    ("d", 86_400.0),
];

/// Parse duration strings like "90", "90s", "1.5m", "2h", "1d", "500ms".
///
/// A bare number is seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();

    if let Ok(secs) = s.parse::<f64>() {
        return seconds(secs, s);
    }

    for (suffix, multiplier) in UNITS {
        if let Some(val_str) = s.strip_suffix(suffix) {
            let val: f64 = val_str.trim().parse()?;
            return seconds(val * multiplier, s);
        }
    }

    bail!("Unknown duration format: {}", s)
}

fn seconds(secs: f64, original: &str) -> Result<Duration> {
    if !secs.is_finite() || secs < 0.0 {
        bail!("Duration must be a non-negative number: {}", original);
    }
    Ok(Duration::from_secs_f64(secs))
}

/// Format a backlog delay for display, e.g. "45s", "12m 05s", "2h 00m", "3d 04h".
pub fn format_delay(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.round() as u64
    } else {
        0
    };

    if total < 60 {
        format!("{}s", total)
    } else if total < 3_600 {
        format!("{}m {:02}s", total / 60, total % 60)
    } else if total < 86_400 {
        format!("{}h {:02}m", total / 3_600, (total % 3_600) / 60)
    } else {
        format!("{}d {:02}h", total / 86_400, (total % 86_400) / 3_600)
    }
}

/// Format a configuration duration, e.g. "1800s".
pub fn format_duration(d: Duration) -> String {
    if d.subsec_nanos() == 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{:.3}s", d.as_secs_f64())
    }
}
