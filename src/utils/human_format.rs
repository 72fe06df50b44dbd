//! Human-readable formatting for sizes and durations in logs and job records

use std::time::Duration;

/// Bytes with an adaptive unit, e.g. `512B`, `1.50KB`, `100.0MB`
pub fn format_memory(bytes: f64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

    if bytes == 0.0 {
        return "0B".to_string();
    }

    let mut size = bytes.abs();
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    let sign = if bytes < 0.0 { "-" } else { "" };
    match (unit, size) {
        (0, _) => format!("{sign}{size:.0}{}", UNITS[unit]),
        (_, s) if s >= 10.0 => format!("{sign}{size:.1}{}", UNITS[unit]),
        _ => format!("{sign}{size:.2}{}", UNITS[unit]),
    }
}

/// Fixed megabyte rendering stored on job records, e.g. `12.34MB`
pub fn format_size_mb(bytes: u64) -> String {
    format!("{:.2}MB", bytes as f64 / 1024.0 / 1024.0)
}

/// Compact duration for log lines: `850ms`, `2.50s`, `1m30s`, `1h1m`
pub fn format_duration(elapsed: Duration) -> String {
    let millis = elapsed.as_millis() as u64;
    if millis < 1000 {
        return format!("{millis}ms");
    }
    if millis < 60_000 {
        let seconds = millis as f64 / 1000.0;
        return if seconds >= 10.0 {
            format!("{seconds:.1}s")
        } else {
            format!("{seconds:.2}s")
        };
    }

    let total = millis / 1000;
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    match (hours, seconds) {
        (0, 0) => format!("{minutes}m"),
        (0, _) => format!("{minutes}m{seconds}s"),
        (_, 0) if minutes == 0 => format!("{hours}h"),
        (_, 0) => format!("{hours}h{minutes}m"),
        _ => format!("{hours}h{minutes}m{seconds}s"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_memory() {
        assert_eq!(format_memory(0.0), "0B");
        assert_eq!(format_memory(512.0), "512B");
        assert_eq!(format_memory(1536.0), "1.50KB");
        assert_eq!(format_memory(1048576.0), "1.00MB");
        assert_eq!(format_memory(104857600.0), "100.0MB");
        assert_eq!(format_memory(-1024.0), "-1.00KB");
    }

    #[test]
    fn test_format_size_mb() {
        assert_eq!(format_size_mb(0), "0.00MB");
        assert_eq!(format_size_mb(1572864), "1.50MB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(0)), "0ms");
        assert_eq!(format_duration(Duration::from_millis(999)), "999ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
        assert_eq!(format_duration(Duration::from_secs(59)), "59.0s");
        assert_eq!(format_duration(Duration::from_secs(60)), "1m");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m30s");
        assert_eq!(format_duration(Duration::from_secs(3600)), "1h");
        assert_eq!(format_duration(Duration::from_secs(3660)), "1h1m");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1h1m1s");
    }
}
