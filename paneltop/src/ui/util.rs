//! Small UI helpers: human-readable sizes, durations, truncation.

pub fn human_bytes(b: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    const K: f64 = 1024.0;
    if b < 1024 {
        return format!("{b} B");
    }
    let mut v = b as f64 / K;
    let mut unit = UNITS[0];
    for next in &UNITS[1..] {
        if v < K {
            break;
        }
        v /= K;
        unit = next;
    }
    format!("{v:.2} {unit}")
}

/// `"1d 02h 03m 04s"`; the day part is omitted when zero.
pub fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let mins = (secs % 3600) / 60;
    let s = secs % 60;
    if days > 0 {
        format!("{days}d {hours:02}h {mins:02}m {s:02}s")
    } else {
        format!("{hours:02}h {mins:02}m {s:02}s")
    }
}

pub fn truncate_middle(s: &str, max: usize) -> String {
    let n = s.chars().count();
    if n <= max {
        return s.to_string();
    }
    if max <= 3 {
        return "...".into();
    }
    let keep = max - 3;
    let left = keep / 2;
    let right = keep - left;
    let head: String = s.chars().take(left).collect();
    let tail: String = s.chars().skip(n - right).collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes() {
        assert_eq!(human_bytes(0), "0 B");
        assert_eq!(human_bytes(1023), "1023 B");
        assert_eq!(human_bytes(1536), "1.50 KiB");
        assert_eq!(human_bytes(5 * 1024 * 1024), "5.00 MiB");
        assert_eq!(human_bytes(3 * 1024 * 1024 * 1024), "3.00 GiB");
    }

    #[test]
    fn uptime() {
        assert_eq!(format_uptime(59), "00h 00m 59s");
        assert_eq!(format_uptime(90_061), "1d 01h 01m 01s");
    }

    #[test]
    fn truncates_in_the_middle() {
        assert_eq!(truncate_middle("short", 10), "short");
        assert_eq!(truncate_middle("abcdefghij", 7), "ab...ij");
    }
}
