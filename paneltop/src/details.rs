//! Server details blocks: resource limits, alarm thresholds and the text each
//! block shows for the current status.

use serde::{Deserialize, Serialize};

use crate::stats::PointInTimeStats;
use crate::types::PowerStatus;
use crate::ui::util::{format_uptime, human_bytes};

const MIB: u64 = 1024 * 1024;

/// Resource limits of the server. `None` (or 0) means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Limits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_mib: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_mib: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    #[default]
    Normal,
    Warning,
    Critical,
}

pub fn severity(value: f64, max: Option<f64>) -> Severity {
    let ratio = match max {
        Some(m) if m > 0.0 => value / m,
        _ => 0.0,
    };
    if ratio > 0.9 {
        Severity::Critical
    } else if ratio > 0.8 {
        Severity::Warning
    } else {
        Severity::Normal
    }
}

pub fn uptime_severity(status: Option<PowerStatus>) -> Severity {
    match status {
        Some(PowerStatus::Running) => Severity::Normal,
        Some(PowerStatus::Offline) => Severity::Critical,
        _ => Severity::Warning,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatBlock {
    pub title: &'static str,
    pub value: String,
    /// `"/ 100%"` style suffix; `None` for blocks without a limit.
    pub limit: Option<String>,
    pub severity: Severity,
}

fn limit_text(limit: Option<String>) -> Option<String> {
    Some(format!("/ {}", limit.unwrap_or_else(|| "∞".into())))
}

fn capitalize(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        Some(f) => f.to_uppercase().chain(c).collect(),
        None => String::new(),
    }
}

/// Build the seven details blocks, in display order.
pub fn blocks(
    address: &str,
    status: Option<PowerStatus>,
    stats: &PointInTimeStats,
    limits: &Limits,
) -> Vec<StatBlock> {
    let offline = status == Some(PowerStatus::Offline);
    let or_offline = |v: String| if offline { "Offline".to_string() } else { v };

    let uptime = match status {
        None => "Offline".to_string(),
        Some(_) if stats.uptime_ms > 0 => format_uptime(stats.uptime_ms / 1000),
        Some(s) => capitalize(s.as_str()),
    };

    let cpu_limit = limits.cpu.filter(|c| *c > 0.0).map(|c| format!("{c}%"));
    let mem_limit = limits
        .memory_mib
        .filter(|m| *m > 0)
        .map(|m| human_bytes(m.saturating_mul(MIB)));
    let disk_limit = limits
        .disk_mib
        .filter(|d| *d > 0)
        .map(|d| human_bytes(d.saturating_mul(MIB)));

    vec![
        StatBlock {
            title: "Address",
            value: address.to_string(),
            limit: None,
            severity: Severity::Normal,
        },
        StatBlock {
            title: "Uptime",
            value: uptime,
            limit: None,
            severity: uptime_severity(status),
        },
        StatBlock {
            title: "CPU Load",
            value: or_offline(format!("{:.2}%", stats.cpu)),
            limit: if offline { None } else { limit_text(cpu_limit) },
            severity: severity(stats.cpu, limits.cpu),
        },
        StatBlock {
            title: "Memory",
            value: or_offline(human_bytes(stats.memory_bytes)),
            limit: if offline { None } else { limit_text(mem_limit) },
            severity: severity(
                stats.memory_bytes as f64,
                limits.memory_mib.map(|m| m.saturating_mul(MIB) as f64),
            ),
        },
        StatBlock {
            title: "Disk",
            value: human_bytes(stats.disk_bytes),
            limit: limit_text(disk_limit),
            severity: severity(
                stats.disk_bytes as f64,
                limits.disk_mib.map(|d| d.saturating_mul(MIB) as f64),
            ),
        },
        StatBlock {
            title: "Network (In)",
            value: or_offline(human_bytes(stats.rx_bytes)),
            limit: None,
            severity: Severity::Normal,
        },
        StatBlock {
            title: "Network (Out)",
            value: or_offline(human_bytes(stats.tx_bytes)),
            limit: None,
            severity: Severity::Normal,
        },
    ]
}
