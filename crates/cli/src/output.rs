// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plain-text rendering for status tables and alerts.

use pg_core::{format_uptime, Alert};
use pg_engine::{CrashStats, MetricsFrame, ProcessStatus};

/// Fixed-width process table.
pub fn process_table(processes: &[ProcessStatus]) -> String {
    let mut out = format!(
        "{:<20} {:<12} {:>8} {:>10} {:>8} {:>8} {:>8}\n",
        "NAME", "STATE", "PID", "UPTIME", "CPU%", "MEM%", "RESTARTS"
    );
    for p in processes {
        let pid = p.pid.map(|v| v.to_string()).unwrap_or_else(|| "-".into());
        let uptime = p
            .uptime_seconds
            .map(|s| format_uptime(s as u64))
            .unwrap_or_else(|| "-".into());
        let (cpu, mem) = match &p.last_sample {
            Some(s) => (format!("{:.1}", s.cpu_percent), format!("{:.1}", s.memory_percent)),
            None => ("-".into(), "-".into()),
        };
        out.push_str(&format!(
            "{:<20} {:<12} {:>8} {:>10} {:>8} {:>8} {:>8}\n",
            p.name,
            p.state.to_string(),
            pid,
            uptime,
            cpu,
            mem,
            p.restarts_total
        ));
    }
    out
}

pub fn process_detail(p: &ProcessStatus) -> String {
    let mut out = String::new();
    out.push_str(&format!("name:      {}\n", p.name));
    if let Some(kind) = &p.kind {
        out.push_str(&format!("kind:      {kind}\n"));
    }
    out.push_str(&format!("state:     {}\n", p.state));
    if let Some(pid) = p.pid {
        out.push_str(&format!("pid:       {pid}\n"));
    }
    if let Some(uptime) = p.uptime_seconds {
        out.push_str(&format!("uptime:    {}\n", format_uptime(uptime as u64)));
    }
    out.push_str(&format!(
        "restarts:  {} total, {} consecutive\n",
        p.restarts_total, p.consecutive_restarts
    ));
    out.push_str(&format!("crashes:   {} in window\n", p.crashes_in_window));
    if p.disabled {
        out.push_str("disabled:  yes (force-enable to clear)\n");
    }
    if let Some(remaining) = p.quarantine_remaining_seconds {
        out.push_str(&format!("quarantine: {remaining}s remaining\n"));
    }
    if !p.depends_on.is_empty() {
        out.push_str(&format!("depends on: {}\n", p.depends_on.join(", ")));
    }
    if let Some(sample) = &p.last_sample {
        out.push_str(&format!(
            "last sample: cpu {:.1}%  mem {:.1}%  rss {}  threads {}  fds {}  conns {}\n",
            sample.cpu_percent,
            sample.memory_percent,
            human_bytes(sample.rss_bytes),
            sample.threads,
            sample.open_files,
            sample.connections
        ));
    }
    out
}

pub fn crash_stats(stats: &CrashStats) -> String {
    let mut out = format!(
        "{}: {} crash(es) in the last {}s (limit {}, action {})\n",
        stats.process,
        stats.crashes.len(),
        stats.window_seconds,
        stats.max_crashes,
        stats.action
    );
    for crash in &stats.crashes {
        let code = crash
            .exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".into());
        out.push_str(&format!(
            "  {}  exit {:<6} after {:.1}s\n",
            crash.at.format("%Y-%m-%d %H:%M:%S"),
            code,
            crash.run_seconds
        ));
    }
    if stats.disabled {
        out.push_str("disabled: yes\n");
    }
    if let Some(remaining) = stats.quarantine_remaining_seconds {
        out.push_str(&format!("quarantine: {remaining}s remaining\n"));
    }
    out
}

pub fn alert_list(alerts: &[Alert]) -> String {
    if alerts.is_empty() {
        return "no alerts\n".to_string();
    }
    let mut out = String::new();
    for alert in alerts {
        let state = if alert.resolved_at.is_some() {
            "resolved"
        } else if alert.acknowledged_at.is_some() {
            "acked"
        } else {
            "active"
        };
        let process = alert.process.as_deref().unwrap_or("-");
        out.push_str(&format!(
            "{}  {:<9} {:<9} {:<18} {:<16} {}\n",
            alert.created_at.format("%H:%M:%S"),
            state,
            alert.severity.to_string(),
            alert.kind.to_string(),
            process,
            alert.id.short(8)
        ));
        out.push_str(&format!("          {}\n", alert.message));
    }
    out
}

/// One line per frame for `pg watch`.
pub fn frame_line(frame: &MetricsFrame) -> String {
    let host = frame
        .system
        .as_ref()
        .map(|h| format!("host cpu {:.1}% mem {:.1}%", h.cpu_percent, h.memory_percent))
        .unwrap_or_else(|| "host -".into());
    let mut parts: Vec<String> = Vec::new();
    for (name, sample) in &frame.processes {
        parts.push(format!(
            "{name} {:.0}%/{:.0}%",
            sample.cpu_percent, sample.memory_percent
        ));
    }
    format!(
        "{}  {}  [{}]  alerts:{}",
        frame.timestamp.format("%H:%M:%S"),
        host,
        parts.join("  "),
        frame.alerts.len()
    )
}

fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes}B")
    } else {
        format!("{value:.1}{}", UNITS[unit])
    }
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
