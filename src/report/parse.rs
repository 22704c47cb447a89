//! Tolerant parsing of per-collector artifact files.
//!
//! Collector output is semi-structured text. Named numeric fields are
//! pulled out by pattern matching; a missing file contributes zeros and a
//! malformed line is skipped, never fatal to the aggregation run.

use regex::Regex;
use std::path::Path;
use tracing::{debug, warn};

/// Totals extracted from the activity / keystroke / click artifacts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterTotals {
    pub active_secs: u64,
    pub idle_secs: u64,
    pub keystrokes: u64,
    pub words: u64,
    pub clicks: u64,
}

/// One merged usage entry (application or browser).
#[derive(Debug, Clone, PartialEq)]
pub struct UsageEntry {
    pub process: String,
    /// Window title for applications, URL for browser usage
    pub detail: String,
    pub seconds: f64,
}

impl UsageEntry {
    /// Display label, matching the artifact's "process - detail" shape.
    pub fn label(&self) -> String {
        if self.detail.is_empty() {
            self.process.clone()
        } else {
            format!("{} - {}", self.process, self.detail)
        }
    }
}

/// Location fix pulled from the geolocation artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationFix {
    pub time: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
}

impl LocationFix {
    pub fn is_empty(&self) -> bool {
        self.time.is_none() && self.city.is_none() && self.region.is_none() && self.country.is_none()
    }
}

/// Extract the first integer following `keyword` in `text`.
pub fn extract_value(text: &str, keyword: &str) -> u64 {
    let pattern = format!(r"{}\D*(\d+)", regex::escape(keyword));
    let Ok(re) = Regex::new(&pattern) else {
        return 0;
    };
    re.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

fn read_lines(path: &Path) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => content.lines().map(|l| l.to_string()).collect(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("artifact not present: {:?}", path);
            Vec::new()
        }
        Err(e) => {
            warn!("could not read artifact {:?}: {e}", path);
            Vec::new()
        }
    }
}

/// Read the whole artifact as text, if present and readable.
pub fn read_text_if_exists(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(content) if !content.trim().is_empty() => Some(content),
        Ok(_) => None,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("could not read artifact {:?}: {e}", path);
            }
            None
        }
    }
}

/// Sum the numeric counters across the three counter artifacts in `day_dir`.
pub fn parse_counters(day_dir: &Path) -> CounterTotals {
    let mut totals = CounterTotals::default();

    for line in read_lines(&day_dir.join("activity_report.txt")) {
        if line.contains("Working Time") {
            totals.active_secs += extract_value(&line, "Working Time");
        } else if line.contains("Idle Time") {
            totals.idle_secs += extract_value(&line, "Idle Time");
        }
    }

    for line in read_lines(&day_dir.join("keystroke_report.txt")) {
        totals.keystrokes += extract_value(&line, "Total Keystrokes");
        totals.words += extract_value(&line, "Total Words Typed");
    }

    for line in read_lines(&day_dir.join("mouse_click_report.txt")) {
        totals.clicks += extract_value(&line, "Total Clicks");
    }

    totals
}

/// Parse a usage artifact into merged entries, in first-seen order.
///
/// Lines look like `Process: X, <detail_key>: Y, Duration: Z`; a record may
/// be split across two lines (`Process:` on one, `Duration:` on the next),
/// which are stitched back together before matching. Entries sharing the
/// same process + detail have their durations summed.
pub fn parse_usage(path: &Path, detail_key: &str) -> Vec<UsageEntry> {
    let lines = read_lines(path);
    if lines.is_empty() {
        return Vec::new();
    }

    let mut merged = Vec::new();
    let mut pending = String::new();
    for line in &lines {
        let line = line.trim();
        if line.contains("Process:") && line.contains("Duration:") {
            merged.push(line.to_string());
        } else if line.contains("Process:") {
            pending = line.to_string();
        } else if line.contains("Duration:") && !pending.is_empty() {
            merged.push(format!("{pending} {line}"));
            pending.clear();
        }
    }

    let pattern = format!(
        r"Process:\s+(.*?),\s+{}:\s+(.*?),\s+Duration:\s+([\d.]+)",
        regex::escape(detail_key)
    );
    let Ok(re) = Regex::new(&pattern) else {
        return Vec::new();
    };

    let mut entries: Vec<UsageEntry> = Vec::new();
    for line in &merged {
        let Some(caps) = re.captures(line) else {
            continue;
        };
        let process = caps[1].split(',').next().unwrap_or("").trim().to_string();
        let detail = caps[2].split(',').next().unwrap_or("").trim().to_string();
        let Ok(seconds) = caps[3].parse::<f64>() else {
            continue;
        };

        match entries
            .iter_mut()
            .find(|e| e.process == process && e.detail == detail)
        {
            Some(existing) => existing.seconds += seconds,
            None => entries.push(UsageEntry {
                process,
                detail,
                seconds,
            }),
        }
    }

    entries
}

/// Rank usage entries descending by total duration.
///
/// The sort is stable, so entries with equal totals keep first-seen order.
/// Only the top `n` are retained.
pub fn rank_top(mut entries: Vec<UsageEntry>, n: usize) -> Vec<UsageEntry> {
    entries.sort_by(|a, b| b.seconds.partial_cmp(&a.seconds).unwrap_or(std::cmp::Ordering::Equal));
    entries.truncate(n);
    entries
}

/// Extract location fields from the geolocation artifact text.
pub fn parse_location(text: &str) -> LocationFix {
    let mut fix = LocationFix::default();
    for line in text.lines() {
        if let Some(rest) = line.split("Start Time:").nth(1) {
            fix.time = Some(rest.trim().to_string());
        } else if let Some(rest) = line.split("City:").nth(1) {
            fix.city = Some(rest.trim().to_string());
        } else if let Some(rest) = line.split("Region:").nth(1) {
            fix.region = Some(rest.trim().to_string());
        } else if let Some(rest) = line.split("Country:").nth(1) {
            fix.country = Some(rest.trim().to_string());
        }
    }
    fix
}

/// Format a duration in seconds as `Hh Mm Ss`.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{hours}h {minutes}m {secs}s")
}
