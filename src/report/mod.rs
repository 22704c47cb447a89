//! Report aggregation pipeline.
//!
//! Reads the day's collector artifacts, derives totals and rankings,
//! renders charts, and assembles the consolidated HTML document. Each run
//! starts from the artifacts on disk; nothing is carried over between
//! runs, so re-running for the same day is idempotent.

pub mod charts;
pub mod html;
pub mod parse;

use chrono::Local;
use html::ChartSet;
use parse::{LocationFix, UsageEntry};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File name of the consolidated document inside the day directory.
pub const SUMMARY_DOCUMENT: &str = "summary_report.html";

const APP_CHART: &str = "app_usage_chart.svg";
const URL_CHART: &str = "url_usage_chart.svg";
const ACTIVITY_CHART: &str = "activity_split_chart.svg";

/// Aggregation errors. Parse and chart failures degrade; only the
/// filesystem operations that make the document unwritable are fatal.
#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    #[error("could not prepare day directory {path:?}: {source}")]
    DayDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {SUMMARY_DOCUMENT}: {0}")]
    WriteDocument(#[from] std::io::Error),
}

/// Everything derived from one day's artifacts.
#[derive(Debug, Clone, Default)]
pub struct DaySummary {
    /// Day key in `DD-MM-YYYY` form.
    pub day: String,
    pub active_secs: u64,
    pub idle_secs: u64,
    pub keystrokes: u64,
    pub words: u64,
    pub clicks: u64,
    pub top_apps: Vec<UsageEntry>,
    pub top_urls: Vec<UsageEntry>,
    pub location: Option<LocationFix>,
}

impl DaySummary {
    /// True when any artifact contributed data.
    pub fn has_data(&self) -> bool {
        self.active_secs > 0
            || self.idle_secs > 0
            || self.keystrokes > 0
            || self.clicks > 0
            || !self.top_apps.is_empty()
            || !self.top_urls.is_empty()
            || self.location.as_ref().is_some_and(|l| !l.is_empty())
    }
}

/// Day key for the local date, matching the collectors' directory naming.
pub fn today_key() -> String {
    Local::now().format("%d-%m-%Y").to_string()
}

/// Builds the daily summary document from collector artifacts.
pub struct Aggregator {
    report_root: PathBuf,
    top_n: usize,
}

impl Aggregator {
    pub fn new(report_root: impl Into<PathBuf>) -> Self {
        Self {
            report_root: report_root.into(),
            top_n: 5,
        }
    }

    /// Directory holding one day's artifacts.
    pub fn day_dir(&self, day: &str) -> PathBuf {
        self.report_root.join(day)
    }

    /// Read and summarize the day's artifacts without writing anything.
    pub fn summarize(&self, day: &str) -> DaySummary {
        let dir = self.day_dir(day);
        let counters = parse::parse_counters(&dir);
        let apps = parse::parse_usage(&dir.join("application_report.txt"), "Title");
        let urls = parse::parse_usage(&dir.join("browser_report.txt"), "URL");
        let location = parse::read_text_if_exists(&dir.join("location_report.txt"))
            .map(|text| parse::parse_location(&text));

        DaySummary {
            day: day.to_string(),
            active_secs: counters.active_secs,
            idle_secs: counters.idle_secs,
            keystrokes: counters.keystrokes,
            words: counters.words,
            clicks: counters.clicks,
            top_apps: parse::rank_top(apps, self.top_n),
            top_urls: parse::rank_top(urls, self.top_n),
            location,
        }
    }

    /// Run the full aggregation for `day`: summarize, render charts, and
    /// write the consolidated document into the day directory.
    ///
    /// `feature_status` is embedded as the monitoring configuration
    /// section. The document is overwritten if it already exists.
    pub fn aggregate(
        &self,
        day: &str,
        feature_status: &[(String, bool)],
    ) -> Result<DaySummary, AggregateError> {
        let dir = self.day_dir(day);
        std::fs::create_dir_all(&dir).map_err(|source| AggregateError::DayDir {
            path: dir.clone(),
            source,
        })?;

        let summary = self.summarize(day);
        if !summary.has_data() {
            info!("no artifacts for {day}; writing placeholder document");
        }

        // A failed chart degrades to its "not available" placeholder.
        let charts = ChartSet {
            app_bars: render_or_warn(
                charts::render_usage_bars(&summary.top_apps, &dir.join(APP_CHART), "Top Applications"),
                APP_CHART,
            ),
            url_bars: render_or_warn(
                charts::render_usage_bars(&summary.top_urls, &dir.join(URL_CHART), "Top URLs"),
                URL_CHART,
            ),
            activity_donut: render_or_warn(
                charts::render_activity_donut(
                    &dir.join(ACTIVITY_CHART),
                    summary.active_secs,
                    summary.idle_secs,
                ),
                ACTIVITY_CHART,
            ),
        };

        let document = html::render_document(&summary, feature_status, charts, &dir);
        std::fs::write(dir.join(SUMMARY_DOCUMENT), document)?;
        info!("wrote {SUMMARY_DOCUMENT} for {day}");

        Ok(summary)
    }
}

fn render_or_warn(result: Result<bool, charts::ChartError>, name: &str) -> bool {
    match result {
        Ok(rendered) => rendered,
        Err(e) => {
            warn!("skipping {name}: {e}");
            false
        }
    }
}
