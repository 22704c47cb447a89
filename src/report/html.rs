//! Assembly of the self-contained daily HTML document.
//!
//! Every section is always present; sections without underlying data carry
//! an explicit "no data" placeholder so the document structure is stable
//! day-to-day for downstream parsing.

use crate::report::charts::split_percentages;
use crate::report::parse::{format_duration, read_text_if_exists};
use crate::report::DaySummary;
use chrono::Local;
use std::fmt::Write as _;
use std::path::Path;

/// Optional collector artifacts included verbatim when present.
const OPTIONAL_SECTIONS: &[(&str, &str)] = &[
    ("Audio & Video Capture Log", "capture_report.txt"),
    ("Clipboard Activity", "clipboard_report.txt"),
    ("Install/Uninstall Log", "install-uninstall.txt"),
    ("Keylogger Report", "keylogger_report.txt"),
    ("Keystroke Summary", "keystroke_report.txt"),
    ("Lunch Restore Activity", "lunch_restore_report.txt"),
    ("Print Jobs Log", "print_job_report.txt"),
    ("Screenshot Capture Log", "screenshot_report.txt"),
    ("Website Whitelist Activity", "whitelist_report.txt"),
];

const STYLE: &str = "\
    body { font-family: 'Segoe UI', sans-serif; background-color: #f9f9f9; color: #333; padding: 20px; }\n\
    h2 { color: #3b3b98; text-align: center; }\n\
    summary { cursor: pointer; font-size: 1.1em; font-weight: bold; color: #2c3e50; }\n\
    details { background: #ffffff; padding: 15px 25px; margin-bottom: 15px; border-radius: 8px; box-shadow: 0 0 8px rgba(0,0,0,0.05); }\n\
    ul { list-style-type: none; padding-left: 0; }\n\
    li { margin-bottom: 5px; }\n\
    .status-enabled { color: green; font-weight: bold; }\n\
    .status-disabled { color: red; font-weight: bold; }\n\
    img { display: block; margin: 10px auto; border: 1px solid #ddd; border-radius: 6px; max-width: 100%; height: auto; }\n\
    pre { background-color: #eee; padding: 10px; border-radius: 5px; overflow-x: auto; }\n";

/// Escape text for inclusion in HTML body content.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Which charts were actually rendered for the day.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChartSet {
    pub app_bars: bool,
    pub url_bars: bool,
    pub activity_donut: bool,
}

/// Render the consolidated document into a string.
///
/// `feature_status` is the current policy's enabled/disabled view, in
/// registry order; `day_dir` is read for the verbatim optional sections.
pub fn render_document(
    summary: &DaySummary,
    feature_status: &[(String, bool)],
    charts: ChartSet,
    day_dir: &Path,
) -> String {
    let mut doc = String::with_capacity(16 * 1024);
    let generated = Local::now().format("%d-%m-%Y %I:%M %p");

    let _ = write!(
        doc,
        "<html><head>\n<title>Vigil Daily Report</title>\n<style>\n{STYLE}</style>\n</head><body>\n\
         <h2>Vigil Daily Report</h2>\n\
         <p><b>Report generated on:</b> {generated}</p>\n"
    );

    // Monitoring configuration
    doc.push_str("<details open><summary>Monitoring Configuration</summary><ul>\n");
    if feature_status.is_empty() {
        doc.push_str("<li><i>Configuration data not available.</i></li>\n");
    } else {
        for (name, enabled) in feature_status {
            let (class, status) = if *enabled {
                ("status-enabled", "Enabled")
            } else {
                ("status-disabled", "Disabled")
            };
            let _ = writeln!(
                doc,
                "<li>{}: <span class='{class}'>{status}</span></li>",
                escape_html(name)
            );
        }
    }
    doc.push_str("</ul></details>\n");

    // Activity summary
    doc.push_str("<details open><summary>Activity Summary</summary>\n");
    let _ = writeln!(
        doc,
        "<p><b>Active Time:</b> {}</p>\n<p><b>Idle Time:</b> {}</p>",
        format_duration(summary.active_secs),
        format_duration(summary.idle_secs)
    );
    if let Some((active_pct, idle_pct)) = split_percentages(summary.active_secs, summary.idle_secs)
    {
        let _ = writeln!(
            doc,
            "<p>{active_pct:.1}% Active on PC and {idle_pct:.1}% Idle</p>"
        );
    }
    if charts.activity_donut {
        doc.push_str(
            "<img src='activity_split_chart.svg' alt='Active vs Idle Chart' width='330'>\n",
        );
    } else {
        doc.push_str("<p><i>No active vs idle chart available.</i></p>\n");
    }
    doc.push_str("</details>\n");

    // Input summary
    let _ = write!(
        doc,
        "<details open><summary>Input Summary</summary>\n\
         <p><b>Keystrokes:</b> {}</p>\n\
         <p><b>Words Typed:</b> {}</p>\n\
         <p><b>Mouse Clicks:</b> {}</p>\n\
         </details>\n",
        summary.keystrokes, summary.words, summary.clicks
    );

    // Top applications
    doc.push_str("<details open><summary>Top Applications</summary><ul>\n");
    if summary.top_apps.is_empty() {
        doc.push_str("<li><i>No application usage data.</i></li>\n");
    } else {
        for entry in &summary.top_apps {
            let _ = writeln!(
                doc,
                "<li>{}: <b>{}</b></li>",
                escape_html(&entry.label()),
                format_duration(entry.seconds as u64)
            );
        }
    }
    doc.push_str("</ul>");
    if charts.app_bars {
        doc.push_str("<img src='app_usage_chart.svg' alt='Top Applications' width='620'>\n");
    } else {
        doc.push_str("<p><i>Top applications chart not available.</i></p>\n");
    }
    doc.push_str("</details>\n");

    // Top URLs
    doc.push_str("<details open><summary>Top URLs</summary><ul>\n");
    if summary.top_urls.is_empty() {
        doc.push_str("<li><i>No browser usage data.</i></li>\n");
    } else {
        for entry in &summary.top_urls {
            let _ = writeln!(
                doc,
                "<li>{}: <b>{}</b></li>",
                escape_html(&entry.label()),
                format_duration(entry.seconds as u64)
            );
        }
    }
    doc.push_str("</ul>");
    if charts.url_bars {
        doc.push_str("<img src='url_usage_chart.svg' alt='Top URLs' width='620'>\n");
    } else {
        doc.push_str("<p><i>Top URLs chart not available.</i></p>\n");
    }
    doc.push_str("</details>\n");

    // Optional verbatim collector sections
    for (title, file) in OPTIONAL_SECTIONS {
        let _ = write!(doc, "<details><summary>{title}</summary>");
        match read_text_if_exists(&day_dir.join(file)) {
            Some(content) => {
                let _ = write!(doc, "<pre>{}</pre>", escape_html(&content));
            }
            None => {
                let _ = write!(doc, "<p><i>No data recorded.</i></p>");
            }
        }
        doc.push_str("</details>\n");
    }

    // Location
    doc.push_str("<details><summary>Location Info (Based on IP address)</summary><ul>\n");
    match &summary.location {
        Some(fix) if !fix.is_empty() => {
            for (label, value) in [
                ("Time", &fix.time),
                ("City", &fix.city),
                ("State", &fix.region),
                ("Country", &fix.country),
            ] {
                if let Some(value) = value {
                    let _ = writeln!(doc, "<li><b>{label}:</b> {}</li>", escape_html(value));
                }
            }
        }
        _ => doc.push_str("<li><i>No location data available.</i></li>\n"),
    }
    doc.push_str("</ul></details>\n");

    doc.push_str("</body></html>\n");
    doc
}
