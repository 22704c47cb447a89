//! Integration tests for the end-to-end report pipeline: policy
//! reconciliation, artifact aggregation, and bundling.

use std::fs::File;
use std::path::Path;
use std::time::Duration;
use vigil_agent::bundle::{bundle_day, verify_archive, BundleMode};
use vigil_agent::policy::{Policy, PolicyStore, WEBSITE_BLOCKING, WEBSITE_WHITELISTING};
use vigil_agent::registry::builtin_registry;
use vigil_agent::report::{Aggregator, SUMMARY_DOCUMENT};
use vigil_agent::supervisor::Supervisor;
use vigil_agent::watcher::{notification_channel, PolicyWatcher};
use zip::ZipArchive;

const DAY: &str = "13-07-2026";

fn write_day_artifacts(day_dir: &Path) {
    std::fs::create_dir_all(day_dir.join("Screenshots")).unwrap();
    std::fs::write(
        day_dir.join("activity_report.txt"),
        "Working Time: 5400 seconds\nIdle Time: 1800 seconds\n",
    )
    .unwrap();
    std::fs::write(
        day_dir.join("keystroke_report.txt"),
        "Total Keystrokes: 2100\nTotal Words Typed: 480\n",
    )
    .unwrap();
    std::fs::write(day_dir.join("mouse_click_report.txt"), "Total Clicks: 312\n").unwrap();
    std::fs::write(
        day_dir.join("application_report.txt"),
        "Process: code, Title: main.rs, Duration: 2400\n\
         Process: chrome, Title: docs, Duration: 1100\n\
         Process: chrome, Title: docs, Duration: 400\n",
    )
    .unwrap();
    std::fs::write(
        day_dir.join("browser_report.txt"),
        "Process: chrome,\n URL: https://intranet.example.com, Duration: 900\n",
    )
    .unwrap();
    std::fs::write(
        day_dir.join("clipboard_report.txt"),
        "10:02 copied 42 chars\n",
    )
    .unwrap();
    std::fs::write(day_dir.join("Screenshots/shot-0001.png"), b"fake png").unwrap();
}

#[test]
fn test_aggregate_then_bundle_full_day() {
    let root = tempfile::tempdir().unwrap();
    write_day_artifacts(&root.path().join(DAY));

    let status = vec![
        ("Keylogger".to_string(), true),
        ("Clipboard Monitoring".to_string(), false),
    ];
    let summary = Aggregator::new(root.path()).aggregate(DAY, &status).unwrap();

    assert_eq!(summary.active_secs, 5400);
    assert_eq!(summary.clicks, 312);
    // chrome/docs durations merge before ranking
    assert_eq!(summary.top_apps[0].process, "code");
    assert_eq!(summary.top_apps[1].seconds, 1500.0);
    // split browser record is stitched back together
    assert_eq!(summary.top_urls[0].detail, "https://intranet.example.com");

    let day_dir = root.path().join(DAY);
    let doc = std::fs::read_to_string(day_dir.join(SUMMARY_DOCUMENT)).unwrap();
    assert!(doc.contains("Keylogger: <span class='status-enabled'>Enabled</span>"));
    assert!(doc.contains("10:02 copied 42 chars"));
    assert!(doc.contains("app_usage_chart.svg"));
    assert!(doc.contains("No location data available."));

    let archive = bundle_day(root.path(), DAY, BundleMode::Full).unwrap();
    verify_archive(&archive).unwrap();

    let mut zip = ZipArchive::new(File::open(&archive).unwrap()).unwrap();
    let names: Vec<String> = (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect();
    assert!(names.iter().any(|n| n == SUMMARY_DOCUMENT));
    assert!(names.iter().any(|n| n == "Screenshots/shot-0001.png"));
}

#[test]
fn test_lightweight_bundle_leaves_screenshots_out() {
    let root = tempfile::tempdir().unwrap();
    write_day_artifacts(&root.path().join(DAY));
    Aggregator::new(root.path()).aggregate(DAY, &[]).unwrap();

    let archive = bundle_day(root.path(), DAY, BundleMode::Lightweight).unwrap();
    verify_archive(&archive).unwrap();

    let mut zip = ZipArchive::new(File::open(&archive).unwrap()).unwrap();
    let names: Vec<String> = (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect();
    assert!(names.iter().any(|n| n == SUMMARY_DOCUMENT));
    assert!(!names.iter().any(|n| n.starts_with("Screenshots")));
}

#[test]
fn test_empty_day_still_produces_deliverable_bundle() {
    let root = tempfile::tempdir().unwrap();
    let day = "01-01-2026";

    let summary = Aggregator::new(root.path()).aggregate(day, &[]).unwrap();
    assert!(!summary.has_data());

    let doc = std::fs::read_to_string(root.path().join(day).join(SUMMARY_DOCUMENT)).unwrap();
    assert!(doc.contains("No application usage data."));
    assert!(doc.contains("No data recorded."));

    let archive = bundle_day(root.path(), day, BundleMode::Lightweight).unwrap();
    verify_archive(&archive).unwrap();
}

#[test]
fn test_policy_edit_reaches_running_features() {
    let root = tempfile::tempdir().unwrap();
    let policy_path = root.path().join("policy.json");

    let store = PolicyStore::new(policy_path.clone());
    let mut policy = Policy::default();
    policy.set("Keylogger", true);
    store.save(&policy).unwrap();

    let supervisor = Supervisor::new(
        builtin_registry(root.path()),
        PolicyStore::new(policy_path.clone()),
    );
    supervisor.apply_policy();
    assert!(supervisor
        .snapshot()
        .iter()
        .any(|(name, enabled)| name == "Keylogger" && *enabled));

    // Watch the file, edit it, and reconcile on the notification.
    let (tx, rx) = notification_channel();
    let _watcher = PolicyWatcher::spawn(&policy_path, Duration::from_millis(50), tx);
    std::thread::sleep(Duration::from_millis(200));

    policy.set("Keylogger", false);
    policy.set("Clipboard Monitoring", true);
    store.save(&policy).unwrap();

    assert!(
        rx.recv_timeout(Duration::from_secs(5)).is_ok(),
        "policy write must produce a notification"
    );
    supervisor.apply_policy();

    let snapshot = supervisor.snapshot();
    assert!(snapshot
        .iter()
        .any(|(name, enabled)| name == "Keylogger" && !*enabled));
    assert!(snapshot
        .iter()
        .any(|(name, enabled)| name == "Clipboard Monitoring" && *enabled));
}

#[test]
fn test_conflicting_website_policy_is_corrected_on_disk() {
    let root = tempfile::tempdir().unwrap();
    let policy_path = root.path().join("policy.json");

    let store = PolicyStore::new(policy_path.clone());
    let mut policy = Policy::default();
    policy.set(WEBSITE_WHITELISTING, true);
    policy.set(WEBSITE_BLOCKING, true);
    store.save(&policy).unwrap();

    let supervisor = Supervisor::new(builtin_registry(root.path()), store);
    supervisor.apply_policy();

    let persisted = PolicyStore::new(policy_path).load();
    let whitelisting = persisted.desired(WEBSITE_WHITELISTING);
    let blocking = persisted.desired(WEBSITE_BLOCKING);
    assert!(
        whitelisting != blocking,
        "exactly one of the website features may stay enabled"
    );
}
