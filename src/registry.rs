//! The worker contract and the static feature registry.
//!
//! Every toggleable capability sits behind the same three-method contract:
//! `enable`, `disable`, `generate_report`. The registry is built once at
//! startup and is the only place feature names are bound to workers; policy
//! keys that do not appear here are ignored by the supervisor.

use crate::policy::{WEBSITE_BLOCKING, WEBSITE_WHITELISTING};
use chrono::Local;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Errors reported by worker transitions.
///
/// Workers report transient, recoverable conditions through this type
/// rather than panicking; the supervisor isolates and retries them.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("failed to start {feature}: {reason}")]
    Start { feature: String, reason: String },
    #[error("failed to stop {feature}: {reason}")]
    Stop { feature: String, reason: String },
    #[error("report generation failed for {feature}: {reason}")]
    Report { feature: String, reason: String },
}

/// The uniform contract implemented by every collector.
///
/// `enable` and `disable` must be safe to call when already in the target
/// state.
pub trait Worker: Send + Sync {
    fn enable(&self) -> Result<(), WorkerError>;
    fn disable(&self) -> Result<(), WorkerError>;
    fn generate_report(&self) -> Result<(), WorkerError>;
}

/// Which half of the product a feature belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureGroup {
    /// Telemetry collection (keystrokes, screenshots, usage tracking, ...)
    DataCollection,
    /// Restriction enforcement (blocking, access control, ...)
    Restriction,
}

/// An immutable binding of a feature name to its worker.
#[derive(Clone)]
pub struct WorkerDescriptor {
    pub name: &'static str,
    pub group: FeatureGroup,
    pub worker: Arc<dyn Worker>,
}

/// Static feature-name → worker mapping, built once at startup.
pub struct FeatureRegistry {
    workers: Vec<WorkerDescriptor>,
}

impl FeatureRegistry {
    pub fn new(workers: Vec<WorkerDescriptor>) -> Self {
        Self { workers }
    }

    /// Look up a worker by feature name.
    pub fn get(&self, name: &str) -> Option<&WorkerDescriptor> {
        self.workers.iter().find(|d| d.name == name)
    }

    /// Iterate descriptors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &WorkerDescriptor> {
        self.workers.iter()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

/// Built-in collector worker.
///
/// The concrete data-gathering logic lives outside this core; this worker
/// owns the lifecycle state the supervisor drives (a running flag set on
/// `enable`, cleared on `disable`) and, for collectors that produce a
/// per-day artifact, appends a heartbeat line on `generate_report` so the
/// aggregation pipeline is exercised end-to-end.
pub struct CollectorWorker {
    name: &'static str,
    /// Artifact file name under the day directory, for reporting collectors
    artifact: Option<&'static str>,
    report_root: PathBuf,
    running: Arc<AtomicBool>,
}

impl CollectorWorker {
    pub fn new(name: &'static str, artifact: Option<&'static str>, report_root: PathBuf) -> Self {
        Self {
            name,
            artifact,
            report_root,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Worker for CollectorWorker {
    fn enable(&self) -> Result<(), WorkerError> {
        // No-op when already running
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn disable(&self) -> Result<(), WorkerError> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn generate_report(&self) -> Result<(), WorkerError> {
        if !self.is_running() {
            return Ok(());
        }
        let Some(artifact) = self.artifact else {
            return Ok(());
        };

        let now = Local::now();
        let day_dir = self.report_root.join(now.format("%d-%m-%Y").to_string());
        std::fs::create_dir_all(&day_dir).map_err(|e| WorkerError::Report {
            feature: self.name.to_string(),
            reason: e.to_string(),
        })?;

        let line = format!(
            "[{}] {} report checkpoint\n",
            now.format("%Y-%m-%d %H:%M:%S"),
            self.name
        );
        let path = day_dir.join(artifact);
        let mut content = std::fs::read_to_string(&path).unwrap_or_default();
        content.push_str(&line);
        std::fs::write(&path, content).map_err(|e| WorkerError::Report {
            feature: self.name.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Build the registry covering the full feature set.
///
/// Data-collection features that produce a day-keyed artifact carry its
/// file name so report generation has somewhere to write.
pub fn builtin_registry(report_root: &std::path::Path) -> FeatureRegistry {
    let collection: &[(&'static str, Option<&'static str>)] = &[
        ("Keylogger", Some("keylogger_report.txt")),
        ("Keystroke / Word Count", Some("keystroke_report.txt")),
        ("Clipboard Monitoring", Some("clipboard_report.txt")),
        ("Mouse Movement Tracking", Some("mouse_movement_report.txt")),
        ("Mouse Click Count", Some("mouse_click_report.txt")),
        ("Browser History Logging", Some("browser_report.txt")),
        ("Capture Screenshots", Some("screenshot_report.txt")),
        ("Application Usage Tracking", Some("application_report.txt")),
        ("Capture Audio Clips", Some("capture_report.txt")),
        ("Capture Video Clips", Some("capture_report.txt")),
        ("Installation / Uninstallation Logs", Some("install-uninstall.txt")),
        ("Print Job Monitoring", Some("print_job_report.txt")),
        ("Active/Idle Time Detection", Some("activity_report.txt")),
        ("Laptop Geolocation", Some("location_report.txt")),
        ("Login/Logout + Screen Lock", Some("screen_lock_report.txt")),
    ];

    let restriction: &[(&'static str, Option<&'static str>)] = &[
        ("VPN Detection & Blocking", None),
        ("Browser Extension Restrictions", None),
        ("USB Port Access Control", None),
        ("Incognito Mode Blocking", None),
        (WEBSITE_WHITELISTING, Some("whitelist_report.txt")),
        (WEBSITE_BLOCKING, None),
        ("Screen Capture Prevention", None),
        ("Print Blocking", None),
        ("Download Blocking", None),
        ("Lunch Break Mode", Some("lunch_restore_report.txt")),
    ];

    let mut workers = Vec::with_capacity(collection.len() + restriction.len());
    for (name, artifact) in collection {
        workers.push(WorkerDescriptor {
            name,
            group: FeatureGroup::DataCollection,
            worker: Arc::new(CollectorWorker::new(name, *artifact, report_root.to_path_buf())),
        });
    }
    for (name, artifact) in restriction {
        workers.push(WorkerDescriptor {
            name,
            group: FeatureGroup::Restriction,
            worker: Arc::new(CollectorWorker::new(name, *artifact, report_root.to_path_buf())),
        });
    }

    FeatureRegistry::new(workers)
}
