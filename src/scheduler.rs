//! Time-based triggers for report generation and delivery.
//!
//! A single tick thread polls the wall clock every 30 seconds. At the top
//! of each hour the enabled collectors checkpoint their reports; at the
//! configured end-of-day time (skipped on the rest day) the full pipeline
//! runs: reports, aggregation, bundling, delivery.

use crate::config::Config;
use crate::delivery::{self, DeliveryResult};
use crate::report::{today_key, Aggregator};
use crate::supervisor::Supervisor;
use chrono::{Datelike, Local, Timelike};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info, warn};

/// Tick resolution of the scheduler loop.
const TICK: Duration = Duration::from_secs(30);

/// Run the full end-of-day pipeline for `day`.
///
/// Per-feature report failures are logged but never abort aggregation;
/// only an unwritable day directory stops the run before delivery.
pub fn run_pipeline(config: &Config, supervisor: &Supervisor, day: &str) -> Vec<DeliveryResult> {
    info!("running report pipeline for {day}");

    for (feature, reason) in supervisor.generate_reports() {
        warn!("report generation failed for {feature}: {reason}");
    }

    let aggregator = Aggregator::new(&config.report_root);
    if let Err(e) = aggregator.aggregate(day, &supervisor.snapshot()) {
        error!("aggregation failed for {day}: {e}");
        return Vec::new();
    }

    delivery::deliver_day(config, day)
}

/// The scheduler tick thread. Dropping or shutting it down ends the loop
/// promptly; the thread never runs two pipelines concurrently.
pub struct Scheduler {
    stop_tx: crossbeam_channel::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn spawn(config: Config, supervisor: Arc<Supervisor>) -> Self {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);

        let handle = thread::Builder::new()
            .name("scheduler".to_string())
            .spawn(move || scheduler_loop(&config, &supervisor, &stop_rx))
            .expect("failed to spawn scheduler thread");

        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Stop the tick loop and wait for it to exit.
    pub fn shutdown(mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let _ = self.stop_tx.try_send(());
    }
}

fn scheduler_loop(
    config: &Config,
    supervisor: &Supervisor,
    stop_rx: &crossbeam_channel::Receiver<()>,
) {
    let (eod_hour, eod_minute) = config.end_of_day_hm();
    let mut last_hourly: Option<(u32, u32)> = None;
    let mut last_eod_day: Option<String> = None;

    info!(
        "scheduler running: hourly checkpoints, end-of-day at {:02}:{:02} (rest day {:?})",
        eod_hour, eod_minute, config.rest_day
    );

    loop {
        let now = Local::now();
        let slot = (now.ordinal(), now.hour());

        if now.minute() == 0 && last_hourly != Some(slot) {
            last_hourly = Some(slot);
            info!("hourly checkpoint");
            for (feature, reason) in supervisor.generate_reports() {
                warn!("report generation failed for {feature}: {reason}");
            }
        }

        let day = today_key();
        if now.hour() == eod_hour
            && now.minute() == eod_minute
            && last_eod_day.as_deref() != Some(day.as_str())
        {
            if now.weekday() == config.rest_day {
                info!("end-of-day trigger skipped: rest day");
                last_eod_day = Some(day);
            } else {
                last_eod_day = Some(day.clone());
                run_pipeline(config, supervisor, &day);
            }
        }

        // A stop signal (or a dropped sender) wakes the loop immediately.
        match stop_rx.recv_timeout(TICK) {
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(crossbeam_channel::RecvTimeoutError::Disconnected) => return,
        }
    }
}

/// Run the pipeline on a worker thread with a bounded wait, for use on
/// shutdown. On timeout the worker is abandoned and whatever partial
/// results exist on disk remain.
pub fn run_pipeline_timeboxed(
    config: &Config,
    supervisor: &Arc<Supervisor>,
    timeout: Duration,
) -> Option<Vec<DeliveryResult>> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let config = config.clone();
    let supervisor = Arc::clone(supervisor);

    let spawned = thread::Builder::new()
        .name("shutdown-pipeline".to_string())
        .spawn(move || {
            let results = run_pipeline(&config, &supervisor, &today_key());
            let _ = tx.send(results);
        });
    if let Err(e) = spawned {
        error!("could not spawn shutdown pipeline: {e}");
        return None;
    }

    match rx.recv_timeout(timeout) {
        Ok(results) => Some(results),
        Err(_) => {
            warn!(
                "shutdown pipeline did not finish within {}s; exiting with partial results",
                timeout.as_secs()
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyStore;
    use crate::registry::builtin_registry;

    fn test_supervisor(root: &std::path::Path) -> Arc<Supervisor> {
        let registry = builtin_registry(root);
        let store = PolicyStore::new(root.join("policy.json"));
        Arc::new(Supervisor::new(registry, store))
    }

    #[test]
    fn test_pipeline_writes_document_without_sinks() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.report_root = dir.path().to_path_buf();
        config.data_path = dir.path().to_path_buf();

        let supervisor = test_supervisor(dir.path());
        let day = "13-07-2026";
        let results = run_pipeline(&config, &supervisor, day);

        // No sinks configured, so no delivery results, but the document
        // must exist.
        assert!(results.is_empty());
        assert!(dir
            .path()
            .join(day)
            .join(crate::report::SUMMARY_DOCUMENT)
            .exists());
    }

    #[test]
    fn test_timeboxed_pipeline_completes_quickly() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.report_root = dir.path().to_path_buf();
        config.data_path = dir.path().to_path_buf();

        let supervisor = test_supervisor(dir.path());
        let results = run_pipeline_timeboxed(&config, &supervisor, Duration::from_secs(30));
        assert!(results.is_some(), "local pipeline must beat the time-box");
    }

    #[test]
    fn test_scheduler_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.report_root = dir.path().to_path_buf();
        config.data_path = dir.path().to_path_buf();

        let scheduler = Scheduler::spawn(config, test_supervisor(dir.path()));
        scheduler.shutdown();
    }
}
