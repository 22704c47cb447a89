//! Policy store watcher.
//!
//! Watches the policy file and emits debounced change notifications into a
//! coalescing channel (bounded to one pending notification). The notify
//! backend is preferred; if it fails to initialize the watcher degrades to
//! polling the file's metadata every second, so reconciliation never
//! silently stops.

use crossbeam_channel::{unbounded, Receiver, Sender, TrySendError};
use notify::{RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Poll cadence used when the notify backend is unavailable.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Create the coalescing notification channel consumed by the supervisor
/// loop. Capacity one: a notification arriving while a reconciliation pass
/// is in flight queues exactly one more pass.
pub fn notification_channel() -> (Sender<()>, Receiver<()>) {
    crossbeam_channel::bounded(1)
}

/// A running policy watcher. Dropping it stops the notification stream.
pub struct PolicyWatcher {
    // Keeps the notify backend alive; None when running on the poll fallback.
    _backend: Option<RecommendedWatcher>,
}

impl PolicyWatcher {
    /// Start watching `path`, forwarding debounced notifications into `tx`.
    pub fn spawn(path: &Path, debounce: Duration, tx: Sender<()>) -> Self {
        let (raw_tx, raw_rx) = unbounded::<()>();

        thread::Builder::new()
            .name("policy-debounce".to_string())
            .spawn(move || debounce_loop(raw_rx, tx, debounce))
            .expect("failed to spawn debounce thread");

        let backend = match start_notify_backend(path, raw_tx.clone()) {
            Ok(watcher) => {
                info!("watching policy file {:?} for changes", path);
                Some(watcher)
            }
            Err(e) => {
                warn!(
                    "filesystem notification unavailable ({e}); falling back to polling {:?}",
                    path
                );
                spawn_poll_backend(path.to_path_buf(), raw_tx);
                None
            }
        };

        Self { _backend: backend }
    }
}

fn start_notify_backend(path: &Path, raw_tx: Sender<()>) -> Result<RecommendedWatcher, notify::Error> {
    let file_name = path.file_name().map(|n| n.to_os_string());
    let mut watcher =
        notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| match res {
            Ok(event) => {
                // The parent directory is watched, so filter to events that
                // touch the policy file itself (writes land via rename).
                let relevant = match &file_name {
                    Some(name) => event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == Some(name.as_os_str())),
                    None => true,
                };
                if relevant {
                    let _ = raw_tx.send(());
                }
            }
            Err(e) => warn!("policy watch error: {e}"),
        })?;

    // The file may not exist yet; watching the directory catches creation.
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

/// Metadata fingerprint used by the poll fallback.
fn file_signature(path: &Path) -> Option<(SystemTime, u64)> {
    let meta = std::fs::metadata(path).ok()?;
    Some((meta.modified().ok()?, meta.len()))
}

fn spawn_poll_backend(path: PathBuf, raw_tx: Sender<()>) {
    thread::Builder::new()
        .name("policy-poll".to_string())
        .spawn(move || {
            let mut last = file_signature(&path);
            loop {
                thread::sleep(POLL_INTERVAL);
                let current = file_signature(&path);
                if current != last {
                    last = current;
                    if raw_tx.send(()).is_err() {
                        break;
                    }
                }
            }
        })
        .expect("failed to spawn poll thread");
}

/// Collapse bursts of raw change events into single downstream
/// notifications.
///
/// After the first raw event, further events arriving inside the debounce
/// window are drained; one notification is then offered to the coalescing
/// channel. A full channel means a pass is already pending, which is the
/// coalescing we want.
fn debounce_loop(raw_rx: Receiver<()>, tx: Sender<()>, window: Duration) {
    while raw_rx.recv().is_ok() {
        while raw_rx.recv_timeout(window).is_ok() {}

        match tx.try_send(()) {
            Ok(()) => debug!("policy change notification emitted"),
            Err(TrySendError::Full(())) => debug!("policy change coalesced into pending pass"),
            Err(TrySendError::Disconnected(())) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_collapses_to_one_notification() {
        let (raw_tx, raw_rx) = unbounded();
        let (tx, rx) = notification_channel();

        let handle = thread::spawn(move || debounce_loop(raw_rx, tx, Duration::from_millis(50)));

        for _ in 0..10 {
            raw_tx.send(()).unwrap();
        }
        drop(raw_tx);
        handle.join().unwrap();

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err(), "burst must collapse to one event");
    }

    #[test]
    fn test_separated_writes_each_notify() {
        let (raw_tx, raw_rx) = unbounded();
        let (tx, rx) = notification_channel();

        let handle = thread::spawn(move || debounce_loop(raw_rx, tx, Duration::from_millis(20)));

        raw_tx.send(()).unwrap();
        // Consume the first notification before the second write arrives,
        // as the reconciliation loop would.
        assert!(rx.recv_timeout(Duration::from_secs(1)).is_ok());

        thread::sleep(Duration::from_millis(60));
        raw_tx.send(()).unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(1)).is_ok());

        drop(raw_tx);
        handle.join().unwrap();
    }

    #[test]
    fn test_pending_notification_coalesces() {
        let (raw_tx, raw_rx) = unbounded();
        let (tx, rx) = notification_channel();

        let handle = thread::spawn(move || debounce_loop(raw_rx, tx, Duration::from_millis(10)));

        // Nobody consumes: the second round must coalesce, not block.
        raw_tx.send(()).unwrap();
        thread::sleep(Duration::from_millis(50));
        raw_tx.send(()).unwrap();
        drop(raw_tx);
        handle.join().unwrap();

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_file_signature_tracks_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.json");

        assert!(file_signature(&path).is_none());

        std::fs::write(&path, "{}").unwrap();
        let first = file_signature(&path);
        assert!(first.is_some());

        std::fs::write(&path, r#"{"Keylogger": true}"#).unwrap();
        assert_ne!(file_signature(&path), first);
    }

    #[test]
    fn test_watcher_emits_after_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.json");
        std::fs::write(&path, "{}").unwrap();

        let (tx, rx) = notification_channel();
        let _watcher = PolicyWatcher::spawn(&path, Duration::from_millis(50), tx);

        // Give the backend a moment to arm before writing.
        thread::sleep(Duration::from_millis(200));
        std::fs::write(&path, r#"{"Keylogger": true}"#).unwrap();

        assert!(
            rx.recv_timeout(Duration::from_secs(5)).is_ok(),
            "a completed write must produce at least one notification"
        );
    }
}
