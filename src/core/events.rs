// core/events.rs

// Append-only run event log (`run_events.csv`). Every append is independent and
// fail-soft: an I/O error is reported at error level and the run goes on.

use chrono::{Local, Utc};
use log::{error, info};
use std::fmt::Display;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use super::state::RunEventKind;

/// Header line written before any event
pub const EVENT_LOG_HEADER: &str = "timestamp, event";

/// Time source for event and message stamps (seconds)
pub trait Clock: Send + Sync {
    /// Current time in seconds
    fn now(&self) -> f64;
}

/// Wall-clock time since the Unix epoch
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        Utc::now().timestamp_micros() as f64 / 1e6
    }
}

/// One line of the event log
#[derive(Debug, Clone, PartialEq)]
pub struct RunEvent {
    /// Seconds, never smaller than the previous event's
    pub timestamp: f64,
    /// Event name
    pub name: String,
}

#[derive(Debug, Default)]
struct LogState {
    last_timestamp: f64,
    events: Vec<RunEvent>,
}

/// Serialized writer for the run event log
pub struct EventLog {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    state: Mutex<LogState>,
}

impl EventLog {
    /// Backs up any previous log at `path` and writes a fresh header.
    ///
    /// A previous log that cannot be moved aside is left untouched and this
    /// run writes to a sibling file instead. Other failures are logged; the
    /// returned log still accepts events and retries the file on every append.
    pub fn create(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Self {
        Self::create_with_backup(path, clock, backup_file_if_exists)
    }

    fn create_with_backup(
        path: impl AsRef<Path>,
        clock: Arc<dyn Clock>,
        backup: impl FnOnce(&Path) -> io::Result<Option<PathBuf>>,
    ) -> Self {
        let requested = path.as_ref().to_path_buf();

        let path = match backup(&requested) {
            Ok(Some(moved)) => {
                info!("Backed up previous event log to {}", moved.display());
                requested
            }
            Ok(None) => requested,
            Err(e) => {
                let fallback = unused_sibling(&requested, "new");
                error!(
                    "Could not back up event log {}: {}; writing this run to {}",
                    requested.display(),
                    e,
                    fallback.display()
                );
                fallback
            }
        };
        if let Err(e) = fs::write(&path, format!("{}\n", EVENT_LOG_HEADER)) {
            error!("Could not write header to event log {}: {}", path.display(), e);
        }

        EventLog {
            path,
            clock,
            state: Mutex::new(LogState::default()),
        }
    }

    /// Path of the CSV file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records a lifecycle event
    pub fn record(&self, kind: RunEventKind) -> RunEvent {
        self.write_event(kind)
    }

    /// Appends `event` with the current time
    pub fn write_event(&self, event: impl Display) -> RunEvent {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let timestamp = self.clock.now().max(state.last_timestamp);
        state.last_timestamp = timestamp;
        let event = RunEvent {
            timestamp,
            name: event.to_string(),
        };
        info!("t: {}, event: {}", event.timestamp, event.name);

        if let Err(e) = self.append_line(&event) {
            error!(
                "Could not write event to {}: {} {} ({})",
                self.path.display(),
                event.timestamp,
                event.name,
                e
            );
        }

        state.events.push(event.clone());
        event
    }

    /// Events recorded so far, in order
    pub fn events(&self) -> Vec<RunEvent> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .events
            .clone()
    }

    /// Names of the events recorded so far
    pub fn event_names(&self) -> Vec<String> {
        self.events().into_iter().map(|event| event.name).collect()
    }

    fn append_line(&self, event: &RunEvent) -> io::Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        writeln!(file, "{}, {}", event.timestamp, event.name)
    }
}

/// Renames an existing file to `<name>.backup_<YYYYMMDD_HHMMSS>` so it is never overwritten.
///
/// Returns the backup path, or `None` when there was nothing to back up.
pub fn backup_file_if_exists(path: &Path) -> io::Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }

    let backup = unused_sibling(path, "backup");
    fs::rename(path, &backup)?;
    Ok(Some(backup))
}

/// `<name>.<tag>_<YYYYMMDD_HHMMSS>` next to `path`, with a numeric suffix if taken
fn unused_sibling(path: &Path, tag: &str) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stamp = Local::now().format("%Y%m%d_%H%M%S");

    let mut candidate = path.with_file_name(format!("{}.{}_{}", file_name, tag, stamp));
    let mut suffix = 1;
    while candidate.exists() {
        candidate = path.with_file_name(format!("{}.{}_{}_{}", file_name, tag, stamp, suffix));
        suffix += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Clock stepping backwards to check timestamp clamping
    struct ScriptedClock {
        ticks: AtomicU64,
    }

    impl Clock for ScriptedClock {
        fn now(&self) -> f64 {
            let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
            [10.0, 12.5, 11.0][tick as usize % 3]
        }
    }

    #[test]
    fn test_header_and_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_events.csv");
        let clock = Arc::new(ScriptedClock {
            ticks: AtomicU64::new(0),
        });

        let log = EventLog::create(&path, clock);
        log.record(RunEventKind::RunStart);
        log.record(RunEventKind::TargetPoseSet);
        log.write_event("custom_marker");

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(
            lines,
            vec![
                "timestamp, event",
                "10, run_start",
                "12.5, target_pose_set",
                "12.5, custom_marker",
            ]
        );
        assert_eq!(log.event_names(), vec!["run_start", "target_pose_set", "custom_marker"]);
    }

    #[test]
    fn test_previous_log_is_backed_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_events.csv");
        fs::write(&path, "timestamp, event\n1, old_run\n").unwrap();

        let log = EventLog::create(&path, Arc::new(SystemClock));
        log.record(RunEventKind::RunStart);

        let backups: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().contains(".backup_"))
            .collect();
        assert_eq!(backups.len(), 1);
        let old = fs::read_to_string(backups[0].path()).unwrap();
        assert!(old.contains("old_run"));
        assert!(!fs::read_to_string(&path).unwrap().contains("old_run"));
    }

    #[test]
    fn test_failed_backup_keeps_previous_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_events.csv");
        fs::write(&path, "timestamp, event\n1, old_run\n").unwrap();

        let log = EventLog::create_with_backup(&path, Arc::new(SystemClock), |_| {
            Err(io::Error::other("permission denied"))
        });
        log.record(RunEventKind::RunStart);

        assert_eq!(fs::read_to_string(&path).unwrap(), "timestamp, event\n1, old_run\n");
        assert_ne!(log.path(), path.as_path());
        let name = log.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("run_events.csv.new_"));
        let fresh = fs::read_to_string(log.path()).unwrap();
        assert!(fresh.starts_with(EVENT_LOG_HEADER));
        assert!(fresh.contains("run_start"));
    }

    #[test]
    fn test_write_failure_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing_dir").join("run_events.csv");

        let log = EventLog::create(&path, Arc::new(SystemClock));
        let event = log.record(RunEventKind::RunCompleted);
        assert_eq!(event.name, "run_completed");
        assert_eq!(log.events().len(), 1);
    }
}
