//! 파일 시스템 감시 관리 모듈
//!
//! 소스 루트 아래의 파일 생성/수정 이벤트를 구독하고, 파일별 변경 기록을
//! EventSink로 전달합니다. 백업 스케줄러와는 독립적으로 동작합니다.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Local};
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::WatchError;
use crate::event_sink::EventSink;
use crate::path_validation;

/// How often the consumer thread re-checks cancellation and the root
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeKind {
    Created,
    Modified,
}

impl ChangeKind {
    pub fn status(self) -> &'static str {
        match self {
            ChangeKind::Created => "New",
            ChangeKind::Modified => "Modified",
        }
    }

    fn from_event_kind(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(ChangeKind::Created),
            // Renames are neither a creation nor a content change
            EventKind::Modify(ModifyKind::Name(_)) => None,
            EventKind::Modify(_) => Some(ChangeKind::Modified),
            _ => None,
        }
    }
}

/// One observed file change (감시 이벤트 정보)
#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub size_bytes: u64,
    /// Leading dot included, empty when the file has none
    pub extension: String,
    pub modified_at: DateTime<Local>,
}

impl ChangeEvent {
    /// Stats `path`. `Ok(None)` for directories.
    pub fn from_path(path: &Path, kind: ChangeKind) -> std::io::Result<Option<Self>> {
        let meta = std::fs::metadata(path)?;
        if meta.is_dir() {
            return Ok(None);
        }

        let extension = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        Ok(Some(Self {
            path: path.to_path_buf(),
            kind,
            size_bytes: meta.len(),
            extension,
            modified_at: DateTime::<Local>::from(meta.modified()?),
        }))
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn format_row(&self) -> String {
        let ext = if self.extension.is_empty() {
            "-"
        } else {
            self.extension.as_str()
        };
        format!(
            "{:<30} | {:<9} | {:<6} | {:<9} | {}",
            self.file_name(),
            self.kind.status(),
            ext,
            format_size(self.size_bytes),
            self.modified_at.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// Table header emitted once when a watch starts.
pub fn header_lines() -> [String; 2] {
    [
        format!(
            "{:<30} | {:<9} | {:<6} | {:<9} | {}",
            "Name", "Status", "Kind", "Size", "Date Modified"
        ),
        "-".repeat(80),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchHandle {
    root: PathBuf,
}

impl WatchHandle {
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchStart {
    Started(WatchHandle),
    AlreadyMonitoring(WatchHandle),
}

impl WatchStart {
    pub fn handle(&self) -> &WatchHandle {
        match self {
            WatchStart::Started(handle) | WatchStart::AlreadyMonitoring(handle) => handle,
        }
    }
}

/// 단일 루트의 Watcher 정보
struct RootWatcher {
    watcher: Option<RecommendedWatcher>,
    cancellation_token: CancellationToken,
    consumer: Option<thread::JoinHandle<()>>,
    active: Arc<AtomicBool>,
}

impl RootWatcher {
    /// Cancels the subscription, then waits for the consumer so nothing is
    /// delivered after this returns.
    fn shutdown(&mut self) {
        self.cancellation_token.cancel();
        // Dropping the watcher removes the OS subscription
        self.watcher.take();
        if let Some(consumer) = self.consumer.take() {
            let _ = consumer.join();
        }
        self.active.store(false, Ordering::SeqCst);
    }
}

impl Drop for RootWatcher {
    fn drop(&mut self) {
        // Don't wait in Drop, the consumer exits on its own
        self.cancellation_token.cancel();
    }
}

/// 여러 루트의 Watcher를 관리하는 매니저
pub struct WatcherManager {
    watchers: HashMap<PathBuf, RootWatcher>,
    sink: Arc<dyn EventSink>,
}

impl WatcherManager {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            watchers: HashMap::new(),
            sink,
        }
    }

    fn key_for(root: &Path) -> PathBuf {
        std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf())
    }

    /// 지정한 루트에 대한 재귀 감시를 시작합니다.
    pub fn start_watching(&mut self, root: &Path) -> Result<WatchStart, WatchError> {
        if let Err(e) = path_validation::validate_source(root) {
            self.sink.append_line(&e.to_string());
            return Err(e.into());
        }

        let key = Self::key_for(root);
        let handle = WatchHandle { root: key.clone() };

        if let Some(existing) = self.watchers.get_mut(&key) {
            if existing.active.load(Ordering::SeqCst) {
                self.sink.append_line("Watchdog is already running.");
                return Ok(WatchStart::AlreadyMonitoring(handle));
            }
            // A watch that died on its own needs a fresh subscription
            existing.shutdown();
            self.watchers.remove(&key);
        }

        let (tx, rx) = mpsc::channel::<notify::Result<Event>>();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // Receiver only goes away during shutdown
            let _ = tx.send(res);
        })
        .map_err(|source| self.subscribe_failed(&key, source))?;

        watcher
            .watch(&key, RecursiveMode::Recursive)
            .map_err(|source| self.subscribe_failed(&key, source))?;

        for line in header_lines() {
            self.sink.append_line(&line);
        }

        let cancellation_token = CancellationToken::new();
        let active = Arc::new(AtomicBool::new(true));
        let consumer = {
            let token = cancellation_token.clone();
            let active = Arc::clone(&active);
            let sink = Arc::clone(&self.sink);
            let root = key.clone();
            thread::Builder::new()
                .name("tree-watcher".to_string())
                .spawn(move || consume_events(root, rx, token, active, sink))
                .map_err(|e| WatchError::Subscribe {
                    path: key.clone(),
                    source: notify::Error::io(e),
                })?
        };

        self.watchers.insert(
            key.clone(),
            RootWatcher {
                watcher: Some(watcher),
                cancellation_token,
                consumer: Some(consumer),
                active,
            },
        );

        self.sink.append_line("Watchdog monitoring started.");
        Ok(WatchStart::Started(handle))
    }

    fn subscribe_failed(&self, root: &Path, source: notify::Error) -> WatchError {
        let err = WatchError::Subscribe {
            path: root.to_path_buf(),
            source,
        };
        self.sink.append_line(&err.to_string());
        err
    }

    /// 감시를 중지합니다. Blocks until the consumer thread has exited.
    pub fn stop_watching(&mut self, handle: &WatchHandle) -> bool {
        let Some(mut watcher) = self.watchers.remove(&handle.root) else {
            return false;
        };
        watcher.shutdown();
        self.sink.append_line("Watchdog monitoring stopped.");
        true
    }

    /// False once stopped, or after the watch died (e.g. root removed).
    pub fn is_watching(&self, root: &Path) -> bool {
        self.watchers
            .get(&Self::key_for(root))
            .is_some_and(|w| w.active.load(Ordering::SeqCst))
    }

    pub fn watching_roots(&self) -> Vec<PathBuf> {
        self.watchers
            .iter()
            .filter(|(_, w)| w.active.load(Ordering::SeqCst))
            .map(|(root, _)| root.clone())
            .collect()
    }

    /// 모든 감시를 중지합니다.
    pub fn stop_all(&mut self) {
        for (_, mut watcher) in self.watchers.drain() {
            watcher.shutdown();
        }
    }
}

impl Drop for WatcherManager {
    fn drop(&mut self) {
        self.stop_all();
    }
}

/// Runs on its own thread: turns raw notifications into table rows in the
/// order the OS delivered them.
fn consume_events(
    root: PathBuf,
    rx: mpsc::Receiver<notify::Result<Event>>,
    token: CancellationToken,
    active: Arc<AtomicBool>,
    sink: Arc<dyn EventSink>,
) {
    loop {
        if token.is_cancelled() {
            break;
        }

        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(Ok(event)) => {
                if root_removed(&root, &event) {
                    report_root_lost(&root, sink.as_ref());
                    break;
                }
                let Some(kind) = ChangeKind::from_event_kind(&event.kind) else {
                    continue;
                };
                for path in &event.paths {
                    let line = match ChangeEvent::from_path(path, kind) {
                        Ok(Some(change)) => change.format_row(),
                        Ok(None) => continue,
                        Err(e) => format!("Error accessing {}: {e}", path.display()),
                    };
                    if token.is_cancelled() {
                        return;
                    }
                    sink.append_line(&line);
                }
            }
            Ok(Err(e)) => {
                if !root.is_dir() {
                    report_root_lost(&root, sink.as_ref());
                } else {
                    sink.append_line(&format!("Watch error: {e}. Monitoring stopped."));
                }
                break;
            }
            Err(RecvTimeoutError::Timeout) => {
                if !root.is_dir() {
                    report_root_lost(&root, sink.as_ref());
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    active.store(false, Ordering::SeqCst);
}

fn root_removed(root: &Path, event: &Event) -> bool {
    matches!(event.kind, EventKind::Remove(_))
        && event.paths.iter().any(|p| p == root)
        && !root.is_dir()
}

fn report_root_lost(root: &Path, sink: &dyn EventSink) {
    let err = WatchError::RootLost(root.to_path_buf());
    sink.append_line(&format!("{err}. Monitoring stopped."));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogManager;
    use std::fs;
    use std::time::Instant;
    use tempfile::tempdir;

    fn wait_for(log: &LogManager, pred: impl Fn(&str) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if log.lines().iter().any(|l| pred(l)) {
                return true;
            }
            thread::sleep(Duration::from_millis(25));
        }
        false
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_change_event_row() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Makefile");
        fs::write(&path, vec![0u8; 2048]).unwrap();

        let change = ChangeEvent::from_path(&path, ChangeKind::Created)
            .unwrap()
            .unwrap();
        assert_eq!(change.extension, "");
        assert_eq!(change.size_bytes, 2048);

        let row = change.format_row();
        let columns: Vec<&str> = row.split(" | ").map(str::trim).collect();
        assert_eq!(columns[0], "Makefile");
        assert_eq!(columns[1], "New");
        assert_eq!(columns[2], "-");
        assert_eq!(columns[3], "2.0 KB");
        assert_eq!(columns[4].len(), "2024-01-01 00:00:00".len());
    }

    #[test]
    fn test_change_event_skips_directories() {
        let dir = tempdir().unwrap();
        assert!(ChangeEvent::from_path(dir.path(), ChangeKind::Modified)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_event_kind_mapping() {
        use notify::event::{AccessKind, CreateKind, DataChange, RemoveKind, RenameMode};

        assert_eq!(
            ChangeKind::from_event_kind(&EventKind::Create(CreateKind::File)),
            Some(ChangeKind::Created)
        );
        assert_eq!(
            ChangeKind::from_event_kind(&EventKind::Modify(ModifyKind::Data(DataChange::Any))),
            Some(ChangeKind::Modified)
        );
        assert_eq!(
            ChangeKind::from_event_kind(&EventKind::Modify(ModifyKind::Name(RenameMode::Any))),
            None
        );
        assert_eq!(ChangeKind::from_event_kind(&EventKind::Remove(RemoveKind::File)), None);
        assert_eq!(ChangeKind::from_event_kind(&EventKind::Access(AccessKind::Any)), None);
    }

    #[test]
    fn test_start_stop_watching() {
        let log = Arc::new(LogManager::new(1000));
        let mut manager = WatcherManager::new(log.clone());
        let temp = tempdir().unwrap();

        let started = manager.start_watching(temp.path()).unwrap();
        assert!(matches!(started, WatchStart::Started(_)));
        assert!(manager.is_watching(temp.path()));
        assert_eq!(manager.watching_roots().len(), 1);

        let lines = log.lines();
        assert!(lines[0].starts_with("Name"));
        assert!(lines[1].starts_with("-----"));

        let again = manager.start_watching(temp.path()).unwrap();
        assert!(matches!(again, WatchStart::AlreadyMonitoring(_)));
        assert!(log.lines().iter().any(|l| l == "Watchdog is already running."));
        // Header only once
        assert_eq!(log.lines().iter().filter(|l| l.starts_with("Name")).count(), 1);

        assert!(manager.stop_watching(started.handle()));
        assert!(!manager.is_watching(temp.path()));
        assert!(!manager.stop_watching(started.handle()));
    }

    #[test]
    fn test_reports_created_files() {
        let log = Arc::new(LogManager::new(1000));
        let mut manager = WatcherManager::new(log.clone());
        let temp = tempdir().unwrap();
        let handle = manager.start_watching(temp.path()).unwrap().handle().clone();

        fs::create_dir(temp.path().join("subdir_marker")).unwrap();
        fs::write(temp.path().join("notes.md"), "content").unwrap();

        assert!(wait_for(&log, |l| l.starts_with("notes.md") && l.contains("| .md")));
        assert!(!log.lines().iter().any(|l| l.starts_with("subdir_marker")));

        manager.stop_watching(&handle);
    }

    #[test]
    fn test_nothing_delivered_after_stop() {
        let log = Arc::new(LogManager::new(10_000));
        let mut manager = WatcherManager::new(log.clone());
        let temp = tempdir().unwrap();
        let handle = manager.start_watching(temp.path()).unwrap().handle().clone();

        // Keep events in flight while stopping
        let writer_root = temp.path().to_path_buf();
        let writer = thread::spawn(move || {
            for i in 0..200 {
                let _ = fs::write(writer_root.join(format!("burst_{i}.txt")), "x");
            }
        });
        thread::sleep(Duration::from_millis(20));
        manager.stop_watching(&handle);
        let count_at_stop = log.lines().len();

        writer.join().unwrap();
        fs::write(temp.path().join("late.txt"), "late").unwrap();
        thread::sleep(Duration::from_millis(400));

        assert_eq!(log.lines().len(), count_at_stop);
        assert!(!log.lines().iter().any(|l| l.starts_with("late.txt")));
    }

    #[test]
    fn test_root_removal_is_reported_and_stops_watch() {
        let log = Arc::new(LogManager::new(1000));
        let mut manager = WatcherManager::new(log.clone());
        let parent = tempdir().unwrap();
        let root = parent.path().join("watched");
        fs::create_dir(&root).unwrap();

        manager.start_watching(&root).unwrap();
        fs::remove_dir_all(&root).unwrap();

        assert!(wait_for(&log, |l| l.starts_with("Watch root lost")));
        let deadline = Instant::now() + Duration::from_secs(2);
        while manager.is_watching(&root) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        assert!(!manager.is_watching(&root));
        assert!(manager.watching_roots().is_empty());
    }

    #[test]
    fn test_backend_error_stops_watch() {
        let log = Arc::new(LogManager::new(100));
        let temp = tempdir().unwrap();
        let (tx, rx) = mpsc::channel::<notify::Result<Event>>();
        let active = Arc::new(AtomicBool::new(true));

        tx.send(Err(notify::Error::generic("event queue overflow"))).unwrap();
        consume_events(
            temp.path().to_path_buf(),
            rx,
            CancellationToken::new(),
            Arc::clone(&active),
            log.clone(),
        );

        assert!(!active.load(Ordering::SeqCst));
        assert!(log
            .lines()
            .iter()
            .any(|l| l.starts_with("Watch error:") && l.ends_with("Monitoring stopped.")));
        // Queued events after the error are not consumed
        assert!(tx.send(Err(notify::Error::generic("late"))).is_err());
    }

    #[test]
    fn test_errored_watch_needs_explicit_restart() {
        let log = Arc::new(LogManager::new(1000));
        let mut manager = WatcherManager::new(log.clone());
        let temp = tempdir().unwrap();
        let key = WatcherManager::key_for(temp.path());

        manager.start_watching(temp.path()).unwrap();
        // Simulate the consumer having exited on a backend error
        manager.watchers.get(&key).unwrap().active.store(false, Ordering::SeqCst);
        assert!(!manager.is_watching(temp.path()));

        let restarted = manager.start_watching(temp.path()).unwrap();
        assert!(matches!(restarted, WatchStart::Started(_)));
        assert!(manager.is_watching(temp.path()));
        manager.stop_watching(restarted.handle());
    }

    #[test]
    fn test_invalid_root_is_rejected() {
        let log = Arc::new(LogManager::new(100));
        let mut manager = WatcherManager::new(log.clone());
        let temp = tempdir().unwrap();

        let err = manager.start_watching(&temp.path().join("missing")).unwrap_err();
        assert_eq!(err.code(), "ERR_INVALID_SOURCE");
        assert!(log.lines().iter().any(|l| l.starts_with("Invalid source path")));
    }
}
