//! Ties the backup timer and the live watcher together behind the
//! start/stop/backup-now actions a front end exposes.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::AppConfig;
use crate::error::{IntervalError, PathError, SchedulerError};
use crate::event_sink::EventSink;
use crate::last_backup::LastBackupStore;
use crate::scheduler::{BackupScheduler, SchedulerOptions, StartOutcome};
use crate::sync_engine::{SyncReport, SyncTask};
use crate::system_integration::{DiskMonitor, DiskUsage};
use crate::watcher::{WatchHandle, WatcherManager};

pub struct BackupMonitor {
    scheduler: BackupScheduler,
    watcher_manager: Mutex<WatcherManager>,
    watch_handle: Mutex<Option<WatchHandle>>,
    disk_monitor: DiskMonitor,
    sink: Arc<dyn EventSink>,
}

impl BackupMonitor {
    pub fn new(
        task: SyncTask,
        options: SchedulerOptions,
        store: LastBackupStore,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            scheduler: BackupScheduler::new(task, options, store, Arc::clone(&sink)),
            watcher_manager: Mutex::new(WatcherManager::new(Arc::clone(&sink))),
            watch_handle: Mutex::new(None),
            disk_monitor: DiskMonitor::new(),
            sink,
        }
    }

    /// Both paths must be set in the config; they are validated later, on
    /// each action.
    pub fn from_config(config: &AppConfig, sink: Arc<dyn EventSink>) -> Result<Self, PathError> {
        let source = config
            .source
            .clone()
            .ok_or_else(|| PathError::InvalidSource(Default::default()))?;
        let destination = config
            .destination
            .clone()
            .ok_or_else(|| PathError::InvalidDestination(Default::default()))?;

        Ok(Self::new(
            SyncTask::new(source, destination),
            SchedulerOptions {
                interval_minutes: config.interval_minutes,
                ..SchedulerOptions::default()
            },
            LastBackupStore::new(config.last_backup_file.clone()),
            sink,
        ))
    }

    fn watcher_manager(&self) -> MutexGuard<'_, WatcherManager> {
        self.watcher_manager.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn watch_handle(&self) -> MutexGuard<'_, Option<WatchHandle>> {
        self.watch_handle.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn scheduler(&self) -> &BackupScheduler {
        &self.scheduler
    }

    pub fn task(&self) -> &SyncTask {
        self.scheduler.task()
    }

    /// Starts the countdown, then the watcher. A watcher that fails to start
    /// is reported but leaves the timer running.
    pub fn start_monitoring(&self) -> Result<StartOutcome, SchedulerError> {
        if self.scheduler.start()? == StartOutcome::AlreadyRunning {
            return Ok(StartOutcome::AlreadyRunning);
        }
        self.sink.append_line("Monitoring started.");

        let source = self.task().source_root.clone();
        if let Ok(started) = self.watcher_manager().start_watching(&source) {
            *self.watch_handle() = Some(started.handle().clone());
        }
        Ok(StartOutcome::Started)
    }

    /// Stops both activities. Returns once the watcher thread has exited.
    pub fn stop_monitoring(&self) {
        if self.scheduler.stop() {
            self.sink.append_line("Monitoring stopped.");
        }
        if let Some(handle) = self.watch_handle().take() {
            self.watcher_manager().stop_watching(&handle);
        }
    }

    pub async fn backup_now(&self) -> Result<SyncReport, SchedulerError> {
        self.scheduler.backup_now().await
    }

    pub fn update_interval_text(&self, input: &str) -> Result<(), IntervalError> {
        self.scheduler.update_interval_text(input)
    }

    pub fn is_watching(&self) -> bool {
        let handle = self.watch_handle().clone();
        handle.is_some_and(|h| self.watcher_manager().is_watching(h.root()))
    }

    pub fn countdown_text(&self) -> String {
        self.scheduler.countdown_text()
    }

    /// Refreshes the disk gauge and the last-backup display for the
    /// destination volume.
    pub fn select_destination(&self) -> Result<DiskUsage, PathError> {
        let usage = match self.disk_monitor.probe(&self.task().dest_root) {
            Ok(usage) => usage,
            Err(e) => {
                self.sink.append_line(&e.to_string());
                return Err(e);
            }
        };

        self.sink.set_progress(usage.percent_used());
        for line in usage.summary_lines() {
            self.sink.append_line(&line);
        }
        self.sink
            .append_line(&format!("Last Backup on: {}", self.scheduler.last_backup_text()));
        Ok(usage)
    }
}

impl Drop for BackupMonitor {
    fn drop(&mut self) {
        self.stop_monitoring();
    }
}
