use crate::event_sink::EventSink;
use crate::sync_engine::lock::PairLocks;
use crate::sync_engine::types::{
    DryRunResult, FileDecision, SyncAction, SyncErrorKind, SyncFailure, SyncProgress, SyncReport,
    SyncTask,
};
use crate::error::SyncError;
use filetime::FileTime;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use walkdir::{DirEntry, WalkDir};

/// Newer-wins comparison. Absent destination means new; otherwise the
/// source must be strictly newer to be copied.
pub fn decide(source_mtime: FileTime, dest_mtime: Option<FileTime>) -> FileDecision {
    match dest_mtime {
        None => FileDecision::CopyNew,
        Some(dest) if source_mtime > dest => FileDecision::CopyUpdated,
        Some(_) => FileDecision::SkipUnchanged,
    }
}

fn log_verb(decision: FileDecision) -> &'static str {
    match decision {
        FileDecision::CopyNew => "Copied new file",
        FileDecision::CopyUpdated => "Updated file",
        FileDecision::SkipUnchanged => "Unchanged",
    }
}

/// Incremental tree copier. Never deletes anything in the destination.
pub struct SyncEngine {
    task: SyncTask,
    locks: Arc<PairLocks>,
}

impl SyncEngine {
    pub fn new(source: PathBuf, target: PathBuf) -> Self {
        Self::with_locks(SyncTask::new(source, target), Arc::new(PairLocks::new()))
    }

    /// Engines that share `locks` serialize passes over the same pair.
    pub fn with_locks(task: SyncTask, locks: Arc<PairLocks>) -> Self {
        Self { task, locks }
    }

    pub fn task(&self) -> &SyncTask {
        &self.task
    }

    fn dest_for(&self, source_path: &Path) -> Option<PathBuf> {
        let relative = source_path.strip_prefix(&self.task.source_root).ok()?;
        Some(self.task.dest_root.join(relative))
    }

    /// Walks the source tree, skipping the destination subtree when it is
    /// nested inside the source.
    fn walker(
        &self,
    ) -> walkdir::FilterEntry<walkdir::IntoIter, impl FnMut(&DirEntry) -> bool> {
        let nested_dest = nested_destination(&self.task.source_root, &self.task.dest_root);
        WalkDir::new(&self.task.source_root)
            .follow_links(false)
            .into_iter()
            .filter_entry(move |entry| match &nested_dest {
                Some(skip) => entry.path() != skip.as_path(),
                None => true,
            })
    }

    async fn plan_file(&self, entry: &DirEntry) -> std::io::Result<(SyncAction, FileTime)> {
        let source_meta = entry.metadata().map_err(std::io::Error::from)?;
        let source_mtime = FileTime::from_last_modification_time(&source_meta);
        let destination = self.dest_for(entry.path()).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "path outside source root")
        })?;

        let dest_mtime = match fs::metadata(&destination).await {
            Ok(meta) => Some(FileTime::from_last_modification_time(&meta)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e),
        };

        let action = SyncAction {
            source: entry.path().to_path_buf(),
            destination,
            decision: decide(source_mtime, dest_mtime),
            size: source_meta.len(),
        };
        Ok((action, FileTime::from_last_access_time(&source_meta)))
    }

    /// Computes what a synchronize call would copy without touching the
    /// destination.
    pub async fn dry_run(&self) -> Result<DryRunResult, SyncError> {
        self.ensure_source_root()?;

        let mut result = DryRunResult {
            planned: Vec::new(),
            failures: Vec::new(),
            total_files: 0,
            files_unchanged: 0,
            bytes_to_copy: 0,
        };

        for entry in self.walker() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => return Err(walk_error(&self.task.source_root, e)),
                Err(e) => {
                    result.failures.push(SyncFailure {
                        path: e.path().map(Path::to_path_buf).unwrap_or_default(),
                        kind: SyncErrorKind::ReadFailed,
                        message: e.to_string(),
                    });
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            result.total_files += 1;
            let action = match self.plan_file(&entry).await {
                Ok((action, _)) => action,
                Err(e) => {
                    result.failures.push(SyncFailure {
                        path: entry.path().to_path_buf(),
                        kind: SyncErrorKind::ReadFailed,
                        message: e.to_string(),
                    });
                    continue;
                }
            };
            if action.decision.is_copy() {
                result.bytes_to_copy += action.size;
                result.planned.push(action);
            } else {
                result.files_unchanged += 1;
            }
        }

        Ok(result)
    }

    pub async fn synchronize(&self, sink: &dyn EventSink) -> Result<SyncReport, SyncError> {
        self.synchronize_with_progress(sink, |_| {}).await
    }

    /// Mirrors the source tree into the destination.
    ///
    /// Per-file failures are collected into the report and the walk goes on.
    /// Only an unreadable source root aborts the pass.
    pub async fn synchronize_with_progress<F>(
        &self,
        sink: &dyn EventSink,
        progress: F,
    ) -> Result<SyncReport, SyncError>
    where
        F: Fn(SyncProgress) + Send + Sync,
    {
        self.ensure_source_root()?;
        let _guard = self.locks.acquire(&self.task).await;

        let mut report = SyncReport {
            task: self.task.clone(),
            actions: Vec::new(),
            failures: Vec::new(),
            files_skipped: 0,
            dirs_created: 0,
            bytes_copied: 0,
            started_at: chrono::Local::now(),
            finished_at: chrono::Local::now(),
        };

        let mut walker = self.walker();
        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => return Err(walk_error(&self.task.source_root, e)),
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    record_failure(sink, &mut report, path, SyncErrorKind::ReadFailed, e.to_string());
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                let Some(dest_dir) = self.dest_for(entry.path()) else {
                    continue;
                };
                if fs::metadata(&dest_dir).await.is_ok() {
                    continue;
                }
                match fs::create_dir_all(&dest_dir).await {
                    Ok(()) => report.dirs_created += 1,
                    Err(e) => {
                        record_failure(
                            sink,
                            &mut report,
                            dest_dir,
                            SyncErrorKind::CreateDirFailed,
                            e.to_string(),
                        );
                        // Nothing below can land without its directory
                        walker.skip_current_dir();
                    }
                }
                continue;
            }

            if !entry.file_type().is_file() {
                continue;
            }

            let (action, source_atime) = match self.plan_file(&entry).await {
                Ok(planned) => planned,
                Err(e) => {
                    record_failure(
                        sink,
                        &mut report,
                        entry.path().to_path_buf(),
                        SyncErrorKind::ReadFailed,
                        e.to_string(),
                    );
                    continue;
                }
            };

            if !action.decision.is_copy() {
                report.files_skipped += 1;
                continue;
            }

            if let Err((kind, e)) = copy_preserving_times(&action, source_atime).await {
                record_failure(sink, &mut report, action.source.clone(), kind, e.to_string());
                continue;
            }

            sink.append_line(&format!(
                "{}: {} → {}",
                log_verb(action.decision),
                action.source.display(),
                action.destination.display()
            ));
            report.bytes_copied += action.size;
            let current_file = action
                .source
                .file_name()
                .map(|n| n.to_string_lossy().to_string());
            report.actions.push(action);

            progress(SyncProgress {
                files_done: report.actions.len() as u64,
                bytes_copied: report.bytes_copied,
                current_file,
            });
        }

        report.finished_at = chrono::Local::now();
        Ok(report)
    }

    fn ensure_source_root(&self) -> Result<(), SyncError> {
        match std::fs::metadata(&self.task.source_root) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(SyncError::InvalidRoot(self.task.source_root.clone())),
            Err(e) => Err(SyncError::Io(e)),
        }
    }
}

/// Copies content, then stamps the destination with the source times so the
/// next pass sees it as unchanged.
async fn copy_preserving_times(
    action: &SyncAction,
    source_atime: FileTime,
) -> Result<(), (SyncErrorKind, std::io::Error)> {
    let source_meta = fs::metadata(&action.source)
        .await
        .map_err(|e| (SyncErrorKind::ReadFailed, e))?;

    fs::copy(&action.source, &action.destination)
        .await
        .map_err(|e| (SyncErrorKind::CopyFailed, e))?;

    let mtime = FileTime::from_last_modification_time(&source_meta);
    filetime::set_file_times(&action.destination, source_atime, mtime)
        .map_err(|e| (SyncErrorKind::PreserveTimeFailed, e))?;

    Ok(())
}

fn record_failure(
    sink: &dyn EventSink,
    report: &mut SyncReport,
    path: PathBuf,
    kind: SyncErrorKind,
    message: String,
) {
    sink.append_line(&format!("Failed to sync {}: {}", path.display(), message));
    report.failures.push(SyncFailure { path, kind, message });
}

fn walk_error(root: &Path, e: walkdir::Error) -> SyncError {
    SyncError::Walk {
        path: root.to_path_buf(),
        message: e.to_string(),
    }
}

/// Where the destination sits inside the source tree, expressed under the
/// source root as given, if it does.
fn nested_destination(source: &Path, dest: &Path) -> Option<PathBuf> {
    let source_c = std::fs::canonicalize(source).ok()?;
    let dest_c = std::fs::canonicalize(dest).ok()?;
    let relative = dest_c.strip_prefix(&source_c).ok()?;
    if relative.as_os_str().is_empty() {
        return None;
    }
    Some(source.join(relative))
}
