use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One synchronize request. Built by the caller per invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncTask {
    pub source_root: PathBuf,
    pub dest_root: PathBuf,
}

impl SyncTask {
    pub fn new(source_root: impl Into<PathBuf>, dest_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            dest_root: dest_root.into(),
        }
    }
}

/// Outcome of comparing a source file with its destination counterpart.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FileDecision {
    CopyNew,
    CopyUpdated,
    SkipUnchanged,
}

impl FileDecision {
    pub fn is_copy(self) -> bool {
        !matches!(self, FileDecision::SkipUnchanged)
    }

    pub fn label(self) -> &'static str {
        match self {
            FileDecision::CopyNew => "Copy-New",
            FileDecision::CopyUpdated => "Copy-Updated",
            FileDecision::SkipUnchanged => "Skip-Unchanged",
        }
    }
}

/// A copy that was performed (or, in a dry run, would be performed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncAction {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub decision: FileDecision,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SyncErrorKind {
    ReadFailed,
    CreateDirFailed,
    CopyFailed,
    PreserveTimeFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncFailure {
    pub path: PathBuf,
    pub kind: SyncErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub task: SyncTask,
    pub actions: Vec<SyncAction>,
    pub failures: Vec<SyncFailure>,
    pub files_skipped: u64,
    pub dirs_created: u64,
    pub bytes_copied: u64,
    pub started_at: chrono::DateTime<chrono::Local>,
    pub finished_at: chrono::DateTime<chrono::Local>,
}

impl SyncReport {
    pub fn count(&self, decision: FileDecision) -> usize {
        self.actions.iter().filter(|a| a.decision == decision).count()
    }

    pub fn files_copied(&self) -> usize {
        self.actions.len()
    }

    /// True when no file or directory failed during the pass.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DryRunResult {
    pub planned: Vec<SyncAction>,
    /// Entries that could not be compared; they count toward `total_files`
    pub failures: Vec<SyncFailure>,
    pub total_files: usize,
    pub files_unchanged: usize,
    pub bytes_to_copy: u64,
}

/// Reported after each completed copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncProgress {
    pub files_done: u64,
    pub bytes_copied: u64,
    pub current_file: Option<String>,
}
