use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Shown when no backup has completed yet
pub const NO_BACKUP_YET: &str = "No backup yet";

/// Single text record holding the last completed backup time.
#[derive(Debug, Clone)]
pub struct LastBackupStore {
    path: PathBuf,
}

impl LastBackupStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrites the record. Goes through a temp file in the same directory
    /// so a reader never sees a half-written timestamp.
    pub fn save(&self, at: DateTime<Local>) -> std::io::Result<String> {
        let stamp = at.format(TIMESTAMP_FORMAT).to_string();

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(stamp.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        Ok(stamp)
    }

    /// `Ok(None)` when no backup has been recorded yet.
    pub fn load(&self) -> std::io::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let trimmed = content.trim();
                if trimmed.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(trimmed.to_string()))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Text for the "Last Backup on" display.
    pub fn display_text(&self) -> String {
        match self.load() {
            Ok(Some(stamp)) => stamp,
            _ => NO_BACKUP_YET.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_missing_record_is_no_backup_yet() {
        let dir = TempDir::new().unwrap();
        let store = LastBackupStore::new(dir.path().join("last_backup.txt"));
        assert_eq!(store.load().unwrap(), None);
        assert_eq!(store.display_text(), "No backup yet");
    }

    #[test]
    fn test_save_overwrites_previous_value() {
        let dir = TempDir::new().unwrap();
        let store = LastBackupStore::new(dir.path().join("last_backup.txt"));

        let first = Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let second = Local.with_ymd_and_hms(2024, 6, 7, 8, 9, 10).unwrap();

        assert_eq!(store.save(first).unwrap(), "2024-01-02 03:04:05");
        store.save(second).unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw, "2024-06-07 08:09:10");
        assert_eq!(store.display_text(), "2024-06-07 08:09:10");
    }

    #[test]
    fn test_save_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let store = LastBackupStore::new(dir.path().join("state/nested/last_backup.txt"));
        store.save(Local::now()).unwrap();
        assert!(store.load().unwrap().is_some());
    }
}
