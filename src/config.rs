use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::input_validation::validate_interval_minutes;
use crate::logging::DEFAULT_MAX_LOG_LINES;
use crate::scheduler::DEFAULT_INTERVAL_MINUTES;

pub const DEFAULT_LAST_BACKUP_FILE: &str = "last_backup.txt";

/// User settings, stored as YAML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub source: Option<PathBuf>,
    pub destination: Option<PathBuf>,
    pub interval_minutes: u64,
    pub last_backup_file: PathBuf,
    pub max_log_lines: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source: None,
            destination: None,
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            last_backup_file: PathBuf::from(DEFAULT_LAST_BACKUP_FILE),
            max_log_lines: DEFAULT_MAX_LOG_LINES,
        }
    }
}

impl AppConfig {
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let config: AppConfig = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;
        let yaml = serde_yaml::to_string(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, yaml).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let minutes = i64::try_from(self.interval_minutes).unwrap_or(i64::MAX);
        validate_interval_minutes(minutes)?;
        Ok(())
    }
}
