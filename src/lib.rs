pub mod config;
pub mod error;
pub mod error_codes;
pub mod event_sink;
pub mod input_validation;
pub mod last_backup;
pub mod logging;
pub mod monitor;
pub mod path_validation;
pub mod scheduler;
pub mod sync_engine;
pub mod system_integration;
pub mod watcher;


pub use config::AppConfig;
pub use error::{ConfigError, IntervalError, PathError, SchedulerError, SyncError, WatchError};
pub use event_sink::{ChannelSink, EventSink, NullSink, SinkMessage};
pub use last_backup::LastBackupStore;
pub use logging::LogManager;
pub use monitor::BackupMonitor;
pub use scheduler::{BackupScheduler, ScheduleState, SchedulerOptions, StartOutcome};
pub use sync_engine::{FileDecision, SyncEngine, SyncReport, SyncTask};
pub use system_integration::{DiskMonitor, DiskUsage};
pub use watcher::{ChangeEvent, ChangeKind, WatchHandle, WatchStart, WatcherManager};
