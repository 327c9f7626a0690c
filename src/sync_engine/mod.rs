pub mod engine;
pub mod lock;
pub mod types;

pub use engine::SyncEngine;
pub use lock::PairLocks;
pub use types::{
    DryRunResult, FileDecision, SyncAction, SyncFailure, SyncProgress, SyncReport, SyncTask,
};
