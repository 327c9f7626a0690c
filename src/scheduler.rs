//! 백업 스케줄러
//!
//! 카운트다운 상태 머신(Stopped / Running / Paused)을 관리하고, 타이머 만료 또는
//! 수동 요청 시 동기화를 실행합니다.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::{IntervalError, SchedulerError};
use crate::event_sink::EventSink;
use crate::input_validation::{
    parse_interval_minutes, validate_interval_minutes, MAX_INTERVAL_MINUTES,
};
use crate::last_backup::LastBackupStore;
use crate::path_validation;
use crate::sync_engine::{PairLocks, SyncEngine, SyncReport, SyncTask};

pub const DEFAULT_INTERVAL_MINUTES: u64 = 10;

/// Renders a countdown as HH:MM:SS.
pub fn format_countdown(remaining_seconds: u64) -> String {
    let hours = remaining_seconds / 3600;
    let minutes = (remaining_seconds % 3600) / 60;
    let seconds = remaining_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulePhase {
    Stopped,
    Running,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not running, or frozen while a backup is in flight
    Idle,
    Counting,
    /// Countdown hit zero; the state is now paused until the backup ends
    Fire,
}

/// Countdown state. `remaining_seconds` stays within `0..=interval_seconds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScheduleState {
    pub interval_seconds: u64,
    pub remaining_seconds: u64,
    pub running: bool,
    pub paused: bool,
    #[serde(skip)]
    epoch: u64,
}

impl ScheduleState {
    pub fn new(interval_seconds: u64) -> Self {
        let interval_seconds = interval_seconds.max(1);
        Self {
            interval_seconds,
            remaining_seconds: interval_seconds,
            running: false,
            paused: false,
            epoch: 0,
        }
    }

    pub fn phase(&self) -> SchedulePhase {
        match (self.running, self.paused) {
            (false, _) => SchedulePhase::Stopped,
            (true, false) => SchedulePhase::Running,
            (true, true) => SchedulePhase::Paused,
        }
    }

    pub fn tick(&mut self) -> TickOutcome {
        if self.phase() != SchedulePhase::Running {
            return TickOutcome::Idle;
        }

        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.paused = true;
            TickOutcome::Fire
        } else {
            TickOutcome::Counting
        }
    }

    /// Back to a full countdown after a timer-triggered backup.
    pub fn finish_backup(&mut self) {
        self.remaining_seconds = self.interval_seconds;
        self.paused = false;
    }

    pub fn countdown_text(&self) -> String {
        format_countdown(self.remaining_seconds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub interval_minutes: u64,
    /// Wall time per tick. One second outside of tests.
    pub tick_period: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            tick_period: Duration::from_secs(1),
        }
    }
}

struct TickLoop {
    token: CancellationToken,
    _handle: JoinHandle<()>,
}

struct Shared {
    engine: SyncEngine,
    state: Mutex<ScheduleState>,
    store: LastBackupStore,
    sink: Arc<dyn EventSink>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, ScheduleState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn task(&self) -> &SyncTask {
        self.engine.task()
    }

    fn validate(&self) -> Result<(), SchedulerError> {
        let task = self.task();
        path_validation::validate(&task.source_root, &task.dest_root).map_err(|e| {
            self.sink.append_line(&e.to_string());
            SchedulerError::from(e)
        })
    }

    /// One full pass plus the record update. Passes over the same pair are
    /// serialized inside the engine.
    async fn perform_backup(&self) -> Result<SyncReport, SchedulerError> {
        let task = self.task();
        self.sink.append_line("Starting backup:");
        self.sink.append_line(&format!("  Source: {}", task.source_root.display()));
        self.sink.append_line(&format!("  Destination: {}", task.dest_root.display()));

        let report = match self.engine.synchronize(self.sink.as_ref()).await {
            Ok(report) => report,
            Err(e) => {
                self.sink.append_line(&format!("Backup failed: {e}"));
                return Err(e.into());
            }
        };

        if report.is_complete() {
            self.sink.append_line("Backup complete.");
        } else {
            self.sink.append_line(&format!(
                "Backup complete with {} failed item(s).",
                report.failures.len()
            ));
        }

        match self.store.save(report.finished_at) {
            Ok(stamp) => self.sink.append_line(&format!("Last backup on: {stamp}")),
            Err(e) => self.sink.append_line(&format!(
                "Failed to record backup time in {}: {e}",
                self.store.path().display()
            )),
        }

        Ok(report)
    }

    async fn run_scheduled_backup(&self, epoch: u64) {
        // Failures were already reported to the sink
        let _ = self.perform_backup().await;

        let mut state = self.state();
        if state.running && state.epoch == epoch {
            state.finish_backup();
        }
    }

    fn tick(&self, epoch: u64) -> TickOutcome {
        let mut state = self.state();
        if state.epoch != epoch {
            return TickOutcome::Idle;
        }
        state.tick()
    }
}

async fn run_tick_loop(
    shared: Arc<Shared>,
    token: CancellationToken,
    period: Duration,
    epoch: u64,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if shared.tick(epoch) == TickOutcome::Fire {
            shared.run_scheduled_backup(epoch).await;
            ticker.reset();
        }
    }
}

/// Drives periodic and manual backups for one source/destination pair.
pub struct BackupScheduler {
    shared: Arc<Shared>,
    tick_period: Duration,
    tick_loop: Mutex<Option<TickLoop>>,
}

impl BackupScheduler {
    pub fn new(
        task: SyncTask,
        options: SchedulerOptions,
        store: LastBackupStore,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self::with_locks(task, options, store, sink, Arc::new(PairLocks::new()))
    }

    /// Schedulers sharing `locks` never copy into the same pair at once.
    pub fn with_locks(
        task: SyncTask,
        options: SchedulerOptions,
        store: LastBackupStore,
        sink: Arc<dyn EventSink>,
        locks: Arc<PairLocks>,
    ) -> Self {
        let interval_seconds = options.interval_minutes.clamp(1, MAX_INTERVAL_MINUTES) * 60;
        Self {
            shared: Arc::new(Shared {
                engine: SyncEngine::with_locks(task, locks),
                state: Mutex::new(ScheduleState::new(interval_seconds)),
                store,
                sink,
            }),
            tick_period: options.tick_period,
            tick_loop: Mutex::new(None),
        }
    }

    fn tick_loop(&self) -> MutexGuard<'_, Option<TickLoop>> {
        self.tick_loop.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn task(&self) -> &SyncTask {
        self.shared.task()
    }

    pub fn snapshot(&self) -> ScheduleState {
        *self.shared.state()
    }

    pub fn countdown_text(&self) -> String {
        self.snapshot().countdown_text()
    }

    pub fn last_backup_text(&self) -> String {
        self.shared.store.display_text()
    }

    fn report_already_running(&self) -> bool {
        if self.shared.state().running {
            self.shared.sink.append_line("Monitoring already started.");
            return true;
        }
        false
    }

    /// Starts the countdown. Must be called from within a Tokio runtime.
    pub fn start(&self) -> Result<StartOutcome, SchedulerError> {
        if self.report_already_running() {
            return Ok(StartOutcome::AlreadyRunning);
        }
        self.shared.validate()?;

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            self.shared.sink.append_line("Cannot start backup timer: no async runtime.");
            SchedulerError::NoRuntime
        })?;

        let mut tick_loop = self.tick_loop();
        let epoch = {
            let mut state = self.shared.state();
            // Lost a race with another start since the check above
            if state.running {
                drop(state);
                self.shared.sink.append_line("Monitoring already started.");
                return Ok(StartOutcome::AlreadyRunning);
            }
            state.running = true;
            state.paused = false;
            state.remaining_seconds = state.interval_seconds;
            state.epoch += 1;
            state.epoch
        };

        let token = CancellationToken::new();
        let handle = runtime.spawn(run_tick_loop(
            Arc::clone(&self.shared),
            token.clone(),
            self.tick_period,
            epoch,
        ));
        if let Some(previous) = tick_loop.replace(TickLoop {
            token,
            _handle: handle,
        }) {
            previous.token.cancel();
        }

        self.shared.sink.append_line(&format!(
            "Backup timer started. Next backup in {}.",
            self.countdown_text()
        ));
        Ok(StartOutcome::Started)
    }

    /// Returns false when already stopped. An in-flight backup still runs
    /// to completion.
    pub fn stop(&self) -> bool {
        let mut tick_loop = self.tick_loop();
        {
            let mut state = self.shared.state();
            if !state.running {
                return false;
            }
            state.running = false;
            state.paused = false;
            state.remaining_seconds = 0;
        }

        if let Some(active) = tick_loop.take() {
            active.token.cancel();
        }
        self.shared.sink.append_line("Backup timer stopped.");
        true
    }

    /// Runs a pass right away, whatever the countdown phase, then restarts
    /// the countdown. Running/paused flags are left as they were.
    pub async fn backup_now(&self) -> Result<SyncReport, SchedulerError> {
        self.shared.validate()?;
        self.shared.sink.append_line("Manual backup triggered.");

        let result = self.shared.perform_backup().await;

        let mut state = self.shared.state();
        state.remaining_seconds = state.interval_seconds;
        result
    }

    pub fn update_interval(&self, minutes: i64) -> Result<(), IntervalError> {
        let minutes = validate_interval_minutes(minutes).map_err(|e| {
            self.shared.sink.append_line(&e.to_string());
            e
        })?;

        let mut state = self.shared.state();
        state.interval_seconds = minutes * 60;
        state.remaining_seconds = state.interval_seconds;
        drop(state);

        self.shared
            .sink
            .append_line(&format!("Backup interval set to {minutes} minute(s)."));
        Ok(())
    }

    /// Same as `update_interval`, for raw text typed by the user.
    pub fn update_interval_text(&self, input: &str) -> Result<(), IntervalError> {
        match parse_interval_minutes(input) {
            Ok(minutes) => self.update_interval(minutes as i64),
            Err(e) => {
                self.shared.sink.append_line(&e.to_string());
                Err(e)
            }
        }
    }
}

impl Drop for BackupScheduler {
    fn drop(&mut self) {
        if let Some(active) = self.tick_loop().take() {
            active.token.cancel();
        }
    }
}
