//! Polling scheduler: once per cycle, decide whether the configured trigger
//! matches the current minute and fire the job if so.

pub mod trigger;

pub use trigger::{Period, Trigger};

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Timelike, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::store::ConfigStore;
use crate::task::{Job, TaskOutcome};
use crate::utils::error::{AppError, Result};

/// What a single polling cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    /// The scheduler is switched off.
    Disabled,
    /// The configuration does not validate; the scheduler switched itself off.
    Invalid,
    /// Trigger does not match, or already fired this minute.
    Waiting,
    /// A run was spawned.
    Fired,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStats {
    pub fired_runs: u64,
    pub completed_runs: u64,
    pub failed_runs: u64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Switches the scheduler on and off from outside the polling loop.
#[derive(Clone)]
pub struct SchedulerHandle {
    enabled: Arc<AtomicBool>,
    config: Arc<ConfigStore>,
}

impl SchedulerHandle {
    /// Refuses, and leaves the scheduler off, while the settings are invalid.
    pub fn enable(&self) -> Result<()> {
        if let Err(e) = self.config.validate() {
            self.enabled.store(false, Ordering::SeqCst);
            return Err(AppError::ConfigInvalid(e.to_string()));
        }
        self.enabled.store(true, Ordering::SeqCst);
        tracing::info!("Scheduler enabled");
        Ok(())
    }

    pub fn disable(&self) {
        if self.enabled.swap(false, Ordering::SeqCst) {
            tracing::info!("Scheduler disabled");
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

type MinuteKey = (NaiveDate, u32, u32);

fn minute_key(now: &NaiveDateTime) -> MinuteKey {
    (now.date(), now.hour(), now.minute())
}

pub struct Scheduler {
    config: Arc<ConfigStore>,
    job: Arc<dyn Job>,
    enabled: Arc<AtomicBool>,
    cycle: Duration,
    trigger: Option<Trigger>,
    seen_version: u64,
    last_fired: Option<MinuteKey>,
    /// Switched off by invalid settings rather than through the handle.
    suspended: bool,
    outcomes_tx: mpsc::UnboundedSender<TaskOutcome>,
    outcomes_rx: mpsc::UnboundedReceiver<TaskOutcome>,
    stats: SchedulerStats,
}

impl Scheduler {
    /// Starts enabled exactly when the settings currently validate.
    pub fn new(config: Arc<ConfigStore>, job: Arc<dyn Job>, cycle: Duration) -> Self {
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        let enabled = config.is_valid();
        if !enabled {
            tracing::warn!("Settings are incomplete or invalid, scheduler starts disabled");
        }

        Self {
            config,
            job,
            enabled: Arc::new(AtomicBool::new(enabled)),
            cycle,
            trigger: None,
            seen_version: 0,
            last_fired: None,
            suspended: !enabled,
            outcomes_tx,
            outcomes_rx,
            stats: SchedulerStats::default(),
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            enabled: Arc::clone(&self.enabled),
            config: Arc::clone(&self.config),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn trigger(&self) -> Option<Trigger> {
        self.trigger
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    fn switch_off(&mut self, reason: &AppError) -> Poll {
        tracing::warn!("Disabling scheduler: {}", reason);
        self.enabled.store(false, Ordering::SeqCst);
        self.trigger = None;
        self.suspended = true;
        Poll::Invalid
    }

    /// Re-read the trigger if the stored schedule moved since we last looked.
    fn refresh(&mut self) -> Result<()> {
        if self.trigger.is_some() && !self.config.is_stale_for_scheduler(self.seen_version) {
            return Ok(());
        }

        let snapshot = self.config.validated_scheduler_keys()?;
        let trigger = Trigger::parse(&snapshot.time, &snapshot.period, &snapshot.weekday)?;

        if self.trigger != Some(trigger) {
            tracing::info!("Schedule set to {}", trigger);
        }
        self.trigger = Some(trigger);
        self.seen_version = snapshot.version;
        Ok(())
    }

    /// Pull in edits made to the settings file since the last cycle. A
    /// scheduler that switched itself off comes back once they validate.
    fn reload(&mut self) {
        match self.config.reload_if_changed() {
            Ok(true) if self.suspended && !self.is_enabled() => {
                if let Err(e) = self.handle().enable() {
                    tracing::debug!("Settings changed but are still invalid: {}", e);
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Keeping current settings, reload failed: {}", e),
        }
    }

    /// One polling cycle at wall-clock time `now`.
    pub fn poll(&mut self, now: NaiveDateTime) -> Poll {
        self.reload();

        if !self.is_enabled() {
            return Poll::Disabled;
        }
        self.suspended = false;

        if let Err(e) = self.refresh() {
            return self.switch_off(&e);
        }

        let Some(trigger) = self.trigger else {
            return Poll::Waiting;
        };

        let key = minute_key(&now);
        if !trigger.matches(&now) || self.last_fired == Some(key) {
            return Poll::Waiting;
        }

        // mail credentials may have changed without touching the schedule
        if let Err(e) = self.config.validate() {
            return self.switch_off(&e);
        }

        self.last_fired = Some(key);
        self.fire();
        Poll::Fired
    }

    fn fire(&mut self) {
        let job = Arc::clone(&self.job);
        let outcomes = self.outcomes_tx.clone();

        self.stats.fired_runs += 1;
        self.stats.last_run_at = Some(Utc::now());
        tracing::info!("Trigger matched, starting run");

        tokio::spawn(async move {
            let outcome = job.execute().await;
            if outcomes.send(outcome).is_err() {
                tracing::debug!("Scheduler stopped before the run finished");
            }
        });
    }

    fn record(&mut self, outcome: TaskOutcome) {
        match &outcome.result {
            Ok(report) => {
                self.stats.completed_runs += 1;
                self.stats.last_error = None;
                tracing::info!(
                    run_id = %outcome.run_id,
                    "Run completed in {:?}, {} records mailed",
                    outcome.elapsed,
                    report.record_count
                );
            }
            Err(e) => {
                self.stats.failed_runs += 1;
                self.stats.last_error = Some(e.to_string());
                tracing::error!(
                    run_id = %outcome.run_id,
                    stage = e.stage(),
                    "Run failed after {:?}: {}",
                    outcome.elapsed,
                    e
                );
            }
        }
    }

    /// Poll every cycle until `shutdown` resolves. Runs still in flight are
    /// left to finish on their own.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.cycle);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!("Scheduler running, polling every {:?}", self.cycle);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Scheduler shutting down");
                    break;
                }
                Some(outcome) = self.outcomes_rx.recv() => self.record(outcome),
                _ = ticker.tick() => {
                    self.poll(Local::now().naive_local());
                }
            }
        }
    }
}
