/// Daily scheduler for billing runs
///
/// The scheduler fires a registered callback once per day at a fixed local
/// time, and on demand through [`Scheduler::trigger_now`]. A run lock makes
/// sure a manual trigger and a scheduled tick never overlap.
///
/// # Timing
///
/// The next run is computed from the current instant in the configured time
/// zone. If the local run time does not exist on a given day (DST gap) the
/// run fires one hour later; if it occurs twice (DST overlap) the first
/// occurrence is used.
///
/// # Example
///
/// ```no_run
/// use gymbill_worker::scheduler::{DailyScheduler, Scheduler, Tick, TickCallback};
/// use gymbill_shared::clock::SystemClock;
/// use gymbill_shared::error::BillingError;
/// use chrono::NaiveTime;
/// use chrono_tz::Tz;
/// use futures::FutureExt;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let clock = Arc::new(SystemClock::new(Tz::UTC));
/// let scheduler = DailyScheduler::new(clock, Tz::UTC, NaiveTime::from_hms_opt(2, 0, 0).unwrap());
///
/// let callback: TickCallback = Arc::new(|tick: Tick| {
///     async move {
///         println!("Billing run for {}", tick.run_date);
///         Ok::<(), BillingError>(())
///     }
///     .boxed()
/// });
/// scheduler.on_tick(callback);
///
/// scheduler.run().await?;
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use chrono::{DateTime, Duration as TimeDelta, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use futures::future::BoxFuture;
use gymbill_shared::clock::Clock;
use gymbill_shared::error::{BillingError, BillingResult};
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// What caused a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Scheduled,
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Scheduled => f.write_str("scheduled"),
            Trigger::Manual => f.write_str("manual"),
        }
    }
}

/// One firing of the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Business date of the run
    pub run_date: NaiveDate,
    pub trigger: Trigger,
}

/// Work performed on every tick
pub type TickCallback = Arc<dyn Fn(Tick) -> BoxFuture<'static, BillingResult<()>> + Send + Sync>;

/// Scheduler errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Nothing registered with [`Scheduler::on_tick`]
    #[error("No tick callback registered")]
    NoCallback,

    /// A run is in progress and the trigger does not wait for it
    #[error("A billing run is already in progress")]
    AlreadyRunning,

    /// The callback failed
    #[error("Billing run failed: {0}")]
    Run(#[from] BillingError),
}

/// Trigger abstraction used by the billing worker
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Registers the work to run on every tick, replacing any previous callback
    fn on_tick(&self, callback: TickCallback);

    /// Runs the callback immediately for the current business date
    ///
    /// # Errors
    ///
    /// - `NoCallback` if nothing is registered
    /// - `AlreadyRunning` if another run holds the run lock
    /// - `Run` if the callback fails
    async fn trigger_now(&self) -> Result<(), SchedulerError>;
}

/// Fires once per day at a local time
pub struct DailyScheduler {
    clock: Arc<dyn Clock>,
    timezone: Tz,
    run_at: NaiveTime,
    callback: RwLock<Option<TickCallback>>,
    run_lock: Mutex<()>,
    shutdown: CancellationToken,
}

impl DailyScheduler {
    pub fn new(clock: Arc<dyn Clock>, timezone: Tz, run_at: NaiveTime) -> Self {
        DailyScheduler {
            clock,
            timezone,
            run_at,
            callback: RwLock::new(None),
            run_lock: Mutex::new(()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops [`DailyScheduler::run`] when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Time left until the next scheduled tick
    pub fn time_until_next_run(&self) -> Duration {
        duration_until_next_run(self.clock.now(), self.run_at, self.timezone)
    }

    /// Runs the daily loop until the shutdown token is cancelled
    ///
    /// A failed tick is logged and the loop keeps going; the next day's run
    /// picks up whatever was missed.
    pub async fn run(&self) -> Result<(), SchedulerError> {
        info!(run_at = %self.run_at, timezone = %self.timezone, "Daily scheduler started");

        loop {
            let wait = self.time_until_next_run();
            info!(next_run_in_secs = wait.as_secs(), "Waiting for next billing run");

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Daily scheduler stopped");
                    return Ok(());
                }
                _ = tokio::time::sleep(wait) => {}
            }

            let _guard = self.run_lock.lock().await;
            if let Err(e) = self.fire(Trigger::Scheduled).await {
                error!(error = %e, "Scheduled billing run failed");
            }
        }
    }

    fn callback(&self) -> Option<TickCallback> {
        match self.callback.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Runs the callback; the caller holds the run lock
    async fn fire(&self, trigger: Trigger) -> Result<(), SchedulerError> {
        let callback = self.callback().ok_or(SchedulerError::NoCallback)?;
        let tick = Tick {
            run_date: self.clock.today(),
            trigger,
        };

        info!(run_date = %tick.run_date, trigger = %trigger, "Billing run started");
        callback(tick).await?;
        info!(run_date = %tick.run_date, trigger = %trigger, "Billing run completed");

        Ok(())
    }
}

#[async_trait]
impl Scheduler for DailyScheduler {
    fn on_tick(&self, callback: TickCallback) {
        match self.callback.write() {
            Ok(mut guard) => *guard = Some(callback),
            Err(poisoned) => *poisoned.into_inner() = Some(callback),
        }
    }

    async fn trigger_now(&self) -> Result<(), SchedulerError> {
        let _guard = self.run_lock.try_lock().map_err(|_| SchedulerError::AlreadyRunning)?;
        self.fire(Trigger::Manual).await
    }
}

/// Duration from `now` until the next occurrence of `run_at` in `timezone`
///
/// Exactly at `run_at` the next occurrence is the following day.
pub fn duration_until_next_run(now: DateTime<Utc>, run_at: NaiveTime, timezone: Tz) -> Duration {
    let local = now.with_timezone(&timezone);
    let mut date = local.date_naive();
    if local.time() >= run_at {
        date = date.succ_opt().unwrap_or(date);
    }

    let naive = date.and_time(run_at);
    let next = timezone
        .from_local_datetime(&naive)
        .earliest()
        .or_else(|| timezone.from_local_datetime(&(naive + TimeDelta::hours(1))).earliest());

    match next {
        Some(next) => (next.with_timezone(&Utc) - now).to_std().unwrap_or(Duration::ZERO),
        None => Duration::from_secs(24 * 60 * 60),
    }
}
