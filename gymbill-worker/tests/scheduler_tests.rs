/// Scheduler and daily job tests
///
/// Run with: cargo test -p gymbill-worker

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use futures::future::{BoxFuture, FutureExt};
use gymbill_shared::clock::FixedClock;
use gymbill_shared::error::{BillingError, BillingResult};
use gymbill_shared::models::membership::{Membership, MembershipStatus};
use gymbill_shared::models::plan::{BillingKind, PeriodUnit, Plan};
use gymbill_shared::store::memory::MemoryStore;
use gymbill_worker::jobs::DailyBillingJob;
use gymbill_worker::scheduler::{DailyScheduler, Scheduler, SchedulerError, Tick, TickCallback, Trigger};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn two_am() -> NaiveTime {
    NaiveTime::from_hms_opt(2, 0, 0).unwrap()
}

/// Callback that records every tick it receives
fn recording(ticks: Arc<Mutex<Vec<Tick>>>) -> TickCallback {
    Arc::new(move |tick: Tick| -> BoxFuture<'static, BillingResult<()>> {
        let ticks = ticks.clone();
        async move {
            ticks.lock().unwrap().push(tick);
            Ok(())
        }
        .boxed()
    })
}

#[tokio::test]
async fn test_trigger_now_runs_callback_for_business_date() {
    let clock = Arc::new(FixedClock::on(date(2024, 2, 1)));
    let scheduler = DailyScheduler::new(clock, Tz::UTC, two_am());
    let ticks = Arc::new(Mutex::new(Vec::new()));
    scheduler.on_tick(recording(ticks.clone()));

    scheduler.trigger_now().await.unwrap();

    let ticks = ticks.lock().unwrap();
    assert_eq!(ticks.len(), 1);
    assert_eq!(ticks[0].run_date, date(2024, 2, 1));
    assert_eq!(ticks[0].trigger, Trigger::Manual);
}

#[tokio::test]
async fn test_trigger_without_callback_fails() {
    let clock = Arc::new(FixedClock::on(date(2024, 2, 1)));
    let scheduler = DailyScheduler::new(clock, Tz::UTC, two_am());

    let result = scheduler.trigger_now().await;

    assert!(matches!(result, Err(SchedulerError::NoCallback)));
}

#[tokio::test]
async fn test_callback_error_is_reported() {
    let clock = Arc::new(FixedClock::on(date(2024, 2, 1)));
    let scheduler = DailyScheduler::new(clock, Tz::UTC, two_am());
    scheduler.on_tick(Arc::new(|_tick: Tick| -> BoxFuture<'static, BillingResult<()>> {
        async { Err(BillingError::conflict("boom")) }.boxed()
    }));

    let result = scheduler.trigger_now().await;

    assert!(matches!(result, Err(SchedulerError::Run(BillingError::Conflict(_)))));
}

#[tokio::test]
async fn test_manual_trigger_does_not_overlap_running_job() {
    let clock = Arc::new(FixedClock::on(date(2024, 2, 1)));
    let scheduler = Arc::new(DailyScheduler::new(clock, Tz::UTC, two_am()));
    let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
    let started_tx = Arc::new(Mutex::new(Some(started_tx)));
    let release = Arc::new(tokio::sync::Notify::new());

    let gate = release.clone();
    scheduler.on_tick(Arc::new(move |_tick: Tick| -> BoxFuture<'static, BillingResult<()>> {
        let started = started_tx.lock().unwrap().take();
        let gate = gate.clone();
        async move {
            if let Some(started) = started {
                let _ = started.send(());
            }
            gate.notified().await;
            Ok(())
        }
        .boxed()
    }));

    let first = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.trigger_now().await }
    });
    started_rx.await.unwrap();

    let second = scheduler.trigger_now().await;
    assert!(matches!(second, Err(SchedulerError::AlreadyRunning)));

    release.notify_one();
    first.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_scheduled_tick_fires_at_run_time() {
    let clock = Arc::new(FixedClock::at(Utc.with_ymd_and_hms(2024, 2, 1, 1, 59, 0).unwrap()));
    let scheduler = Arc::new(DailyScheduler::new(clock, Tz::UTC, two_am()));
    assert_eq!(scheduler.time_until_next_run(), Duration::from_secs(60));

    let shutdown = scheduler.shutdown_token();
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    scheduler.on_tick(Arc::new(move |tick: Tick| -> BoxFuture<'static, BillingResult<()>> {
        assert_eq!(tick.trigger, Trigger::Scheduled);
        counter.fetch_add(1, Ordering::SeqCst);
        shutdown.cancel();
        async { Ok(()) }.boxed()
    }));

    let handle = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.run().await }
    });

    handle.await.unwrap().unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_run_stops_when_cancelled() {
    let clock = Arc::new(FixedClock::on(date(2024, 2, 1)));
    let scheduler = DailyScheduler::new(clock, Tz::UTC, two_am());
    scheduler.shutdown_token().cancel();

    let result = tokio::time::timeout(Duration::from_secs(1), scheduler.run()).await;

    assert!(matches!(result, Ok(Ok(()))));
}

#[tokio::test]
async fn test_daily_job_generates_invoices_through_scheduler() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::on(date(2024, 2, 1)));
    let tenant_id = Uuid::new_v4();

    let plan = Plan {
        id: Uuid::new_v4(),
        tenant_id,
        name: "Gold".to_string(),
        billing_kind: BillingKind::Recurring,
        period_unit: PeriodUnit::Monthly,
        period_count: 1,
        price: Decimal::from(150),
        duration_months: None,
        duration_days: None,
        created_at: Utc::now(),
    };
    store.insert_plan(plan.clone()).await;
    store
        .insert_membership(Membership {
            id: Uuid::new_v4(),
            tenant_id,
            member_id: Uuid::new_v4(),
            plan_id: plan.id,
            discount_id: None,
            start_date: date(2024, 1, 10),
            end_date: date(2024, 1, 10),
            billing_day: 5,
            status: MembershipStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
        .await;

    let scheduler = DailyScheduler::new(clock.clone(), Tz::UTC, two_am());
    scheduler.on_tick(DailyBillingJob::new(store.clone(), clock.clone()).into_callback());

    scheduler.trigger_now().await.unwrap();
    scheduler.trigger_now().await.unwrap();

    let receivables = store.receivables().await;
    assert_eq!(receivables.len(), 1);
    assert_eq!(receivables[0].due_date, date(2024, 2, 5));
}

#[tokio::test]
async fn test_daily_job_reports_sweep_and_generation() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::on(date(2024, 2, 1)));

    let report = DailyBillingJob::new(store, clock)
        .run(date(2024, 2, 1))
        .await
        .unwrap();

    assert_eq!(report.sweep.updated_count, 0);
    assert_eq!(report.invoices.total_processed, 0);
    assert_eq!(report.invoices.run_date, date(2024, 2, 1));
}
