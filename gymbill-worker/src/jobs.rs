/// The daily billing job
///
/// Each run first moves past-due invoices to overdue and then generates the
/// recurring invoices for the day. Both steps are idempotent, so re-running
/// a day (manual trigger, restart with `BILLING_RUN_ON_START`) is safe.

use crate::scheduler::{Tick, TickCallback};
use chrono::NaiveDate;
use futures::future::{BoxFuture, FutureExt};
use gymbill_shared::billing::{OverdueSweep, OverdueSweeper, RecurringInvoiceGenerator, RunSummary};
use gymbill_shared::clock::Clock;
use gymbill_shared::error::BillingResult;
use gymbill_shared::store::BillingStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of one daily run
#[derive(Debug, Clone, Serialize)]
pub struct DailyRunReport {
    pub sweep: OverdueSweep,
    pub invoices: RunSummary,
}

#[derive(Clone)]
pub struct DailyBillingJob {
    sweeper: OverdueSweeper,
    generator: RecurringInvoiceGenerator,
}

impl DailyBillingJob {
    pub fn new(store: Arc<dyn BillingStore>, clock: Arc<dyn Clock>) -> Self {
        DailyBillingJob {
            sweeper: OverdueSweeper::new(store.clone()),
            generator: RecurringInvoiceGenerator::new(store, clock),
        }
    }

    /// Runs the job for every tenant
    ///
    /// # Errors
    ///
    /// Fails only if the sweep or the membership list fails; per-membership
    /// errors are reported in the run summary.
    pub async fn run(&self, run_date: NaiveDate) -> BillingResult<DailyRunReport> {
        let sweep = self.sweeper.sweep(run_date, None).await?;
        let invoices = self.generator.run(run_date, None).await?;

        if invoices.errored > 0 {
            warn!(
                run_date = %run_date,
                errored = invoices.errored,
                "Some memberships could not be billed"
            );
        }

        Ok(DailyRunReport { sweep, invoices })
    }

    /// Wraps the job as a scheduler callback
    pub fn into_callback(self) -> TickCallback {
        let job = Arc::new(self);
        Arc::new(move |tick: Tick| -> BoxFuture<'static, BillingResult<()>> {
            let job = job.clone();
            async move {
                let report = job.run(tick.run_date).await?;
                info!(
                    run_date = %tick.run_date,
                    trigger = %tick.trigger,
                    overdue = report.sweep.updated_count,
                    generated = report.invoices.generated,
                    already_existed = report.invoices.already_existed,
                    skipped = report.invoices.skipped,
                    errored = report.invoices.errored,
                    "Daily billing job finished"
                );
                Ok(())
            }
            .boxed()
        })
    }
}
