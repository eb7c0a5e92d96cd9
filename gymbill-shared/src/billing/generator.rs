/// Recurring invoice generator
///
/// Generates at most one receivable per membership per billing period. The
/// job is safe to re-run any number of times on the same day: the period
/// lookup catches invoices created by earlier runs, and the partial unique
/// index catches a concurrent run that inserted between lookup and insert.
///
/// # Per-membership flow
///
/// ```text
/// membership
///   ├─ plan missing              -> failed
///   ├─ plan is one-time          -> skipped (one_time_plan)
///   ├─ today's month < start     -> skipped (not_started)
///   ├─ today > plan expiration   -> skipped (plan_expired)
///   ├─ due date + period
///   ├─ live invoice for period   -> already_existed
///   ├─ insert (race lost)        -> already_existed
///   ├─ insert
///   └─ end_date += one cycle     -> generated (end_date_rolled = false on failure)
/// ```
///
/// Memberships are processed independently: an error on one is recorded in
/// the run summary and the batch continues.

use crate::calendar::{month_precedes, next_due_date, PeriodReference};
use crate::clock::Clock;
use crate::error::{BillingError, BillingResult};
use crate::models::membership::Membership;
use crate::models::receivable::{NewReceivable, MEMBERSHIP_CATEGORY};
use crate::store::BillingStore;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Why a membership was not billed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The plan bills once, not per cycle
    OneTimePlan,

    /// Today's month is before the membership's start month
    NotStarted,

    /// The plan's fixed duration has ended
    PlanExpired,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::OneTimePlan => f.write_str("one_time_plan"),
            SkipReason::NotStarted => f.write_str("not_started"),
            SkipReason::PlanExpired => f.write_str("plan_expired"),
        }
    }
}

/// What happened to one membership during a run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Generated {
        receivable_id: Uuid,
        due_date: NaiveDate,
        period_reference: PeriodReference,
        amount: Decimal,
        end_date_rolled: bool,
    },
    AlreadyExisted {
        receivable_id: Option<Uuid>,
        period_reference: PeriodReference,
    },
    Skipped {
        reason: SkipReason,
    },
    Failed {
        kind: &'static str,
        error: String,
    },
}

/// Per-membership line of a run summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MembershipOutcome {
    pub membership_id: Uuid,
    pub tenant_id: Uuid,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Result of a generator run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_date: NaiveDate,
    pub tenant_id: Option<Uuid>,
    pub total_processed: usize,
    pub generated: usize,
    pub already_existed: usize,
    pub skipped: usize,
    pub errored: usize,
    pub end_date_rollovers: usize,
    pub details: Vec<MembershipOutcome>,
}

impl RunSummary {
    fn new(run_date: NaiveDate, tenant_id: Option<Uuid>) -> Self {
        Self {
            run_date,
            tenant_id,
            total_processed: 0,
            generated: 0,
            already_existed: 0,
            skipped: 0,
            errored: 0,
            end_date_rollovers: 0,
            details: Vec::new(),
        }
    }

    fn record(&mut self, membership: &Membership, outcome: Outcome) {
        self.total_processed += 1;
        match &outcome {
            Outcome::Generated { end_date_rolled, .. } => {
                self.generated += 1;
                if *end_date_rolled {
                    self.end_date_rollovers += 1;
                }
            }
            Outcome::AlreadyExisted { .. } => self.already_existed += 1,
            Outcome::Skipped { .. } => self.skipped += 1,
            Outcome::Failed { .. } => self.errored += 1,
        }
        self.details.push(MembershipOutcome {
            membership_id: membership.id,
            tenant_id: membership.tenant_id,
            outcome,
        });
    }

    /// Outcome recorded for a membership, if it was processed
    pub fn outcome_for(&self, membership_id: Uuid) -> Option<&Outcome> {
        self.details
            .iter()
            .find(|d| d.membership_id == membership_id)
            .map(|d| &d.outcome)
    }
}

/// Generates recurring receivables for active memberships
#[derive(Clone)]
pub struct RecurringInvoiceGenerator {
    store: Arc<dyn BillingStore>,
    clock: Arc<dyn Clock>,
}

impl RecurringInvoiceGenerator {
    pub fn new(store: Arc<dyn BillingStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Runs the generator for `today`, optionally restricted to one tenant
    ///
    /// # Errors
    ///
    /// Only fails if the membership list cannot be loaded; per-membership
    /// failures are reported in the summary.
    pub async fn run(&self, today: NaiveDate, tenant_id: Option<Uuid>) -> BillingResult<RunSummary> {
        info!(run_date = %today, tenant_id = ?tenant_id, "Starting recurring invoice generation");

        let memberships = self.store.active_recurring_memberships(tenant_id).await?;
        let mut summary = RunSummary::new(today, tenant_id);

        for membership in &memberships {
            let outcome = match self.process(membership, today).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(
                        membership_id = %membership.id,
                        tenant_id = %membership.tenant_id,
                        error = %e,
                        "Failed to generate invoice for membership"
                    );
                    Outcome::Failed {
                        kind: e.kind(),
                        error: e.to_string(),
                    }
                }
            };
            summary.record(membership, outcome);
        }

        info!(
            run_date = %today,
            total_processed = summary.total_processed,
            generated = summary.generated,
            already_existed = summary.already_existed,
            skipped = summary.skipped,
            errored = summary.errored,
            end_date_rollovers = summary.end_date_rollovers,
            "Recurring invoice generation finished"
        );

        Ok(summary)
    }

    /// Runs the generator for the clock's current business date
    pub async fn run_today(&self, tenant_id: Option<Uuid>) -> BillingResult<RunSummary> {
        self.run(self.clock.today(), tenant_id).await
    }

    async fn process(&self, membership: &Membership, today: NaiveDate) -> BillingResult<Outcome> {
        let plan = self
            .store
            .find_plan(membership.plan_id, membership.tenant_id)
            .await?
            .ok_or_else(|| BillingError::not_found("Plan"))?;

        if !plan.is_recurring() {
            return Ok(Outcome::Skipped {
                reason: SkipReason::OneTimePlan,
            });
        }
        if month_precedes(today, membership.start_date) {
            return Ok(Outcome::Skipped {
                reason: SkipReason::NotStarted,
            });
        }
        if plan.expiration(membership.start_date).is_some_and(|expires| today > expires) {
            return Ok(Outcome::Skipped {
                reason: SkipReason::PlanExpired,
            });
        }

        let due_date = next_due_date(membership.billing_day(), today, plan.due_date_roll())
            .ok_or_else(|| BillingError::validation("billing_day", "must be between 1 and 31"))?;
        let period = PeriodReference::from_date(due_date);

        if let Some(existing) = self
            .store
            .find_receivable_for_period(membership.id, membership.member_id, plan.id, &period)
            .await?
        {
            debug!(membership_id = %membership.id, period = %period, "Invoice already exists");
            return Ok(Outcome::AlreadyExisted {
                receivable_id: Some(existing.id),
                period_reference: period,
            });
        }

        let discount = match membership.discount_id {
            Some(discount_id) => {
                let discount = self.store.find_discount(discount_id, membership.tenant_id).await?;
                if discount.is_none() {
                    warn!(
                        membership_id = %membership.id,
                        discount_id = %discount_id,
                        "Discount not found, billing full price"
                    );
                }
                discount
            }
            None => None,
        };

        let amounts = plan.invoice_amounts(discount.as_ref());
        let receivable = NewReceivable {
            tenant_id: membership.tenant_id,
            member_id: membership.member_id,
            membership_id: Some(membership.id),
            plan_id: Some(plan.id),
            discount_id: discount.as_ref().map(|d| d.id),
            due_date,
            amounts,
            period_reference: Some(period.clone()),
            category: MEMBERSHIP_CATEGORY.to_string(),
            notes: Some(format!("{} membership fee {}", plan.name, period)),
        }
        .into_receivable(self.clock.now());

        let Some(created) = self.store.insert_receivable(receivable).await? else {
            debug!(membership_id = %membership.id, period = %period, "Invoice created concurrently");
            return Ok(Outcome::AlreadyExisted {
                receivable_id: None,
                period_reference: period,
            });
        };

        let next_end_date = plan.advance_cycle(membership.end_date);
        let end_date_rolled = match self
            .store
            .update_membership_end_date(membership.id, next_end_date)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    membership_id = %membership.id,
                    receivable_id = %created.id,
                    error = %e,
                    "Invoice generated but membership end date was not rolled forward"
                );
                false
            }
        };

        info!(
            membership_id = %membership.id,
            receivable_id = %created.id,
            due_date = %due_date,
            amount = %created.final_amount,
            "Generated recurring invoice"
        );

        Ok(Outcome::Generated {
            receivable_id: created.id,
            due_date,
            period_reference: period,
            amount: created.final_amount,
            end_date_rolled,
        })
    }
}
