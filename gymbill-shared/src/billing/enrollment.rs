/// Enrollment: a new membership and its first invoice
///
/// Both rows are written in one store operation; if the invoice cannot be
/// created the membership is not created either.
///
/// The first due date follows the billing day when one is given (the same
/// rule the daily job uses, with the start date as reference). Without a
/// billing day the first invoice is due a week after the start date and that
/// date's day of month becomes the billing day.

use crate::calendar::{add_days, next_due_date, PeriodReference};
use crate::clock::Clock;
use crate::error::{BillingError, BillingResult};
use crate::models::membership::{CreateMembership, Membership};
use crate::models::receivable::{NewReceivable, Receivable, MEMBERSHIP_CATEGORY};
use crate::store::BillingStore;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Days between the start date and the first due date when no billing day is given
pub const DEFAULT_FIRST_DUE_DAYS: u32 = 7;

/// Enrollment request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentRequest {
    pub tenant_id: Uuid,
    pub member_id: Uuid,
    pub plan_id: Uuid,
    pub discount_id: Option<Uuid>,
    pub start_date: NaiveDate,
    pub billing_day: Option<u32>,
}

/// Created membership and first invoice
#[derive(Debug, Clone, Serialize)]
pub struct Enrollment {
    pub membership: Membership,
    pub first_invoice: Receivable,
}

#[derive(Clone)]
pub struct EnrollmentService {
    store: Arc<dyn BillingStore>,
    clock: Arc<dyn Clock>,
}

impl EnrollmentService {
    pub fn new(store: Arc<dyn BillingStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Enrolls a member in a plan
    ///
    /// # Errors
    ///
    /// - Validation if the billing day is outside 1..=31
    /// - NotFound if the plan or discount does not exist for the tenant
    /// - Database if either insert fails (nothing is persisted)
    pub async fn enroll(&self, request: EnrollmentRequest) -> BillingResult<Enrollment> {
        if let Some(day) = request.billing_day {
            if !(1..=31).contains(&day) {
                return Err(BillingError::validation("billing_day", "must be between 1 and 31"));
            }
        }

        let plan = self
            .store
            .find_plan(request.plan_id, request.tenant_id)
            .await?
            .ok_or_else(|| BillingError::not_found("Plan"))?;

        let discount = match request.discount_id {
            Some(id) => Some(
                self.store
                    .find_discount(id, request.tenant_id)
                    .await?
                    .ok_or_else(|| BillingError::not_found("Discount"))?,
            ),
            None => None,
        };

        let due_date = match request.billing_day {
            Some(day) => next_due_date(day, request.start_date, plan.due_date_roll())
                .ok_or_else(|| BillingError::validation("billing_day", "must be between 1 and 31"))?,
            None => add_days(request.start_date, DEFAULT_FIRST_DUE_DAYS),
        };
        let billing_day = request.billing_day.unwrap_or_else(|| due_date.day());
        let period = PeriodReference::from_date(due_date);
        let now = self.clock.now();

        let membership = CreateMembership {
            tenant_id: request.tenant_id,
            member_id: request.member_id,
            plan_id: plan.id,
            discount_id: discount.as_ref().map(|d| d.id),
            start_date: request.start_date,
            end_date: plan.advance_cycle(request.start_date),
            billing_day: i16::try_from(billing_day)
                .map_err(|_| BillingError::validation("billing_day", "must be between 1 and 31"))?,
        }
        .into_membership(now);

        let first_invoice = NewReceivable {
            tenant_id: request.tenant_id,
            member_id: request.member_id,
            membership_id: Some(membership.id),
            plan_id: Some(plan.id),
            discount_id: discount.as_ref().map(|d| d.id),
            due_date,
            amounts: plan.invoice_amounts(discount.as_ref()),
            period_reference: Some(period.clone()),
            category: MEMBERSHIP_CATEGORY.to_string(),
            notes: Some(format!("{} enrollment fee {}", plan.name, period)),
        }
        .into_receivable(now);

        let (membership, first_invoice) = self.store.enroll(membership, first_invoice).await?;

        info!(
            tenant_id = %membership.tenant_id,
            membership_id = %membership.id,
            receivable_id = %first_invoice.id,
            due_date = %first_invoice.due_date,
            "Member enrolled"
        );

        Ok(Enrollment {
            membership,
            first_invoice,
        })
    }
}
