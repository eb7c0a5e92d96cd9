/// Plan and discount models (read-only to the billing core)
///
/// Plans and discounts are managed by the catalog CRUD that lives outside this
/// crate. The billing core only reads them to decide whether a membership is
/// billable, how far a billing cycle reaches and how much to charge.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE billing_kind AS ENUM ('recurring', 'one_time');
/// CREATE TYPE period_unit AS ENUM ('monthly', 'annual', 'n_months', 'n_days');
/// CREATE TYPE discount_kind AS ENUM ('percentage', 'fixed');
///
/// CREATE TABLE plans (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     tenant_id UUID NOT NULL,
///     name VARCHAR(255) NOT NULL,
///     billing_kind billing_kind NOT NULL,
///     period_unit period_unit NOT NULL DEFAULT 'monthly',
///     period_count INTEGER NOT NULL DEFAULT 1,
///     price NUMERIC(12, 2) NOT NULL,
///     duration_months INTEGER,
///     duration_days INTEGER,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use super::invoice::InvoiceAmounts;
use crate::calendar::{add_days, add_months, DueDateRoll};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgExecutor;
use uuid::Uuid;

/// Whether a plan bills once or every cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "billing_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BillingKind {
    Recurring,
    OneTime,
}

/// Length unit of one billing cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "period_unit", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PeriodUnit {
    /// One month per cycle
    Monthly,

    /// Twelve months per cycle
    Annual,

    /// `period_count` months per cycle
    NMonths,

    /// `period_count` days per cycle
    NDays,
}

/// Catalog plan
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Plan {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub billing_kind: BillingKind,
    pub period_unit: PeriodUnit,
    pub period_count: i32,
    pub price: Decimal,

    /// Fixed plan length in months (takes precedence over days)
    pub duration_months: Option<i32>,

    /// Fixed plan length in days
    pub duration_days: Option<i32>,

    pub created_at: DateTime<Utc>,
}

impl Plan {
    /// Whether the plan generates an invoice every cycle
    pub fn is_recurring(&self) -> bool {
        self.billing_kind == BillingKind::Recurring
    }

    fn cycle_count(&self) -> u32 {
        u32::try_from(self.period_count).unwrap_or(1).max(1)
    }

    /// Last day the plan may be billed for a membership starting on `start`
    ///
    /// Plans without a fixed duration never expire.
    pub fn expiration(&self, start: NaiveDate) -> Option<NaiveDate> {
        let positive = |value: Option<i32>| value.and_then(|v| u32::try_from(v).ok()).filter(|v| *v > 0);

        if let Some(months) = positive(self.duration_months) {
            return Some(add_months(start, months));
        }
        positive(self.duration_days).map(|days| add_days(start, days))
    }

    /// Moves a date forward by exactly one billing cycle
    pub fn advance_cycle(&self, date: NaiveDate) -> NaiveDate {
        match self.period_unit {
            PeriodUnit::Monthly => add_months(date, 1),
            PeriodUnit::Annual => add_months(date, 12),
            PeriodUnit::NMonths => add_months(date, self.cycle_count()),
            PeriodUnit::NDays => add_days(date, self.cycle_count()),
        }
    }

    /// Amounts of one invoice for this plan with an optional discount
    pub fn invoice_amounts(&self, discount: Option<&Discount>) -> InvoiceAmounts {
        let discount_amount = discount.map_or(Decimal::ZERO, |d| d.amount_for(self.price));
        InvoiceAmounts::new(self.price, discount_amount)
    }

    /// How the next due date rolls once this month's billing day has passed
    pub fn due_date_roll(&self) -> DueDateRoll {
        match self.period_unit {
            PeriodUnit::Annual => DueDateRoll::Yearly,
            _ => DueDateRoll::Monthly,
        }
    }

    /// Finds a plan by ID with tenant isolation
    pub async fn find_by_id_and_tenant<'e, E>(
        executor: E,
        id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Plan>(
            r#"
            SELECT id, tenant_id, name, billing_kind, period_unit, period_count, price,
                   duration_months, duration_days, created_at
            FROM plans
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(executor)
        .await
    }
}

/// How a discount reduces the base amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "discount_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    /// `value` is a percentage of the base amount
    Percentage,

    /// `value` is a flat amount
    Fixed,
}

/// Catalog discount
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Discount {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub kind: DiscountKind,
    pub value: Decimal,
}

impl Discount {
    /// Computes the discount amount for a base amount
    ///
    /// Percentages are rounded to cents. The result never exceeds the base
    /// amount and is never negative.
    pub fn amount_for(&self, base: Decimal) -> Decimal {
        let raw = match self.kind {
            DiscountKind::Percentage => (base * self.value / Decimal::ONE_HUNDRED)
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            DiscountKind::Fixed => self.value,
        };
        raw.max(Decimal::ZERO).min(base.max(Decimal::ZERO))
    }

    /// Finds a discount by ID with tenant isolation
    pub async fn find_by_id_and_tenant<'e, E>(
        executor: E,
        id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Discount>(
            "SELECT id, tenant_id, name, kind, value FROM discounts WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(executor)
        .await
    }
}
