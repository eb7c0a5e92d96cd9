/// Receivable model and database operations
///
/// A receivable is money a member owes the tenant. Recurring receivables
/// carry the membership and period reference they were generated for; the
/// partial unique index on `(membership_id, period_reference)` guarantees a
/// single live invoice per membership per billing period.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE receivables (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     tenant_id UUID NOT NULL,
///     member_id UUID NOT NULL,
///     membership_id UUID REFERENCES memberships(id),
///     plan_id UUID REFERENCES plans(id),
///     discount_id UUID REFERENCES discounts(id),
///     due_date DATE NOT NULL,
///     original_amount NUMERIC(12, 2) NOT NULL,
///     discount_amount NUMERIC(12, 2) NOT NULL DEFAULT 0,
///     final_amount NUMERIC(12, 2) NOT NULL,
///     paid_amount NUMERIC(12, 2) NOT NULL DEFAULT 0,
///     remaining_amount NUMERIC(12, 2) NOT NULL,
///     status invoice_status NOT NULL DEFAULT 'pending',
///     period_reference VARCHAR(7),
///     category VARCHAR(100) NOT NULL DEFAULT 'membership',
///     notes TEXT,
///     payment_method payment_method,
///     paid_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE UNIQUE INDEX receivables_membership_period
///     ON receivables (membership_id, period_reference)
///     WHERE status <> 'cancelled';
/// ```

use super::cash_drawer::{MovementKind, NewMovement};
use super::invoice::{
    InvoiceAmounts, InvoiceBalance, InvoiceKind, InvoiceStatus, PaymentIntent, PaymentMethod,
};
use crate::calendar::PeriodReference;
use crate::error::{BillingError, BillingResult};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgExecutor;
use uuid::Uuid;

/// Category of membership fees
pub const MEMBERSHIP_CATEGORY: &str = "membership";

/// Receivable model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Receivable {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub member_id: Uuid,
    pub membership_id: Option<Uuid>,
    pub plan_id: Option<Uuid>,
    pub discount_id: Option<Uuid>,
    pub due_date: NaiveDate,
    pub original_amount: Decimal,
    pub discount_amount: Decimal,
    pub final_amount: Decimal,
    pub paid_amount: Decimal,
    pub remaining_amount: Decimal,
    pub status: InvoiceStatus,

    /// Billing period ("MM/YYYY") for generated invoices
    pub period_reference: Option<PeriodReference>,

    pub category: String,
    pub notes: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a receivable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReceivable {
    pub tenant_id: Uuid,
    pub member_id: Uuid,
    pub membership_id: Option<Uuid>,
    pub plan_id: Option<Uuid>,
    pub discount_id: Option<Uuid>,
    pub due_date: NaiveDate,
    pub amounts: InvoiceAmounts,
    pub period_reference: Option<PeriodReference>,
    pub category: String,
    pub notes: Option<String>,
}

impl NewReceivable {
    /// Materializes a receivable, pending unless nothing is owed
    pub fn into_receivable(self, now: DateTime<Utc>) -> Receivable {
        let status = self.amounts.initial_status();
        Receivable {
            id: Uuid::new_v4(),
            tenant_id: self.tenant_id,
            member_id: self.member_id,
            membership_id: self.membership_id,
            plan_id: self.plan_id,
            discount_id: self.discount_id,
            due_date: self.due_date,
            original_amount: self.amounts.original,
            discount_amount: self.amounts.discount,
            final_amount: self.amounts.final_amount,
            paid_amount: Decimal::ZERO,
            remaining_amount: self.amounts.final_amount,
            status,
            period_reference: self.period_reference,
            category: self.category,
            notes: self.notes,
            payment_method: None,
            paid_at: (status == InvoiceStatus::Paid).then_some(now),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Receivable {
    pub fn balance(&self) -> InvoiceBalance {
        InvoiceBalance {
            kind: InvoiceKind::Receivable,
            final_amount: self.final_amount,
            paid_amount: self.paid_amount,
            status: self.status,
        }
    }

    /// Applies a payment, returning the updated receivable
    ///
    /// Late fees and interest only apply to payables.
    ///
    /// # Errors
    ///
    /// See [`InvoiceBalance::settle`].
    pub fn apply_payment(&self, intent: &PaymentIntent, now: DateTime<Utc>) -> BillingResult<Self> {
        intent.validate()?;
        if !intent.adjustments().is_zero() {
            return Err(BillingError::validation(
                "late_fee",
                "late fee and interest are only accepted on payables",
            ));
        }

        let settlement = self.balance().settle(intent.amount, Decimal::ZERO)?;

        Ok(Receivable {
            final_amount: settlement.final_amount,
            paid_amount: settlement.paid_amount,
            remaining_amount: settlement.remaining_amount,
            status: settlement.status,
            payment_method: Some(intent.payment_method),
            paid_at: Some(intent.paid_at.unwrap_or(now)),
            updated_at: now,
            ..self.clone()
        })
    }

    /// Drawer inflow recording a payment against this receivable
    pub fn payment_movement(&self, intent: &PaymentIntent) -> NewMovement {
        let description = match &self.period_reference {
            Some(period) => format!("Payment received: {} {}", self.category, period),
            None => format!("Payment received: {}", self.category),
        };

        NewMovement {
            kind: MovementKind::In,
            amount: intent.amount,
            description,
            payment_method: intent.payment_method,
            category: self.category.clone(),
            receivable_id: Some(self.id),
            payable_id: None,
            created_by: intent.registered_by,
        }
    }

    /// Inserts a receivable built with [`NewReceivable::into_receivable`]
    ///
    /// # Errors
    ///
    /// A unique violation on `receivables_membership_period` means a live
    /// invoice already exists for the membership and period.
    pub async fn insert<'e, E>(executor: E, receivable: &Receivable) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Receivable>(
            r#"
            INSERT INTO receivables (id, tenant_id, member_id, membership_id, plan_id, discount_id,
                                     due_date, original_amount, discount_amount, final_amount,
                                     paid_amount, remaining_amount, status, period_reference,
                                     category, notes, paid_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $18)
            RETURNING id, tenant_id, member_id, membership_id, plan_id, discount_id, due_date,
                      original_amount, discount_amount, final_amount, paid_amount,
                      remaining_amount, status, period_reference, category, notes,
                      payment_method, paid_at, created_at, updated_at
            "#,
        )
        .bind(receivable.id)
        .bind(receivable.tenant_id)
        .bind(receivable.member_id)
        .bind(receivable.membership_id)
        .bind(receivable.plan_id)
        .bind(receivable.discount_id)
        .bind(receivable.due_date)
        .bind(receivable.original_amount)
        .bind(receivable.discount_amount)
        .bind(receivable.final_amount)
        .bind(receivable.paid_amount)
        .bind(receivable.remaining_amount)
        .bind(receivable.status)
        .bind(&receivable.period_reference)
        .bind(&receivable.category)
        .bind(&receivable.notes)
        .bind(receivable.paid_at)
        .bind(receivable.created_at)
        .fetch_one(executor)
        .await
    }

    /// Finds a receivable by ID with tenant isolation
    pub async fn find_by_id_and_tenant<'e, E>(
        executor: E,
        id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Receivable>(
            r#"
            SELECT id, tenant_id, member_id, membership_id, plan_id, discount_id, due_date,
                   original_amount, discount_amount, final_amount, paid_amount,
                   remaining_amount, status, period_reference, category, notes,
                   payment_method, paid_at, created_at, updated_at
            FROM receivables
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(executor)
        .await
    }

    /// Finds and row-locks a receivable (must run inside a transaction)
    pub async fn lock<'e, E>(executor: E, id: Uuid, tenant_id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Receivable>(
            r#"
            SELECT id, tenant_id, member_id, membership_id, plan_id, discount_id, due_date,
                   original_amount, discount_amount, final_amount, paid_amount,
                   remaining_amount, status, period_reference, category, notes,
                   payment_method, paid_at, created_at, updated_at
            FROM receivables
            WHERE id = $1 AND tenant_id = $2
            FOR UPDATE
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(executor)
        .await
    }

    /// Finds the live (not cancelled) receivable for a membership period
    pub async fn find_for_period<'e, E>(
        executor: E,
        membership_id: Uuid,
        member_id: Uuid,
        plan_id: Uuid,
        period: &PeriodReference,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Receivable>(
            r#"
            SELECT id, tenant_id, member_id, membership_id, plan_id, discount_id, due_date,
                   original_amount, discount_amount, final_amount, paid_amount,
                   remaining_amount, status, period_reference, category, notes,
                   payment_method, paid_at, created_at, updated_at
            FROM receivables
            WHERE membership_id = $1
              AND member_id = $2
              AND plan_id = $3
              AND period_reference = $4
              AND status <> 'cancelled'
            LIMIT 1
            "#,
        )
        .bind(membership_id)
        .bind(member_id)
        .bind(plan_id)
        .bind(period)
        .fetch_optional(executor)
        .await
    }

    /// Persists the payment fields of a receivable returned by [`Receivable::apply_payment`]
    pub async fn save_payment<'e, E>(&self, executor: E) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            UPDATE receivables
            SET final_amount = $2, paid_amount = $3, remaining_amount = $4, status = $5,
                payment_method = $6, paid_at = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(self.id)
        .bind(self.final_amount)
        .bind(self.paid_amount)
        .bind(self.remaining_amount)
        .bind(self.status)
        .bind(self.payment_method)
        .bind(self.paid_at)
        .bind(self.updated_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Sets the status of a receivable
    pub async fn set_status<'e, E>(
        executor: E,
        id: Uuid,
        status: InvoiceStatus,
    ) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query("UPDATE receivables SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Marks pending receivables due before `today` as overdue
    ///
    /// Returns the number of receivables updated.
    pub async fn mark_overdue<'e, E>(
        executor: E,
        today: NaiveDate,
        tenant_id: Option<Uuid>,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE receivables
            SET status = 'overdue', updated_at = NOW()
            WHERE status = 'pending'
              AND due_date < $1
              AND ($2::uuid IS NULL OR tenant_id = $2)
            "#,
        )
        .bind(today)
        .bind(tenant_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }
}
