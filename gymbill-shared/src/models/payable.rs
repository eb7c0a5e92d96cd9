/// Payable model and database operations
///
/// A payable is money the tenant owes (rent, suppliers, staff). It follows the
/// same status machine as a receivable; paying one posts an outflow to the
/// open drawer. Late fees and interest supplied with a payment are folded into
/// the final amount.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE payables (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     tenant_id UUID NOT NULL,
///     description VARCHAR(255) NOT NULL,
///     supplier VARCHAR(255),
///     category VARCHAR(100) NOT NULL,
///     due_date DATE NOT NULL,
///     original_amount NUMERIC(12, 2) NOT NULL,
///     discount_amount NUMERIC(12, 2) NOT NULL DEFAULT 0,
///     late_fee NUMERIC(12, 2) NOT NULL DEFAULT 0,
///     interest NUMERIC(12, 2) NOT NULL DEFAULT 0,
///     final_amount NUMERIC(12, 2) NOT NULL,
///     paid_amount NUMERIC(12, 2) NOT NULL DEFAULT 0,
///     remaining_amount NUMERIC(12, 2) NOT NULL,
///     status invoice_status NOT NULL DEFAULT 'pending',
///     payment_method payment_method,
///     paid_at TIMESTAMPTZ,
///     notes TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use super::cash_drawer::{MovementKind, NewMovement};
use super::invoice::{
    InvoiceAmounts, InvoiceBalance, InvoiceKind, InvoiceStatus, PaymentIntent, PaymentMethod,
};
use crate::error::{BillingError, BillingResult};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgExecutor;
use uuid::Uuid;

/// Payable model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payable {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub description: String,
    pub supplier: Option<String>,
    pub category: String,
    pub due_date: NaiveDate,
    pub original_amount: Decimal,
    pub discount_amount: Decimal,

    /// Accumulated late fees
    pub late_fee: Decimal,

    /// Accumulated interest
    pub interest: Decimal,

    pub final_amount: Decimal,
    pub paid_amount: Decimal,
    pub remaining_amount: Decimal,
    pub status: InvoiceStatus,
    pub payment_method: Option<PaymentMethod>,
    pub paid_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a payable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayable {
    pub tenant_id: Uuid,
    pub description: String,
    pub supplier: Option<String>,
    pub category: String,
    pub due_date: NaiveDate,
    pub amount: Decimal,
    #[serde(default)]
    pub discount: Option<Decimal>,
    pub notes: Option<String>,
}

impl NewPayable {
    /// Validates the input and materializes a pending payable
    ///
    /// # Errors
    ///
    /// Validation if the amount is not positive, the discount is negative or
    /// the description or category are blank.
    pub fn into_payable(self, now: DateTime<Utc>) -> BillingResult<Payable> {
        if self.amount <= Decimal::ZERO {
            return Err(BillingError::validation("amount", "must be greater than zero"));
        }
        if self.discount.is_some_and(|d| d < Decimal::ZERO) {
            return Err(BillingError::validation("discount", "cannot be negative"));
        }
        if self.description.trim().is_empty() {
            return Err(BillingError::validation("description", "cannot be empty"));
        }
        if self.category.trim().is_empty() {
            return Err(BillingError::validation("category", "cannot be empty"));
        }

        let amounts = InvoiceAmounts::new(self.amount, self.discount.unwrap_or(Decimal::ZERO));
        let status = amounts.initial_status();

        Ok(Payable {
            id: Uuid::new_v4(),
            tenant_id: self.tenant_id,
            description: self.description.trim().to_string(),
            supplier: self.supplier.filter(|s| !s.trim().is_empty()),
            category: self.category.trim().to_string(),
            due_date: self.due_date,
            original_amount: amounts.original,
            discount_amount: amounts.discount,
            late_fee: Decimal::ZERO,
            interest: Decimal::ZERO,
            final_amount: amounts.final_amount,
            paid_amount: Decimal::ZERO,
            remaining_amount: amounts.final_amount,
            status,
            payment_method: None,
            paid_at: (status == InvoiceStatus::Paid).then_some(now),
            notes: self.notes,
            created_at: now,
            updated_at: now,
        })
    }
}

impl Payable {
    pub fn balance(&self) -> InvoiceBalance {
        InvoiceBalance {
            kind: InvoiceKind::Payable,
            final_amount: self.final_amount,
            paid_amount: self.paid_amount,
            status: self.status,
        }
    }

    /// Applies a payment, returning the updated payable
    ///
    /// # Errors
    ///
    /// See [`InvoiceBalance::settle`].
    pub fn apply_payment(&self, intent: &PaymentIntent, now: DateTime<Utc>) -> BillingResult<Self> {
        intent.validate()?;
        let settlement = self.balance().settle(intent.amount, intent.adjustments())?;

        Ok(Payable {
            late_fee: self.late_fee + intent.late_fee.unwrap_or(Decimal::ZERO),
            interest: self.interest + intent.interest.unwrap_or(Decimal::ZERO),
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

    /// Drawer outflow recording a payment of this payable
    pub fn payment_movement(&self, intent: &PaymentIntent) -> NewMovement {
        let description = match &self.supplier {
            Some(supplier) => format!("Payment made: {} ({})", self.description, supplier),
            None => format!("Payment made: {}", self.description),
        };

        NewMovement {
            kind: MovementKind::Out,
            amount: intent.amount,
            description,
            payment_method: intent.payment_method,
            category: self.category.clone(),
            receivable_id: None,
            payable_id: Some(self.id),
            created_by: intent.registered_by,
        }
    }

    /// Inserts a payable built with [`NewPayable::into_payable`]
    pub async fn insert<'e, E>(executor: E, payable: &Payable) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Payable>(
            r#"
            INSERT INTO payables (id, tenant_id, description, supplier, category, due_date,
                                  original_amount, discount_amount, late_fee, interest,
                                  final_amount, paid_amount, remaining_amount, status, notes,
                                  paid_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $17)
            RETURNING id, tenant_id, description, supplier, category, due_date, original_amount,
                      discount_amount, late_fee, interest, final_amount, paid_amount,
                      remaining_amount, status, payment_method, paid_at, notes, created_at,
                      updated_at
            "#,
        )
        .bind(payable.id)
        .bind(payable.tenant_id)
        .bind(&payable.description)
        .bind(&payable.supplier)
        .bind(&payable.category)
        .bind(payable.due_date)
        .bind(payable.original_amount)
        .bind(payable.discount_amount)
        .bind(payable.late_fee)
        .bind(payable.interest)
        .bind(payable.final_amount)
        .bind(payable.paid_amount)
        .bind(payable.remaining_amount)
        .bind(payable.status)
        .bind(&payable.notes)
        .bind(payable.paid_at)
        .bind(payable.created_at)
        .fetch_one(executor)
        .await
    }

    /// Finds a payable by ID with tenant isolation
    pub async fn find_by_id_and_tenant<'e, E>(
        executor: E,
        id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Payable>(
            r#"
            SELECT id, tenant_id, description, supplier, category, due_date, original_amount,
                   discount_amount, late_fee, interest, final_amount, paid_amount,
                   remaining_amount, status, payment_method, paid_at, notes, created_at,
                   updated_at
            FROM payables
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(executor)
        .await
    }

    /// Finds and row-locks a payable (must run inside a transaction)
    pub async fn lock<'e, E>(executor: E, id: Uuid, tenant_id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Payable>(
            r#"
            SELECT id, tenant_id, description, supplier, category, due_date, original_amount,
                   discount_amount, late_fee, interest, final_amount, paid_amount,
                   remaining_amount, status, payment_method, paid_at, notes, created_at,
                   updated_at
            FROM payables
            WHERE id = $1 AND tenant_id = $2
            FOR UPDATE
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(executor)
        .await
    }

    /// Persists the payment fields of a payable returned by [`Payable::apply_payment`]
    pub async fn save_payment<'e, E>(&self, executor: E) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            UPDATE payables
            SET late_fee = $2, interest = $3, final_amount = $4, paid_amount = $5,
                remaining_amount = $6, status = $7, payment_method = $8, paid_at = $9,
                updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(self.id)
        .bind(self.late_fee)
        .bind(self.interest)
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

    /// Sets the status of a payable
    pub async fn set_status<'e, E>(
        executor: E,
        id: Uuid,
        status: InvoiceStatus,
    ) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query("UPDATE payables SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Marks pending payables due before `today` as overdue
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
            UPDATE payables
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

#[cfg(test)]
mod tests {
    use super::*;

    fn new_payable(amount: i64) -> NewPayable {
        NewPayable {
            tenant_id: Uuid::new_v4(),
            description: "Electricity bill".to_string(),
            supplier: Some("Power Co".to_string()),
            category: "utilities".to_string(),
            due_date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            amount: Decimal::from(amount),
            discount: None,
            notes: None,
        }
    }

    #[test]
    fn test_payable_validation() {
        assert!(new_payable(0).into_payable(Utc::now()).is_err());

        let mut input = new_payable(10);
        input.description = " ".to_string();
        assert!(matches!(
            input.into_payable(Utc::now()),
            Err(BillingError::Validation { ref field, .. }) if field == "description"
        ));

        let mut input = new_payable(10);
        input.discount = Some(Decimal::from(4));
        let payable = input.into_payable(Utc::now()).unwrap();
        assert_eq!(payable.final_amount, Decimal::from(6));
        assert_eq!(payable.remaining_amount, Decimal::from(6));
    }

    #[test]
    fn test_payment_with_late_fee_and_interest() {
        let payable = new_payable(100).into_payable(Utc::now()).unwrap();
        let mut intent = PaymentIntent::new(Decimal::from(107), PaymentMethod::BankTransfer);
        intent.late_fee = Some(Decimal::from(5));
        intent.interest = Some(Decimal::from(2));

        let paid = payable.apply_payment(&intent, Utc::now()).unwrap();
        assert_eq!(paid.late_fee, Decimal::from(5));
        assert_eq!(paid.interest, Decimal::from(2));
        assert_eq!(paid.final_amount, Decimal::from(107));
        assert_eq!(paid.status, InvoiceStatus::Paid);
    }

    #[test]
    fn test_payment_movement_is_outflow() {
        let payable = new_payable(100).into_payable(Utc::now()).unwrap();
        let movement = payable.payment_movement(&PaymentIntent::new(Decimal::from(50), PaymentMethod::Cash));

        assert_eq!(movement.kind, MovementKind::Out);
        assert_eq!(movement.payable_id, Some(payable.id));
        assert_eq!(movement.category, "utilities");
        assert_eq!(movement.description, "Payment made: Electricity bill (Power Co)");
    }
}
