/// Cash drawer ("caixa") model and database operations
///
/// A drawer is one cash session of a tenant: it is opened with a float, every
/// payment and manual entry is posted to it as a movement, and it is closed
/// with the counted amount. A tenant has at most one open drawer at a time.
///
/// The ledger rules live on [`CashDrawer`] as plain methods so that every store
/// applies them identically; the database functions only persist the result.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE drawer_status AS ENUM ('open', 'closed');
/// CREATE TYPE movement_kind AS ENUM ('in', 'out');
///
/// CREATE TABLE cash_drawers (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     tenant_id UUID NOT NULL,
///     number INTEGER NOT NULL,
///     opened_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     opened_by UUID,
///     opening_amount NUMERIC(12, 2) NOT NULL CHECK (opening_amount >= 0),
///     closed_at TIMESTAMPTZ,
///     closed_by UUID,
///     closing_amount NUMERIC(12, 2),
///     closing_difference NUMERIC(12, 2),
///     closing_note TEXT,
///     total_in NUMERIC(12, 2) NOT NULL DEFAULT 0,
///     total_out NUMERIC(12, 2) NOT NULL DEFAULT 0,
///     status drawer_status NOT NULL DEFAULT 'open',
///     UNIQUE (tenant_id, number)
/// );
///
/// CREATE UNIQUE INDEX cash_drawers_one_open_per_tenant
///     ON cash_drawers (tenant_id) WHERE status = 'open';
/// ```
///
/// # Example
///
/// ```
/// use gymbill_shared::models::cash_drawer::closing_note;
/// use rust_decimal::Decimal;
///
/// assert_eq!(closing_note(Decimal::ZERO), "balanced");
/// assert_eq!(closing_note(Decimal::new(-1050, 2)), "shortage of 10.50");
/// ```

use super::invoice::PaymentMethod;
use crate::error::{BillingError, BillingResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgExecutor;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Category used for withdrawals ("sangria")
pub const WITHDRAWAL_CATEGORY: &str = "withdrawal";

/// Category used for supplies ("suprimento")
pub const SUPPLY_CATEGORY: &str = "supply";

/// Drawer status (`closed` is terminal)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "drawer_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DrawerStatus {
    Open,
    Closed,
}

/// Direction of a movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "movement_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    /// Money entering the drawer
    In,

    /// Money leaving the drawer
    Out,
}

/// Whether posting an outflow must keep the drawer balance non-negative
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceGuard {
    /// Post regardless of the balance (payments to suppliers may be paid from
    /// outside the drawer float)
    Unchecked,

    /// Reject outflows above the expected balance
    NotBelowZero,
}

/// A ledger entry posted to a drawer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Movement {
    pub id: Uuid,
    pub drawer_id: Uuid,
    pub tenant_id: Uuid,
    pub kind: MovementKind,
    pub amount: Decimal,
    pub description: String,
    pub payment_method: PaymentMethod,
    pub category: String,
    pub receivable_id: Option<Uuid>,
    pub payable_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Input for posting a movement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMovement {
    pub kind: MovementKind,
    pub amount: Decimal,
    pub description: String,
    pub payment_method: PaymentMethod,
    pub category: String,
    pub receivable_id: Option<Uuid>,
    pub payable_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
}

impl NewMovement {
    /// Builds an unlinked movement
    pub fn new(
        kind: MovementKind,
        amount: Decimal,
        description: impl Into<String>,
        payment_method: PaymentMethod,
        category: impl Into<String>,
    ) -> Self {
        NewMovement {
            kind,
            amount,
            description: description.into(),
            payment_method,
            category: category.into(),
            receivable_id: None,
            payable_id: None,
            created_by: None,
        }
    }

    /// Sets the user posting the movement
    pub fn created_by(mut self, user_id: Option<Uuid>) -> Self {
        self.created_by = user_id;
        self
    }

    /// Validates the movement fields
    pub fn validate(&self) -> BillingResult<()> {
        if self.amount <= Decimal::ZERO {
            return Err(BillingError::validation("amount", "must be greater than zero"));
        }
        if self.description.trim().is_empty() {
            return Err(BillingError::validation("description", "cannot be empty"));
        }
        if self.category.trim().is_empty() {
            return Err(BillingError::validation("category", "cannot be empty"));
        }
        Ok(())
    }

    /// Materializes the movement for a drawer
    pub fn into_movement(self, drawer_id: Uuid, tenant_id: Uuid, now: DateTime<Utc>) -> Movement {
        Movement {
            id: Uuid::new_v4(),
            drawer_id,
            tenant_id,
            kind: self.kind,
            amount: self.amount,
            description: self.description.trim().to_string(),
            payment_method: self.payment_method,
            category: self.category.trim().to_string(),
            receivable_id: self.receivable_id,
            payable_id: self.payable_id,
            created_by: self.created_by,
            created_at: now,
        }
    }
}

/// Cash drawer model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CashDrawer {
    pub id: Uuid,
    pub tenant_id: Uuid,

    /// Sequential per tenant, starting at 1
    pub number: i32,

    pub opened_at: DateTime<Utc>,
    pub opened_by: Option<Uuid>,
    pub opening_amount: Decimal,
    pub closed_at: Option<DateTime<Utc>>,
    pub closed_by: Option<Uuid>,
    pub closing_amount: Option<Decimal>,
    pub closing_difference: Option<Decimal>,
    pub closing_note: Option<String>,
    pub total_in: Decimal,
    pub total_out: Decimal,
    pub status: DrawerStatus,

    /// Movements (loaded separately, empty unless requested)
    #[sqlx(skip)]
    #[serde(default)]
    pub movements: Vec<Movement>,
}

/// Outcome of closing a drawer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClosingSummary {
    pub expected_balance: Decimal,
    pub closing_amount: Decimal,
    pub difference: Decimal,
    pub note: String,
}

/// Read-only summary of a drawer session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrawerReport {
    pub drawer_id: Uuid,
    pub number: i32,
    pub status: DrawerStatus,
    pub opening_amount: Decimal,
    pub total_in: Decimal,
    pub total_out: Decimal,
    pub expected_balance: Decimal,
    pub closing_amount: Option<Decimal>,
    pub closing_difference: Option<Decimal>,
    pub movement_count: usize,
    pub inflows_by_method: BTreeMap<PaymentMethod, Decimal>,
    pub outflows_by_category: BTreeMap<String, Decimal>,
}

/// Human-readable note for a closing difference
pub fn closing_note(difference: Decimal) -> String {
    if difference.is_zero() {
        "balanced".to_string()
    } else if difference > Decimal::ZERO {
        format!("surplus of {}", difference)
    } else {
        format!("shortage of {}", difference.abs())
    }
}

impl CashDrawer {
    /// Builds a freshly opened drawer
    pub fn opened(
        tenant_id: Uuid,
        number: i32,
        opening_amount: Decimal,
        opened_by: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Self {
        CashDrawer {
            id: Uuid::new_v4(),
            tenant_id,
            number,
            opened_at: now,
            opened_by,
            opening_amount,
            closed_at: None,
            closed_by: None,
            closing_amount: None,
            closing_difference: None,
            closing_note: None,
            total_in: Decimal::ZERO,
            total_out: Decimal::ZERO,
            status: DrawerStatus::Open,
            movements: Vec::new(),
        }
    }

    /// Opening amount plus inflows minus outflows
    pub fn expected_balance(&self) -> Decimal {
        self.opening_amount + self.total_in - self.total_out
    }

    pub fn is_open(&self) -> bool {
        self.status == DrawerStatus::Open
    }

    /// Fails with a conflict unless the drawer is open
    pub fn ensure_open(&self) -> BillingResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(BillingError::conflict(format!(
                "Cash drawer #{} is closed",
                self.number
            )))
        }
    }

    /// Checks whether a movement may be posted
    ///
    /// # Errors
    ///
    /// - Conflict if the drawer is closed
    /// - Validation if the movement is malformed
    /// - Conflict if a guarded outflow exceeds the expected balance
    pub fn admit(&self, movement: &NewMovement, guard: BalanceGuard) -> BillingResult<()> {
        self.ensure_open()?;
        movement.validate()?;

        if guard == BalanceGuard::NotBelowZero
            && movement.kind == MovementKind::Out
            && movement.amount > self.expected_balance()
        {
            return Err(BillingError::conflict(format!(
                "Withdrawal of {} exceeds the drawer balance of {}",
                movement.amount,
                self.expected_balance()
            )));
        }

        Ok(())
    }

    /// Appends an admitted movement and updates the running totals
    pub fn record(&mut self, movement: Movement) {
        match movement.kind {
            MovementKind::In => self.total_in += movement.amount,
            MovementKind::Out => self.total_out += movement.amount,
        }
        self.movements.push(movement);
    }

    /// Reverses the totals effect of a movement that was removed from storage
    pub fn reverse(&mut self, movement: &Movement) {
        match movement.kind {
            MovementKind::In => self.total_in -= movement.amount,
            MovementKind::Out => self.total_out -= movement.amount,
        }
        self.movements.retain(|m| m.id != movement.id);
    }

    /// Removes a movement from a loaded, open drawer
    ///
    /// # Errors
    ///
    /// - Conflict if the drawer is closed
    /// - NotFound if the movement is not part of the drawer
    pub fn unrecord(&mut self, movement_id: Uuid) -> BillingResult<Movement> {
        self.ensure_open()?;

        let movement = self
            .movements
            .iter()
            .find(|m| m.id == movement_id)
            .cloned()
            .ok_or_else(|| BillingError::not_found("Movement"))?;

        self.reverse(&movement);
        Ok(movement)
    }

    /// Closes the drawer with the counted amount
    ///
    /// # Errors
    ///
    /// - Conflict if the drawer is already closed
    /// - Validation if the counted amount is negative
    pub fn close(
        &mut self,
        closing_amount: Decimal,
        closed_by: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> BillingResult<ClosingSummary> {
        if !self.is_open() {
            return Err(BillingError::conflict(format!(
                "Cash drawer #{} is already closed",
                self.number
            )));
        }
        if closing_amount < Decimal::ZERO {
            return Err(BillingError::validation("closing_amount", "cannot be negative"));
        }

        let expected_balance = self.expected_balance();
        let difference = closing_amount - expected_balance;
        let note = closing_note(difference);

        self.status = DrawerStatus::Closed;
        self.closed_at = Some(now);
        self.closed_by = closed_by;
        self.closing_amount = Some(closing_amount);
        self.closing_difference = Some(difference);
        self.closing_note = Some(note.clone());

        Ok(ClosingSummary {
            expected_balance,
            closing_amount,
            difference,
            note,
        })
    }

    /// Builds the drawer report from the loaded movements
    pub fn report(&self) -> DrawerReport {
        let mut inflows_by_method: BTreeMap<PaymentMethod, Decimal> = BTreeMap::new();
        let mut outflows_by_category: BTreeMap<String, Decimal> = BTreeMap::new();

        for movement in &self.movements {
            match movement.kind {
                MovementKind::In => {
                    *inflows_by_method.entry(movement.payment_method).or_default() += movement.amount;
                }
                MovementKind::Out => {
                    *outflows_by_category.entry(movement.category.clone()).or_default() +=
                        movement.amount;
                }
            }
        }

        DrawerReport {
            drawer_id: self.id,
            number: self.number,
            status: self.status,
            opening_amount: self.opening_amount,
            total_in: self.total_in,
            total_out: self.total_out,
            expected_balance: self.expected_balance(),
            closing_amount: self.closing_amount,
            closing_difference: self.closing_difference,
            movement_count: self.movements.len(),
            inflows_by_method,
            outflows_by_category,
        }
    }

    /// Next sequential drawer number for a tenant
    pub async fn next_number<'e, E>(executor: E, tenant_id: Uuid) -> Result<i32, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, i32>(
            "SELECT COALESCE(MAX(number), 0) + 1 FROM cash_drawers WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_one(executor)
        .await
    }

    /// Inserts a drawer built with [`CashDrawer::opened`]
    ///
    /// # Errors
    ///
    /// A unique violation means another drawer is already open for the tenant
    /// (or the number was taken concurrently).
    pub async fn insert<'e, E>(executor: E, drawer: &CashDrawer) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, CashDrawer>(
            r#"
            INSERT INTO cash_drawers (id, tenant_id, number, opened_at, opened_by, opening_amount,
                                      total_in, total_out, status)
            VALUES ($1, $2, $3, $4, $5, $6, 0, 0, 'open')
            RETURNING id, tenant_id, number, opened_at, opened_by, opening_amount, closed_at,
                      closed_by, closing_amount, closing_difference, closing_note, total_in,
                      total_out, status
            "#,
        )
        .bind(drawer.id)
        .bind(drawer.tenant_id)
        .bind(drawer.number)
        .bind(drawer.opened_at)
        .bind(drawer.opened_by)
        .bind(drawer.opening_amount)
        .fetch_one(executor)
        .await
    }

    /// Finds the tenant's open drawer (movements not loaded)
    pub async fn find_open<'e, E>(executor: E, tenant_id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, CashDrawer>(
            r#"
            SELECT id, tenant_id, number, opened_at, opened_by, opening_amount, closed_at,
                   closed_by, closing_amount, closing_difference, closing_note, total_in,
                   total_out, status
            FROM cash_drawers
            WHERE tenant_id = $1 AND status = 'open'
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(executor)
        .await
    }

    /// Finds and row-locks the tenant's open drawer
    ///
    /// Must run inside a transaction.
    pub async fn lock_open<'e, E>(executor: E, tenant_id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, CashDrawer>(
            r#"
            SELECT id, tenant_id, number, opened_at, opened_by, opening_amount, closed_at,
                   closed_by, closing_amount, closing_difference, closing_note, total_in,
                   total_out, status
            FROM cash_drawers
            WHERE tenant_id = $1 AND status = 'open'
            FOR UPDATE
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(executor)
        .await
    }

    /// Finds a drawer by ID with tenant isolation (movements not loaded)
    pub async fn find_by_id_and_tenant<'e, E>(
        executor: E,
        id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, CashDrawer>(
            r#"
            SELECT id, tenant_id, number, opened_at, opened_by, opening_amount, closed_at,
                   closed_by, closing_amount, closing_difference, closing_note, total_in,
                   total_out, status
            FROM cash_drawers
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(executor)
        .await
    }

    /// Row-locks a drawer by ID with tenant isolation
    pub async fn lock<'e, E>(executor: E, id: Uuid, tenant_id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, CashDrawer>(
            r#"
            SELECT id, tenant_id, number, opened_at, opened_by, opening_amount, closed_at,
                   closed_by, closing_amount, closing_difference, closing_note, total_in,
                   total_out, status
            FROM cash_drawers
            WHERE id = $1 AND tenant_id = $2
            FOR UPDATE
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(executor)
        .await
    }

    /// Writes the running totals
    pub async fn save_totals<'e, E>(&self, executor: E) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query("UPDATE cash_drawers SET total_in = $2, total_out = $3 WHERE id = $1")
            .bind(self.id)
            .bind(self.total_in)
            .bind(self.total_out)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Writes the closing fields
    pub async fn save_closing<'e, E>(&self, executor: E) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            UPDATE cash_drawers
            SET status = $2, closed_at = $3, closed_by = $4, closing_amount = $5,
                closing_difference = $6, closing_note = $7
            WHERE id = $1
            "#,
        )
        .bind(self.id)
        .bind(self.status)
        .bind(self.closed_at)
        .bind(self.closed_by)
        .bind(self.closing_amount)
        .bind(self.closing_difference)
        .bind(&self.closing_note)
        .execute(executor)
        .await?;
        Ok(())
    }
}

impl Movement {
    /// Inserts a materialized movement
    pub async fn insert<'e, E>(executor: E, movement: &Movement) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Movement>(
            r#"
            INSERT INTO cash_movements (id, drawer_id, tenant_id, kind, amount, description,
                                        payment_method, category, receivable_id, payable_id,
                                        created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id, drawer_id, tenant_id, kind, amount, description, payment_method,
                      category, receivable_id, payable_id, created_by, created_at
            "#,
        )
        .bind(movement.id)
        .bind(movement.drawer_id)
        .bind(movement.tenant_id)
        .bind(movement.kind)
        .bind(movement.amount)
        .bind(&movement.description)
        .bind(movement.payment_method)
        .bind(&movement.category)
        .bind(movement.receivable_id)
        .bind(movement.payable_id)
        .bind(movement.created_by)
        .bind(movement.created_at)
        .fetch_one(executor)
        .await
    }

    /// Deletes a movement from a drawer, returning it if it existed
    pub async fn delete<'e, E>(
        executor: E,
        id: Uuid,
        drawer_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Movement>(
            r#"
            DELETE FROM cash_movements
            WHERE id = $1 AND drawer_id = $2
            RETURNING id, drawer_id, tenant_id, kind, amount, description, payment_method,
                      category, receivable_id, payable_id, created_by, created_at
            "#,
        )
        .bind(id)
        .bind(drawer_id)
        .fetch_optional(executor)
        .await
    }

    /// Lists a drawer's movements in posting order
    pub async fn list_for_drawer<'e, E>(executor: E, drawer_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Movement>(
            r#"
            SELECT id, drawer_id, tenant_id, kind, amount, description, payment_method,
                   category, receivable_id, payable_id, created_by, created_at
            FROM cash_movements
            WHERE drawer_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(drawer_id)
        .fetch_all(executor)
        .await
    }
}
