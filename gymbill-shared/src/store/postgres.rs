/// PostgreSQL implementation of [`BillingStore`]
///
/// Single-statement operations go straight to the pool. Multi-step operations
/// open a transaction, lock the rows they change with `SELECT ... FOR UPDATE`,
/// apply the model's ledger rule and commit. Dropping the transaction on any
/// `?` rolls it back, so a failed drawer insert never leaves a paid invoice
/// behind.
///
/// ```text
/// register_receivable_payment
///   BEGIN
///   ├─ lock receivable           (NotFound / Conflict if paid or cancelled)
///   ├─ apply payment             (Conflict on overpayment)
///   ├─ UPDATE receivable
///   ├─ lock open drawer          (Conflict if none)
///   ├─ INSERT movement + totals
///   COMMIT
/// ```

use super::{BillingStore, PaymentReceipt};
use crate::calendar::PeriodReference;
use crate::db::{is_unique_violation, violated_constraint};
use crate::error::{BillingError, BillingResult};
use crate::models::cash_drawer::{BalanceGuard, CashDrawer, ClosingSummary, Movement, NewMovement};
use crate::models::invoice::{InvoiceKind, InvoiceStatus, PaymentIntent};
use crate::models::membership::Membership;
use crate::models::payable::Payable;
use crate::models::plan::{Discount, Plan};
use crate::models::receivable::Receivable;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, warn};
use uuid::Uuid;

/// Message returned when a payment arrives with no open drawer
pub const NO_OPEN_DRAWER: &str =
    "No open cash drawer for this tenant; open a drawer before registering payments";

/// PostgreSQL-backed store
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Loads a drawer's movements into it
    async fn with_movements(
        conn: &mut PgConnection,
        drawer: Option<CashDrawer>,
    ) -> BillingResult<Option<CashDrawer>> {
        match drawer {
            Some(mut drawer) => {
                drawer.movements = Movement::list_for_drawer(&mut *conn, drawer.id).await?;
                Ok(Some(drawer))
            }
            None => Ok(None),
        }
    }

    /// Posts an admitted movement on a locked drawer
    ///
    /// Shared by manual postings and payment registration; the caller owns
    /// the transaction.
    pub async fn post_on_locked_drawer(
        conn: &mut PgConnection,
        drawer: &mut CashDrawer,
        movement: NewMovement,
        guard: BalanceGuard,
        now: DateTime<Utc>,
    ) -> BillingResult<Movement> {
        drawer.admit(&movement, guard)?;

        let movement = movement.into_movement(drawer.id, drawer.tenant_id, now);
        let stored = Movement::insert(&mut *conn, &movement).await?;

        drawer.record(stored.clone());
        drawer.save_totals(&mut *conn).await?;

        Ok(stored)
    }

    /// Locks the tenant's open drawer, or fails with a descriptive conflict
    async fn lock_open_drawer(conn: &mut PgConnection, tenant_id: Uuid) -> BillingResult<CashDrawer> {
        CashDrawer::lock_open(&mut *conn, tenant_id)
            .await?
            .ok_or_else(|| BillingError::conflict(NO_OPEN_DRAWER))
    }
}

#[async_trait]
impl BillingStore for PgStore {
    async fn ping(&self) -> BillingResult<()> {
        crate::db::pool::health_check(&self.pool).await?;
        Ok(())
    }

    async fn active_recurring_memberships(&self, tenant_id: Option<Uuid>) -> BillingResult<Vec<Membership>> {
        Ok(Membership::list_active_recurring(&self.pool, tenant_id).await?)
    }

    async fn find_plan(&self, plan_id: Uuid, tenant_id: Uuid) -> BillingResult<Option<Plan>> {
        Ok(Plan::find_by_id_and_tenant(&self.pool, plan_id, tenant_id).await?)
    }

    async fn find_discount(&self, discount_id: Uuid, tenant_id: Uuid) -> BillingResult<Option<Discount>> {
        Ok(Discount::find_by_id_and_tenant(&self.pool, discount_id, tenant_id).await?)
    }

    async fn update_membership_end_date(&self, membership_id: Uuid, end_date: NaiveDate) -> BillingResult<()> {
        if Membership::update_end_date(&self.pool, membership_id, end_date).await? {
            Ok(())
        } else {
            Err(BillingError::not_found("Membership"))
        }
    }

    async fn enroll(&self, membership: Membership, first_invoice: Receivable) -> BillingResult<(Membership, Receivable)> {
        let mut tx = self.pool.begin().await?;

        let membership = Membership::insert(&mut *tx, &membership).await?;
        let first_invoice = Receivable {
            membership_id: Some(membership.id),
            ..first_invoice
        };
        let receivable = Receivable::insert(&mut *tx, &first_invoice).await?;

        tx.commit().await?;
        Ok((membership, receivable))
    }

    async fn find_receivable_for_period(
        &self,
        membership_id: Uuid,
        member_id: Uuid,
        plan_id: Uuid,
        period: &PeriodReference,
    ) -> BillingResult<Option<Receivable>> {
        Ok(Receivable::find_for_period(&self.pool, membership_id, member_id, plan_id, period).await?)
    }

    async fn insert_receivable(&self, receivable: Receivable) -> BillingResult<Option<Receivable>> {
        match Receivable::insert(&self.pool, &receivable).await {
            Ok(stored) => Ok(Some(stored)),
            Err(e) if is_unique_violation(&e) => {
                debug!(
                    membership_id = ?receivable.membership_id,
                    constraint = ?violated_constraint(&e),
                    "Receivable already exists for period"
                );
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_receivable(&self, id: Uuid, tenant_id: Uuid) -> BillingResult<Option<Receivable>> {
        Ok(Receivable::find_by_id_and_tenant(&self.pool, id, tenant_id).await?)
    }

    async fn cancel_receivable(&self, id: Uuid, tenant_id: Uuid) -> BillingResult<Receivable> {
        let mut tx = self.pool.begin().await?;

        let mut receivable = Receivable::lock(&mut *tx, id, tenant_id)
            .await?
            .ok_or_else(|| BillingError::not_found("Receivable"))?;
        receivable.status.ensure_cancellable(InvoiceKind::Receivable)?;

        Receivable::set_status(&mut *tx, id, InvoiceStatus::Cancelled).await?;
        tx.commit().await?;

        receivable.status = InvoiceStatus::Cancelled;
        Ok(receivable)
    }

    async fn mark_receivables_overdue(&self, today: NaiveDate, tenant_id: Option<Uuid>) -> BillingResult<u64> {
        Ok(Receivable::mark_overdue(&self.pool, today, tenant_id).await?)
    }

    async fn register_receivable_payment(
        &self,
        id: Uuid,
        tenant_id: Uuid,
        intent: &PaymentIntent,
        now: DateTime<Utc>,
    ) -> BillingResult<PaymentReceipt<Receivable>> {
        let mut tx = self.pool.begin().await?;

        let receivable = Receivable::lock(&mut *tx, id, tenant_id)
            .await?
            .ok_or_else(|| BillingError::not_found("Receivable"))?;
        let updated = receivable.apply_payment(intent, now)?;
        updated.save_payment(&mut *tx).await?;

        let mut drawer = Self::lock_open_drawer(&mut tx, tenant_id).await?;
        let movement = Self::post_on_locked_drawer(
            &mut tx,
            &mut drawer,
            updated.payment_movement(intent),
            BalanceGuard::Unchecked,
            now,
        )
        .await?;

        tx.commit().await?;
        Ok(PaymentReceipt {
            invoice: updated,
            movement,
        })
    }

    async fn insert_payable(&self, payable: Payable) -> BillingResult<Payable> {
        Ok(Payable::insert(&self.pool, &payable).await?)
    }

    async fn find_payable(&self, id: Uuid, tenant_id: Uuid) -> BillingResult<Option<Payable>> {
        Ok(Payable::find_by_id_and_tenant(&self.pool, id, tenant_id).await?)
    }

    async fn cancel_payable(&self, id: Uuid, tenant_id: Uuid) -> BillingResult<Payable> {
        let mut tx = self.pool.begin().await?;

        let mut payable = Payable::lock(&mut *tx, id, tenant_id)
            .await?
            .ok_or_else(|| BillingError::not_found("Payable"))?;
        payable.status.ensure_cancellable(InvoiceKind::Payable)?;

        Payable::set_status(&mut *tx, id, InvoiceStatus::Cancelled).await?;
        tx.commit().await?;

        payable.status = InvoiceStatus::Cancelled;
        Ok(payable)
    }

    async fn mark_payables_overdue(&self, today: NaiveDate, tenant_id: Option<Uuid>) -> BillingResult<u64> {
        Ok(Payable::mark_overdue(&self.pool, today, tenant_id).await?)
    }

    async fn register_payable_payment(
        &self,
        id: Uuid,
        tenant_id: Uuid,
        intent: &PaymentIntent,
        now: DateTime<Utc>,
    ) -> BillingResult<PaymentReceipt<Payable>> {
        let mut tx = self.pool.begin().await?;

        let payable = Payable::lock(&mut *tx, id, tenant_id)
            .await?
            .ok_or_else(|| BillingError::not_found("Payable"))?;
        let updated = payable.apply_payment(intent, now)?;
        updated.save_payment(&mut *tx).await?;

        let mut drawer = Self::lock_open_drawer(&mut tx, tenant_id).await?;
        let movement = Self::post_on_locked_drawer(
            &mut tx,
            &mut drawer,
            updated.payment_movement(intent),
            BalanceGuard::Unchecked,
            now,
        )
        .await?;

        tx.commit().await?;
        Ok(PaymentReceipt {
            invoice: updated,
            movement,
        })
    }

    async fn open_drawer(
        &self,
        tenant_id: Uuid,
        opening_amount: Decimal,
        opened_by: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> BillingResult<CashDrawer> {
        let mut tx = self.pool.begin().await?;

        if let Some(open) = CashDrawer::find_open(&mut *tx, tenant_id).await? {
            return Err(BillingError::conflict(format!(
                "Cash drawer #{} is already open for this tenant",
                open.number
            )));
        }

        let number = CashDrawer::next_number(&mut *tx, tenant_id).await?;
        let drawer = CashDrawer::opened(tenant_id, number, opening_amount, opened_by, now);

        let stored = match CashDrawer::insert(&mut *tx, &drawer).await {
            Ok(stored) => stored,
            Err(e) if is_unique_violation(&e) => {
                warn!(
                    tenant_id = %tenant_id,
                    constraint = ?violated_constraint(&e),
                    "Concurrent drawer open rejected"
                );
                return Err(BillingError::conflict("A cash drawer is already open for this tenant"));
            }
            Err(e) => return Err(e.into()),
        };

        tx.commit().await?;
        Ok(stored)
    }

    async fn find_open_drawer(&self, tenant_id: Uuid) -> BillingResult<Option<CashDrawer>> {
        let mut conn = self.pool.acquire().await?;
        let drawer = CashDrawer::find_open(&mut *conn, tenant_id).await?;
        Self::with_movements(&mut conn, drawer).await
    }

    async fn find_drawer(&self, drawer_id: Uuid, tenant_id: Uuid) -> BillingResult<Option<CashDrawer>> {
        let mut conn = self.pool.acquire().await?;
        let drawer = CashDrawer::find_by_id_and_tenant(&mut *conn, drawer_id, tenant_id).await?;
        Self::with_movements(&mut conn, drawer).await
    }

    async fn post_movement(
        &self,
        drawer_id: Uuid,
        tenant_id: Uuid,
        movement: NewMovement,
        guard: BalanceGuard,
        now: DateTime<Utc>,
    ) -> BillingResult<Movement> {
        let mut tx = self.pool.begin().await?;

        let mut drawer = CashDrawer::lock(&mut *tx, drawer_id, tenant_id)
            .await?
            .ok_or_else(|| BillingError::not_found("Cash drawer"))?;
        let stored = Self::post_on_locked_drawer(&mut tx, &mut drawer, movement, guard, now).await?;

        tx.commit().await?;
        Ok(stored)
    }

    async fn remove_movement(&self, drawer_id: Uuid, tenant_id: Uuid, movement_id: Uuid) -> BillingResult<Movement> {
        let mut tx = self.pool.begin().await?;

        let mut drawer = CashDrawer::lock(&mut *tx, drawer_id, tenant_id)
            .await?
            .ok_or_else(|| BillingError::not_found("Cash drawer"))?;
        drawer.ensure_open()?;

        let removed = Movement::delete(&mut *tx, movement_id, drawer_id)
            .await?
            .ok_or_else(|| BillingError::not_found("Movement"))?;
        drawer.reverse(&removed);
        drawer.save_totals(&mut *tx).await?;

        tx.commit().await?;
        Ok(removed)
    }

    async fn close_drawer(
        &self,
        drawer_id: Uuid,
        tenant_id: Uuid,
        closing_amount: Decimal,
        closed_by: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> BillingResult<(CashDrawer, ClosingSummary)> {
        let mut tx = self.pool.begin().await?;

        let mut drawer = CashDrawer::lock(&mut *tx, drawer_id, tenant_id)
            .await?
            .ok_or_else(|| BillingError::not_found("Cash drawer"))?;
        let summary = drawer.close(closing_amount, closed_by, now)?;
        drawer.save_closing(&mut *tx).await?;
        drawer.movements = Movement::list_for_drawer(&mut *tx, drawer.id).await?;

        tx.commit().await?;
        Ok((drawer, summary))
    }
}
