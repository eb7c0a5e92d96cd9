/// Persistence seam of the billing core
///
/// Services talk to storage only through [`BillingStore`]. Two
/// implementations ship with the crate:
///
/// - [`postgres::PgStore`]: production store; multi-step operations run in a
///   single transaction with the affected rows locked `FOR UPDATE`
/// - [`memory::MemoryStore`]: in-process store for tests and local tooling,
///   with the same atomicity (copy-on-write) and fault injection
///
/// Ledger rules (settlement, drawer admission, closing) are methods on the
/// models, so both stores apply them identically; a store only decides how
/// the result is made durable.
///
/// # Example
///
/// ```no_run
/// use gymbill_shared::store::{postgres::PgStore, BillingStore};
/// use sqlx::PgPool;
/// use std::sync::Arc;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, tenant_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let store: Arc<dyn BillingStore> = Arc::new(PgStore::new(pool));
/// let drawer = store.find_open_drawer(tenant_id).await?;
/// println!("open drawer: {:?}", drawer.map(|d| d.number));
/// # Ok(())
/// # }
/// ```

pub mod memory;
pub mod postgres;

use crate::calendar::PeriodReference;
use crate::error::BillingResult;
use crate::models::cash_drawer::{BalanceGuard, CashDrawer, ClosingSummary, Movement, NewMovement};
use crate::models::invoice::PaymentIntent;
use crate::models::membership::Membership;
use crate::models::payable::Payable;
use crate::models::plan::{Discount, Plan};
use crate::models::receivable::Receivable;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// Result of a registered payment
#[derive(Debug, Clone, Serialize)]
pub struct PaymentReceipt<T> {
    /// Invoice after the payment
    pub invoice: T,

    /// Drawer movement posted for the payment
    pub movement: Movement,
}

/// Storage operations used by the billing core
///
/// Every method that takes a `tenant_id` only sees that tenant's rows; an
/// entity belonging to another tenant is reported as not found.
#[async_trait]
pub trait BillingStore: Send + Sync {
    /// Verifies the store is reachable
    async fn ping(&self) -> BillingResult<()>;

    // Catalog and memberships

    /// Active memberships on recurring plans, optionally for one tenant
    async fn active_recurring_memberships(&self, tenant_id: Option<Uuid>) -> BillingResult<Vec<Membership>>;

    async fn find_plan(&self, plan_id: Uuid, tenant_id: Uuid) -> BillingResult<Option<Plan>>;

    async fn find_discount(&self, discount_id: Uuid, tenant_id: Uuid) -> BillingResult<Option<Discount>>;

    /// Moves a membership's paid-through cursor
    ///
    /// NotFound if the membership no longer exists.
    async fn update_membership_end_date(&self, membership_id: Uuid, end_date: NaiveDate) -> BillingResult<()>;

    /// Inserts a membership and its first receivable atomically
    ///
    /// The receivable's `membership_id` is set to the membership's id.
    async fn enroll(&self, membership: Membership, first_invoice: Receivable) -> BillingResult<(Membership, Receivable)>;

    // Receivables

    /// Live (not cancelled) receivable for a membership's billing period
    async fn find_receivable_for_period(
        &self,
        membership_id: Uuid,
        member_id: Uuid,
        plan_id: Uuid,
        period: &PeriodReference,
    ) -> BillingResult<Option<Receivable>>;

    /// Inserts a receivable
    ///
    /// Returns `None` when a live receivable already exists for the same
    /// membership and period (the insert lost a race).
    async fn insert_receivable(&self, receivable: Receivable) -> BillingResult<Option<Receivable>>;

    async fn find_receivable(&self, id: Uuid, tenant_id: Uuid) -> BillingResult<Option<Receivable>>;

    /// Cancels an unpaid receivable
    async fn cancel_receivable(&self, id: Uuid, tenant_id: Uuid) -> BillingResult<Receivable>;

    /// Marks pending receivables due before `today` as overdue
    async fn mark_receivables_overdue(&self, today: NaiveDate, tenant_id: Option<Uuid>) -> BillingResult<u64>;

    /// Applies a payment to a receivable and posts the inflow to the open
    /// drawer, atomically
    async fn register_receivable_payment(
        &self,
        id: Uuid,
        tenant_id: Uuid,
        intent: &PaymentIntent,
        now: DateTime<Utc>,
    ) -> BillingResult<PaymentReceipt<Receivable>>;

    // Payables

    async fn insert_payable(&self, payable: Payable) -> BillingResult<Payable>;

    async fn find_payable(&self, id: Uuid, tenant_id: Uuid) -> BillingResult<Option<Payable>>;

    /// Cancels an unpaid payable
    async fn cancel_payable(&self, id: Uuid, tenant_id: Uuid) -> BillingResult<Payable>;

    /// Marks pending payables due before `today` as overdue
    async fn mark_payables_overdue(&self, today: NaiveDate, tenant_id: Option<Uuid>) -> BillingResult<u64>;

    /// Applies a payment to a payable and posts the outflow to the open
    /// drawer, atomically
    async fn register_payable_payment(
        &self,
        id: Uuid,
        tenant_id: Uuid,
        intent: &PaymentIntent,
        now: DateTime<Utc>,
    ) -> BillingResult<PaymentReceipt<Payable>>;

    // Cash drawers

    /// Opens a drawer with the next sequential number
    ///
    /// Conflict if the tenant already has an open drawer.
    async fn open_drawer(
        &self,
        tenant_id: Uuid,
        opening_amount: Decimal,
        opened_by: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> BillingResult<CashDrawer>;

    /// The tenant's open drawer with its movements
    async fn find_open_drawer(&self, tenant_id: Uuid) -> BillingResult<Option<CashDrawer>>;

    /// A drawer with its movements
    async fn find_drawer(&self, drawer_id: Uuid, tenant_id: Uuid) -> BillingResult<Option<CashDrawer>>;

    /// Posts a movement to an open drawer and updates its totals
    async fn post_movement(
        &self,
        drawer_id: Uuid,
        tenant_id: Uuid,
        movement: NewMovement,
        guard: BalanceGuard,
        now: DateTime<Utc>,
    ) -> BillingResult<Movement>;

    /// Removes a movement from an open drawer and reverses its totals effect
    async fn remove_movement(&self, drawer_id: Uuid, tenant_id: Uuid, movement_id: Uuid) -> BillingResult<Movement>;

    /// Closes a drawer with the counted amount
    async fn close_drawer(
        &self,
        drawer_id: Uuid,
        tenant_id: Uuid,
        closing_amount: Decimal,
        closed_by: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> BillingResult<(CashDrawer, ClosingSummary)>;
}
