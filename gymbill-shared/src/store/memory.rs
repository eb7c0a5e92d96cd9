/// In-memory implementation of [`BillingStore`]
///
/// Used by the service and HTTP test suites and for local tooling. Every
/// multi-step operation runs against a copy of the state that replaces the
/// original only if the whole operation succeeds, which gives the same
/// all-or-nothing behavior as a database transaction.
///
/// Faults can be injected to exercise failure paths:
///
/// ```
/// use gymbill_shared::store::memory::{Faults, MemoryStore};
///
/// # async fn example() {
/// let store = MemoryStore::new();
/// store.set_faults(Faults { fail_movement_insert: true, ..Faults::default() }).await;
/// // register_receivable_payment now fails after updating the invoice,
/// // and the update is discarded.
/// # }
/// ```

use super::{BillingStore, PaymentReceipt};
use super::postgres::NO_OPEN_DRAWER;
use crate::calendar::PeriodReference;
use crate::error::{BillingError, BillingResult};
use crate::models::cash_drawer::{BalanceGuard, CashDrawer, ClosingSummary, Movement, NewMovement};
use crate::models::invoice::{InvoiceKind, InvoiceStatus, PaymentIntent};
use crate::models::membership::{Membership, MembershipStatus};
use crate::models::payable::Payable;
use crate::models::plan::{Discount, Plan};
use crate::models::receivable::Receivable;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Failures to inject into the next operations
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// Fail every drawer movement insert
    pub fail_movement_insert: bool,

    /// Fail every membership end-date update
    pub fail_end_date_update: bool,

    /// Fail every receivable insert
    pub fail_receivable_insert: bool,

    /// Fail receivable inserts for these memberships
    pub fail_receivable_insert_for: HashSet<Uuid>,
}

impl Faults {
    fn fails_receivable_for(&self, membership_id: Option<Uuid>) -> bool {
        self.fail_receivable_insert
            || membership_id.is_some_and(|id| self.fail_receivable_insert_for.contains(&id))
    }
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    plans: HashMap<Uuid, Plan>,
    discounts: HashMap<Uuid, Discount>,
    memberships: HashMap<Uuid, Membership>,
    receivables: HashMap<Uuid, Receivable>,
    payables: HashMap<Uuid, Payable>,
    drawers: HashMap<Uuid, CashDrawer>,
}

impl MemoryState {
    fn open_drawer_id(&self, tenant_id: Uuid) -> Option<Uuid> {
        self.drawers
            .values()
            .find(|d| d.tenant_id == tenant_id && d.is_open())
            .map(|d| d.id)
    }

    fn drawer_mut(&mut self, drawer_id: Uuid, tenant_id: Uuid) -> BillingResult<&mut CashDrawer> {
        self.drawers
            .get_mut(&drawer_id)
            .filter(|d| d.tenant_id == tenant_id)
            .ok_or_else(|| BillingError::not_found("Cash drawer"))
    }

    fn period_taken(&self, receivable: &Receivable) -> bool {
        match (receivable.membership_id, &receivable.period_reference) {
            (Some(membership_id), Some(period)) => self.receivables.values().any(|r| {
                r.membership_id == Some(membership_id)
                    && r.period_reference.as_ref() == Some(period)
                    && r.status != InvoiceStatus::Cancelled
            }),
            _ => false,
        }
    }

    fn post(
        &mut self,
        drawer_id: Uuid,
        tenant_id: Uuid,
        movement: NewMovement,
        guard: BalanceGuard,
        now: DateTime<Utc>,
        faults: &Faults,
    ) -> BillingResult<Movement> {
        let drawer = self.drawer_mut(drawer_id, tenant_id)?;
        drawer.admit(&movement, guard)?;

        if faults.fail_movement_insert {
            return Err(injected("cash movement insert"));
        }

        let movement = movement.into_movement(drawer.id, drawer.tenant_id, now);
        drawer.record(movement.clone());
        Ok(movement)
    }
}

fn injected(operation: &str) -> BillingError {
    BillingError::Database(sqlx::Error::Protocol(format!("injected failure: {}", operation)))
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    faults: Mutex<Faults>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the injected faults
    pub async fn set_faults(&self, faults: Faults) {
        *self.faults.lock().await = faults;
    }

    /// Seeds a plan
    pub async fn insert_plan(&self, plan: Plan) {
        self.state.lock().await.plans.insert(plan.id, plan);
    }

    /// Seeds a discount
    pub async fn insert_discount(&self, discount: Discount) {
        self.state.lock().await.discounts.insert(discount.id, discount);
    }

    /// Seeds a membership
    pub async fn insert_membership(&self, membership: Membership) {
        self.state.lock().await.memberships.insert(membership.id, membership);
    }

    /// Current state of a membership
    pub async fn membership(&self, id: Uuid) -> Option<Membership> {
        self.state.lock().await.memberships.get(&id).cloned()
    }

    /// All receivables, ordered by due date
    pub async fn receivables(&self) -> Vec<Receivable> {
        let mut receivables: Vec<Receivable> = self.state.lock().await.receivables.values().cloned().collect();
        receivables.sort_by_key(|r| (r.due_date, r.created_at));
        receivables
    }

    /// Runs `operation` on a copy of the state and keeps the copy only on success
    async fn atomically<T>(
        &self,
        operation: impl FnOnce(&mut MemoryState, &Faults) -> BillingResult<T> + Send,
    ) -> BillingResult<T> {
        let faults = self.faults.lock().await.clone();
        let mut state = self.state.lock().await;

        let mut draft = state.clone();
        let result = operation(&mut draft, &faults)?;
        *state = draft;

        Ok(result)
    }
}

#[async_trait]
impl BillingStore for MemoryStore {
    async fn ping(&self) -> BillingResult<()> {
        Ok(())
    }

    async fn active_recurring_memberships(&self, tenant_id: Option<Uuid>) -> BillingResult<Vec<Membership>> {
        let state = self.state.lock().await;
        let mut memberships: Vec<Membership> = state
            .memberships
            .values()
            .filter(|m| m.status == MembershipStatus::Active)
            .filter(|m| tenant_id.map_or(true, |t| m.tenant_id == t))
            .filter(|m| state.plans.get(&m.plan_id).is_some_and(Plan::is_recurring))
            .cloned()
            .collect();
        memberships.sort_by_key(|m| (m.tenant_id, m.created_at));
        Ok(memberships)
    }

    async fn find_plan(&self, plan_id: Uuid, tenant_id: Uuid) -> BillingResult<Option<Plan>> {
        let state = self.state.lock().await;
        Ok(state.plans.get(&plan_id).filter(|p| p.tenant_id == tenant_id).cloned())
    }

    async fn find_discount(&self, discount_id: Uuid, tenant_id: Uuid) -> BillingResult<Option<Discount>> {
        let state = self.state.lock().await;
        Ok(state.discounts.get(&discount_id).filter(|d| d.tenant_id == tenant_id).cloned())
    }

    async fn update_membership_end_date(&self, membership_id: Uuid, end_date: NaiveDate) -> BillingResult<()> {
        self.atomically(|state, faults| {
            if faults.fail_end_date_update {
                return Err(injected("membership end date update"));
            }
            let membership = state
                .memberships
                .get_mut(&membership_id)
                .ok_or_else(|| BillingError::not_found("Membership"))?;
            membership.end_date = end_date;
            membership.updated_at = Utc::now();
            Ok(())
        })
        .await
    }

    async fn enroll(&self, membership: Membership, first_invoice: Receivable) -> BillingResult<(Membership, Receivable)> {
        self.atomically(move |state, faults| {
            if !state.plans.get(&membership.plan_id).is_some_and(|p| p.tenant_id == membership.tenant_id) {
                return Err(BillingError::not_found("Plan"));
            }
            state.memberships.insert(membership.id, membership.clone());

            if faults.fails_receivable_for(Some(membership.id)) {
                return Err(injected("receivable insert"));
            }
            let receivable = Receivable {
                membership_id: Some(membership.id),
                ..first_invoice
            };
            state.receivables.insert(receivable.id, receivable.clone());

            Ok((membership, receivable))
        })
        .await
    }

    async fn find_receivable_for_period(
        &self,
        membership_id: Uuid,
        member_id: Uuid,
        plan_id: Uuid,
        period: &PeriodReference,
    ) -> BillingResult<Option<Receivable>> {
        let state = self.state.lock().await;
        Ok(state
            .receivables
            .values()
            .find(|r| {
                r.membership_id == Some(membership_id)
                    && r.member_id == member_id
                    && r.plan_id == Some(plan_id)
                    && r.period_reference.as_ref() == Some(period)
                    && r.status != InvoiceStatus::Cancelled
            })
            .cloned())
    }

    async fn insert_receivable(&self, receivable: Receivable) -> BillingResult<Option<Receivable>> {
        self.atomically(move |state, faults| {
            if faults.fails_receivable_for(receivable.membership_id) {
                return Err(injected("receivable insert"));
            }
            if state.period_taken(&receivable) {
                return Ok(None);
            }
            state.receivables.insert(receivable.id, receivable.clone());
            Ok(Some(receivable))
        })
        .await
    }

    async fn find_receivable(&self, id: Uuid, tenant_id: Uuid) -> BillingResult<Option<Receivable>> {
        let state = self.state.lock().await;
        Ok(state.receivables.get(&id).filter(|r| r.tenant_id == tenant_id).cloned())
    }

    async fn cancel_receivable(&self, id: Uuid, tenant_id: Uuid) -> BillingResult<Receivable> {
        self.atomically(|state, _| {
            let receivable = state
                .receivables
                .get_mut(&id)
                .filter(|r| r.tenant_id == tenant_id)
                .ok_or_else(|| BillingError::not_found("Receivable"))?;
            receivable.status.ensure_cancellable(InvoiceKind::Receivable)?;
            receivable.status = InvoiceStatus::Cancelled;
            receivable.updated_at = Utc::now();
            Ok(receivable.clone())
        })
        .await
    }

    async fn mark_receivables_overdue(&self, today: NaiveDate, tenant_id: Option<Uuid>) -> BillingResult<u64> {
        self.atomically(|state, _| {
            let mut updated = 0;
            for receivable in state.receivables.values_mut() {
                if receivable.status == InvoiceStatus::Pending
                    && receivable.due_date < today
                    && tenant_id.map_or(true, |t| receivable.tenant_id == t)
                {
                    receivable.status = InvoiceStatus::Overdue;
                    updated += 1;
                }
            }
            Ok(updated)
        })
        .await
    }

    async fn register_receivable_payment(
        &self,
        id: Uuid,
        tenant_id: Uuid,
        intent: &PaymentIntent,
        now: DateTime<Utc>,
    ) -> BillingResult<PaymentReceipt<Receivable>> {
        self.atomically(|state, faults| {
            let receivable = state
                .receivables
                .get(&id)
                .filter(|r| r.tenant_id == tenant_id)
                .ok_or_else(|| BillingError::not_found("Receivable"))?;
            let updated = receivable.apply_payment(intent, now)?;
            state.receivables.insert(id, updated.clone());

            let drawer_id = state
                .open_drawer_id(tenant_id)
                .ok_or_else(|| BillingError::conflict(NO_OPEN_DRAWER))?;
            let movement = state.post(
                drawer_id,
                tenant_id,
                updated.payment_movement(intent),
                BalanceGuard::Unchecked,
                now,
                faults,
            )?;

            Ok(PaymentReceipt {
                invoice: updated,
                movement,
            })
        })
        .await
    }

    async fn insert_payable(&self, payable: Payable) -> BillingResult<Payable> {
        self.atomically(move |state, _| {
            state.payables.insert(payable.id, payable.clone());
            Ok(payable)
        })
        .await
    }

    async fn find_payable(&self, id: Uuid, tenant_id: Uuid) -> BillingResult<Option<Payable>> {
        let state = self.state.lock().await;
        Ok(state.payables.get(&id).filter(|p| p.tenant_id == tenant_id).cloned())
    }

    async fn cancel_payable(&self, id: Uuid, tenant_id: Uuid) -> BillingResult<Payable> {
        self.atomically(|state, _| {
            let payable = state
                .payables
                .get_mut(&id)
                .filter(|p| p.tenant_id == tenant_id)
                .ok_or_else(|| BillingError::not_found("Payable"))?;
            payable.status.ensure_cancellable(InvoiceKind::Payable)?;
            payable.status = InvoiceStatus::Cancelled;
            payable.updated_at = Utc::now();
            Ok(payable.clone())
        })
        .await
    }

    async fn mark_payables_overdue(&self, today: NaiveDate, tenant_id: Option<Uuid>) -> BillingResult<u64> {
        self.atomically(|state, _| {
            let mut updated = 0;
            for payable in state.payables.values_mut() {
                if payable.status == InvoiceStatus::Pending
                    && payable.due_date < today
                    && tenant_id.map_or(true, |t| payable.tenant_id == t)
                {
                    payable.status = InvoiceStatus::Overdue;
                    updated += 1;
                }
            }
            Ok(updated)
        })
        .await
    }

    async fn register_payable_payment(
        &self,
        id: Uuid,
        tenant_id: Uuid,
        intent: &PaymentIntent,
        now: DateTime<Utc>,
    ) -> BillingResult<PaymentReceipt<Payable>> {
        self.atomically(|state, faults| {
            let payable = state
                .payables
                .get(&id)
                .filter(|p| p.tenant_id == tenant_id)
                .ok_or_else(|| BillingError::not_found("Payable"))?;
            let updated = payable.apply_payment(intent, now)?;
            state.payables.insert(id, updated.clone());

            let drawer_id = state
                .open_drawer_id(tenant_id)
                .ok_or_else(|| BillingError::conflict(NO_OPEN_DRAWER))?;
            let movement = state.post(
                drawer_id,
                tenant_id,
                updated.payment_movement(intent),
                BalanceGuard::Unchecked,
                now,
                faults,
            )?;

            Ok(PaymentReceipt {
                invoice: updated,
                movement,
            })
        })
        .await
    }

    async fn open_drawer(
        &self,
        tenant_id: Uuid,
        opening_amount: Decimal,
        opened_by: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> BillingResult<CashDrawer> {
        self.atomically(|state, _| {
            if let Some(open_id) = state.open_drawer_id(tenant_id) {
                let number = state.drawers.get(&open_id).map_or(0, |d| d.number);
                return Err(BillingError::conflict(format!(
                    "Cash drawer #{} is already open for this tenant",
                    number
                )));
            }

            let number = state
                .drawers
                .values()
                .filter(|d| d.tenant_id == tenant_id)
                .map(|d| d.number)
                .max()
                .unwrap_or(0)
                + 1;

            let drawer = CashDrawer::opened(tenant_id, number, opening_amount, opened_by, now);
            state.drawers.insert(drawer.id, drawer.clone());
            Ok(drawer)
        })
        .await
    }

    async fn find_open_drawer(&self, tenant_id: Uuid) -> BillingResult<Option<CashDrawer>> {
        let state = self.state.lock().await;
        Ok(state
            .open_drawer_id(tenant_id)
            .and_then(|id| state.drawers.get(&id))
            .cloned())
    }

    async fn find_drawer(&self, drawer_id: Uuid, tenant_id: Uuid) -> BillingResult<Option<CashDrawer>> {
        let state = self.state.lock().await;
        Ok(state.drawers.get(&drawer_id).filter(|d| d.tenant_id == tenant_id).cloned())
    }

    async fn post_movement(
        &self,
        drawer_id: Uuid,
        tenant_id: Uuid,
        movement: NewMovement,
        guard: BalanceGuard,
        now: DateTime<Utc>,
    ) -> BillingResult<Movement> {
        self.atomically(move |state, faults| state.post(drawer_id, tenant_id, movement, guard, now, faults))
            .await
    }

    async fn remove_movement(&self, drawer_id: Uuid, tenant_id: Uuid, movement_id: Uuid) -> BillingResult<Movement> {
        self.atomically(|state, _| state.drawer_mut(drawer_id, tenant_id)?.unrecord(movement_id))
            .await
    }

    async fn close_drawer(
        &self,
        drawer_id: Uuid,
        tenant_id: Uuid,
        closing_amount: Decimal,
        closed_by: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> BillingResult<(CashDrawer, ClosingSummary)> {
        self.atomically(|state, _| {
            let drawer = state.drawer_mut(drawer_id, tenant_id)?;
            let summary = drawer.close(closing_amount, closed_by, now)?;
            Ok((drawer.clone(), summary))
        })
        .await
    }
}
