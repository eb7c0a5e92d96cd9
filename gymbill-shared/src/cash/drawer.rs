/// Cash drawer operations
///
/// ```text
/// open ──► post / remove / withdraw / supply ──► close
///                                                  │
///                                             (immutable)
/// ```
///
/// A tenant has at most one open drawer. Withdrawals ("sangria") are outflows
/// that may not take the drawer below zero; supplies ("suprimento") add cash
/// to the float.
///
/// # Example
///
/// ```
/// use gymbill_shared::cash::DrawerService;
/// use gymbill_shared::clock::SystemClock;
/// use gymbill_shared::store::memory::MemoryStore;
/// use rust_decimal::Decimal;
/// use std::sync::Arc;
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let drawers = DrawerService::new(Arc::new(MemoryStore::new()), Arc::new(SystemClock::default()));
/// let tenant_id = Uuid::new_v4();
///
/// let drawer = drawers.open(tenant_id, Decimal::from(100), None).await?;
/// drawers.withdraw(tenant_id, drawer.id, Decimal::from(40), None, None).await?;
///
/// let report = drawers.report(tenant_id, drawer.id).await?;
/// assert_eq!(report.expected_balance, Decimal::from(60));
/// # Ok(())
/// # }
/// ```

use crate::clock::Clock;
use crate::error::{BillingError, BillingResult};
use crate::models::cash_drawer::{
    BalanceGuard, CashDrawer, ClosingSummary, DrawerReport, Movement, MovementKind, NewMovement,
    SUPPLY_CATEGORY, WITHDRAWAL_CATEGORY,
};
use crate::models::invoice::PaymentMethod;
use crate::store::BillingStore;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct DrawerService {
    store: Arc<dyn BillingStore>,
    clock: Arc<dyn Clock>,
}

impl DrawerService {
    pub fn new(store: Arc<dyn BillingStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Opens the tenant's drawer
    ///
    /// # Errors
    ///
    /// - Validation if the opening amount is negative
    /// - Conflict if a drawer is already open for the tenant
    pub async fn open(
        &self,
        tenant_id: Uuid,
        opening_amount: Decimal,
        opened_by: Option<Uuid>,
    ) -> BillingResult<CashDrawer> {
        if opening_amount < Decimal::ZERO {
            return Err(BillingError::validation("opening_amount", "cannot be negative"));
        }

        let drawer = self
            .store
            .open_drawer(tenant_id, opening_amount, opened_by, self.clock.now())
            .await?;

        info!(
            tenant_id = %tenant_id,
            drawer_id = %drawer.id,
            number = drawer.number,
            opening_amount = %opening_amount,
            "Cash drawer opened"
        );
        Ok(drawer)
    }

    /// Posts a manual movement
    pub async fn post_movement(
        &self,
        tenant_id: Uuid,
        drawer_id: Uuid,
        movement: NewMovement,
    ) -> BillingResult<Movement> {
        self.post(tenant_id, drawer_id, movement, BalanceGuard::Unchecked).await
    }

    /// Removes a movement, reversing its effect on the totals
    pub async fn remove_movement(
        &self,
        tenant_id: Uuid,
        drawer_id: Uuid,
        movement_id: Uuid,
    ) -> BillingResult<Movement> {
        let removed = self.store.remove_movement(drawer_id, tenant_id, movement_id).await?;
        info!(
            tenant_id = %tenant_id,
            drawer_id = %drawer_id,
            movement_id = %movement_id,
            amount = %removed.amount,
            "Cash movement removed"
        );
        Ok(removed)
    }

    /// Withdraws cash ("sangria")
    ///
    /// # Errors
    ///
    /// Conflict if the amount exceeds the drawer's expected balance
    pub async fn withdraw(
        &self,
        tenant_id: Uuid,
        drawer_id: Uuid,
        amount: Decimal,
        description: Option<String>,
        created_by: Option<Uuid>,
    ) -> BillingResult<Movement> {
        let movement = NewMovement::new(
            MovementKind::Out,
            amount,
            description.unwrap_or_else(|| "Cash withdrawal".to_string()),
            PaymentMethod::Cash,
            WITHDRAWAL_CATEGORY,
        )
        .created_by(created_by);

        self.post(tenant_id, drawer_id, movement, BalanceGuard::NotBelowZero).await
    }

    /// Adds cash to the float ("suprimento")
    pub async fn supply(
        &self,
        tenant_id: Uuid,
        drawer_id: Uuid,
        amount: Decimal,
        description: Option<String>,
        created_by: Option<Uuid>,
    ) -> BillingResult<Movement> {
        let movement = NewMovement::new(
            MovementKind::In,
            amount,
            description.unwrap_or_else(|| "Cash supply".to_string()),
            PaymentMethod::Cash,
            SUPPLY_CATEGORY,
        )
        .created_by(created_by);

        self.post(tenant_id, drawer_id, movement, BalanceGuard::Unchecked).await
    }

    /// Closes the drawer with the counted amount
    pub async fn close(
        &self,
        tenant_id: Uuid,
        drawer_id: Uuid,
        closing_amount: Decimal,
        closed_by: Option<Uuid>,
    ) -> BillingResult<(CashDrawer, ClosingSummary)> {
        let (drawer, summary) = self
            .store
            .close_drawer(drawer_id, tenant_id, closing_amount, closed_by, self.clock.now())
            .await?;

        if summary.difference.is_zero() {
            info!(tenant_id = %tenant_id, drawer_id = %drawer_id, "Cash drawer closed balanced");
        } else {
            warn!(
                tenant_id = %tenant_id,
                drawer_id = %drawer_id,
                expected = %summary.expected_balance,
                counted = %summary.closing_amount,
                note = %summary.note,
                "Cash drawer closed with a difference"
            );
        }

        Ok((drawer, summary))
    }

    /// The tenant's open drawer with its movements
    pub async fn open_drawer(&self, tenant_id: Uuid) -> BillingResult<CashDrawer> {
        self.store
            .find_open_drawer(tenant_id)
            .await?
            .ok_or_else(|| BillingError::not_found("Open cash drawer"))
    }

    /// Read-only summary of a drawer
    pub async fn report(&self, tenant_id: Uuid, drawer_id: Uuid) -> BillingResult<DrawerReport> {
        let drawer = self
            .store
            .find_drawer(drawer_id, tenant_id)
            .await?
            .ok_or_else(|| BillingError::not_found("Cash drawer"))?;
        Ok(drawer.report())
    }

    async fn post(
        &self,
        tenant_id: Uuid,
        drawer_id: Uuid,
        movement: NewMovement,
        guard: BalanceGuard,
    ) -> BillingResult<Movement> {
        let posted = self
            .store
            .post_movement(drawer_id, tenant_id, movement, guard, self.clock.now())
            .await?;

        info!(
            tenant_id = %tenant_id,
            drawer_id = %drawer_id,
            movement_id = %posted.id,
            kind = ?posted.kind,
            amount = %posted.amount,
            category = %posted.category,
            "Cash movement posted"
        );
        Ok(posted)
    }
}
