/// Payable creation, reads and cancellation

use crate::clock::Clock;
use crate::error::{BillingError, BillingResult};
use crate::models::payable::{NewPayable, Payable};
use crate::store::BillingStore;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct PayableService {
    store: Arc<dyn BillingStore>,
    clock: Arc<dyn Clock>,
}

impl PayableService {
    pub fn new(store: Arc<dyn BillingStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Creates a pending payable
    ///
    /// # Errors
    ///
    /// Validation if the amount is not positive or the description or
    /// category are blank
    pub async fn create(&self, input: NewPayable) -> BillingResult<Payable> {
        let payable = input.into_payable(self.clock.now())?;
        let payable = self.store.insert_payable(payable).await?;

        info!(
            tenant_id = %payable.tenant_id,
            payable_id = %payable.id,
            amount = %payable.final_amount,
            due_date = %payable.due_date,
            "Payable created"
        );
        Ok(payable)
    }

    /// Fetches a payable, NotFound if it does not belong to the tenant
    pub async fn get(&self, tenant_id: Uuid, id: Uuid) -> BillingResult<Payable> {
        self.store
            .find_payable(id, tenant_id)
            .await?
            .ok_or_else(|| BillingError::not_found("Payable"))
    }

    /// Cancels an unpaid payable
    pub async fn cancel(&self, tenant_id: Uuid, id: Uuid) -> BillingResult<Payable> {
        let payable = self.store.cancel_payable(id, tenant_id).await?;
        info!(tenant_id = %tenant_id, payable_id = %id, "Payable cancelled");
        Ok(payable)
    }
}
