/// Tenant-scoped reads and cancellation of receivables

use crate::error::{BillingError, BillingResult};
use crate::models::receivable::Receivable;
use crate::store::BillingStore;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct ReceivableService {
    store: Arc<dyn BillingStore>,
}

impl ReceivableService {
    pub fn new(store: Arc<dyn BillingStore>) -> Self {
        Self { store }
    }

    /// Fetches a receivable, NotFound if it does not belong to the tenant
    pub async fn get(&self, tenant_id: Uuid, id: Uuid) -> BillingResult<Receivable> {
        self.store
            .find_receivable(id, tenant_id)
            .await?
            .ok_or_else(|| BillingError::not_found("Receivable"))
    }

    /// Cancels an unpaid receivable
    ///
    /// A cancelled receivable frees its billing period: the next generator
    /// run may issue a new invoice for it.
    pub async fn cancel(&self, tenant_id: Uuid, id: Uuid) -> BillingResult<Receivable> {
        let receivable = self.store.cancel_receivable(id, tenant_id).await?;
        info!(tenant_id = %tenant_id, receivable_id = %id, "Receivable cancelled");
        Ok(receivable)
    }
}
