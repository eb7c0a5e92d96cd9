/// Payment registration
///
/// Paying an invoice and recording the cash movement are one unit of work:
/// the store updates the invoice and posts the movement to the tenant's open
/// drawer in the same transaction. Receivable payments post inflows, payable
/// payments post outflows, both categorized by the invoice's category.

use crate::clock::Clock;
use crate::error::BillingResult;
use crate::models::invoice::PaymentIntent;
use crate::models::payable::Payable;
use crate::models::receivable::Receivable;
use crate::store::{BillingStore, PaymentReceipt};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct PaymentRegistrar {
    store: Arc<dyn BillingStore>,
    clock: Arc<dyn Clock>,
}

impl PaymentRegistrar {
    pub fn new(store: Arc<dyn BillingStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Registers a payment received from a member
    ///
    /// # Errors
    ///
    /// - NotFound if the receivable does not belong to the tenant
    /// - Conflict if it is paid or cancelled, the payment exceeds the
    ///   remaining amount, or no drawer is open
    /// - Validation if the amount is not positive
    pub async fn register_receivable_payment(
        &self,
        tenant_id: Uuid,
        receivable_id: Uuid,
        intent: PaymentIntent,
    ) -> BillingResult<PaymentReceipt<Receivable>> {
        let result = self
            .store
            .register_receivable_payment(receivable_id, tenant_id, &intent, self.clock.now())
            .await;

        match &result {
            Ok(receipt) => info!(
                tenant_id = %tenant_id,
                receivable_id = %receivable_id,
                amount = %intent.amount,
                method = %intent.payment_method,
                status = receipt.invoice.status.as_str(),
                movement_id = %receipt.movement.id,
                "Receivable payment registered"
            ),
            Err(e) => warn!(
                tenant_id = %tenant_id,
                receivable_id = %receivable_id,
                error = %e,
                "Receivable payment rejected"
            ),
        }

        result
    }

    /// Registers a payment made to a supplier
    ///
    /// Late fee and interest on the intent are added to the payable's final
    /// amount before the overpayment check.
    pub async fn register_payable_payment(
        &self,
        tenant_id: Uuid,
        payable_id: Uuid,
        intent: PaymentIntent,
    ) -> BillingResult<PaymentReceipt<Payable>> {
        let result = self
            .store
            .register_payable_payment(payable_id, tenant_id, &intent, self.clock.now())
            .await;

        match &result {
            Ok(receipt) => info!(
                tenant_id = %tenant_id,
                payable_id = %payable_id,
                amount = %intent.amount,
                method = %intent.payment_method,
                status = receipt.invoice.status.as_str(),
                movement_id = %receipt.movement.id,
                "Payable payment registered"
            ),
            Err(e) => warn!(
                tenant_id = %tenant_id,
                payable_id = %payable_id,
                error = %e,
                "Payable payment rejected"
            ),
        }

        result
    }
}
