/// Overdue sweep
///
/// Moves every pending receivable and payable whose due date has passed to
/// `overdue`. Running it twice on the same day changes nothing the second
/// time.

use crate::error::BillingResult;
use crate::store::BillingStore;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Counts of invoices moved to overdue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OverdueSweep {
    pub receivables_updated: u64,
    pub payables_updated: u64,
    pub updated_count: u64,
}

#[derive(Clone)]
pub struct OverdueSweeper {
    store: Arc<dyn BillingStore>,
}

impl OverdueSweeper {
    pub fn new(store: Arc<dyn BillingStore>) -> Self {
        Self { store }
    }

    /// Marks invoices due before `today` as overdue
    pub async fn sweep(&self, today: NaiveDate, tenant_id: Option<Uuid>) -> BillingResult<OverdueSweep> {
        let receivables_updated = self.store.mark_receivables_overdue(today, tenant_id).await?;
        let payables_updated = self.store.mark_payables_overdue(today, tenant_id).await?;

        info!(
            run_date = %today,
            tenant_id = ?tenant_id,
            receivables_updated,
            payables_updated,
            "Overdue sweep finished"
        );

        Ok(OverdueSweep {
            receivables_updated,
            payables_updated,
            updated_count: receivables_updated + payables_updated,
        })
    }
}
