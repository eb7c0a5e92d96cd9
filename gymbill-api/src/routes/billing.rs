/// Billing run endpoints
///
/// # Endpoints
///
/// - `POST /v1/billing/recurring-invoices/run` - Generate today's recurring
///   invoices for the caller's tenant. Admins only, and only when
///   `BILLING_MANUAL_TRIGGER_ENABLED` is set.
/// - `POST /v1/billing/overdue-sweep` - Mark the tenant's past-due invoices
///   as overdue.
///
/// Both are idempotent: running them again on the same day changes nothing.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, Extension, Json};
use gymbill_shared::auth::context::TenantContext;
use gymbill_shared::billing::{OverdueSweep, RunSummary};
use tracing::info;

/// Runs recurring-invoice generation for the caller's tenant
///
/// # Response
///
/// ```json
/// {
///   "run_date": "2024-02-01",
///   "tenant_id": "uuid",
///   "total_processed": 12,
///   "generated": 3,
///   "already_existed": 9,
///   "skipped": 0,
///   "errored": 0,
///   "end_date_rollovers": 3,
///   "details": [ ... ]
/// }
/// ```
///
/// # Concurrency
///
/// This runs in the API process, outside the worker scheduler's run lock, so
/// it may overlap the daily run or another manual run. Each membership's
/// period is claimed by the `receivables_membership_period` unique index: the
/// run that loses the insert reports the membership as `already_existed` and
/// leaves its end date alone, so the invoice and the rollover happen once.
///
/// # Errors
///
/// - `403 Forbidden`: caller is not an admin, or manual runs are disabled
pub async fn run_recurring_invoices(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
) -> ApiResult<Json<RunSummary>> {
    if !state.config.billing.manual_trigger_enabled {
        return Err(ApiError::Forbidden("Manual billing runs are disabled".to_string()));
    }
    if !ctx.is_admin() {
        return Err(ApiError::Forbidden("Only admins can run billing".to_string()));
    }

    info!(tenant_id = %ctx.tenant_id, user_id = %ctx.user_id, "Manual billing run requested");
    let summary = state
        .generator()
        .run(state.clock.today(), Some(ctx.tenant_id))
        .await?;

    Ok(Json(summary))
}

/// Marks the caller's past-due invoices as overdue
pub async fn sweep_overdue(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
) -> ApiResult<Json<OverdueSweep>> {
    let sweep = state
        .sweeper()
        .sweep(state.clock.today(), Some(ctx.tenant_id))
        .await?;

    Ok(Json(sweep))
}
