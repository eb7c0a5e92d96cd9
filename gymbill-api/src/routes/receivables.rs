/// Receivable endpoints
///
/// # Endpoints
///
/// - `GET /v1/receivables/:id` - Fetch a receivable
/// - `POST /v1/receivables/:id/payments` - Register a member payment
/// - `POST /v1/receivables/:id/cancel` - Cancel an unpaid receivable

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use gymbill_shared::auth::context::TenantContext;
use gymbill_shared::models::invoice::{PaymentIntent, PaymentMethod};
use gymbill_shared::models::receivable::Receivable;
use gymbill_shared::store::PaymentReceipt;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

/// Payment request body, shared with the payable endpoint
///
/// ```json
/// { "amount": "150.00", "payment_method": "pix" }
/// ```
///
/// `late_fee` and `interest` are accepted for payables only.
#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub late_fee: Option<Decimal>,
    #[serde(default)]
    pub interest: Option<Decimal>,
}

impl PaymentRequest {
    /// Builds the intent, attributing it to the caller
    pub fn into_intent(self, ctx: &TenantContext) -> PaymentIntent {
        PaymentIntent {
            amount: self.amount,
            payment_method: self.payment_method,
            paid_at: self.paid_at,
            late_fee: self.late_fee,
            interest: self.interest,
            registered_by: Some(ctx.user_id),
        }
    }
}

pub async fn get_receivable(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Receivable>> {
    let receivable = state.receivables().get(ctx.tenant_id, id).await?;
    Ok(Json(receivable))
}

/// Registers a payment and posts it to the open drawer
///
/// # Errors
///
/// - `400 Bad Request`: invoice paid or cancelled, overpayment, no open drawer
/// - `404 Not Found`: receivable not found for the tenant
/// - `422 Unprocessable Entity`: amount not positive, late fee or interest given
pub async fn register_payment(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<PaymentRequest>,
) -> ApiResult<Json<PaymentReceipt<Receivable>>> {
    let receipt = state
        .payments()
        .register_receivable_payment(ctx.tenant_id, id, req.into_intent(&ctx))
        .await?;
    Ok(Json(receipt))
}

pub async fn cancel_receivable(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Receivable>> {
    let receivable = state.receivables().cancel(ctx.tenant_id, id).await?;
    Ok(Json(receivable))
}
