/// Payable endpoints
///
/// # Endpoints
///
/// - `POST /v1/payables` - Create a supplier bill
/// - `GET /v1/payables/:id` - Fetch a payable
/// - `POST /v1/payables/:id/payments` - Pay a supplier from the open drawer
/// - `POST /v1/payables/:id/cancel` - Cancel an unpaid payable

use super::receivables::PaymentRequest;
use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDate;
use gymbill_shared::auth::context::TenantContext;
use gymbill_shared::models::payable::{NewPayable, Payable};
use gymbill_shared::store::PaymentReceipt;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Create payable request
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePayableRequest {
    #[validate(length(min = 1, max = 255, message = "Description must be 1-255 characters"))]
    pub description: String,

    #[validate(length(max = 255, message = "Supplier must be at most 255 characters"))]
    pub supplier: Option<String>,

    /// Expense category (e.g. "rent", "utilities")
    #[validate(length(min = 1, max = 100, message = "Category must be 1-100 characters"))]
    pub category: String,

    pub due_date: NaiveDate,
    pub amount: Decimal,
    pub discount: Option<Decimal>,

    #[validate(length(max = 1000, message = "Notes must be at most 1000 characters"))]
    pub notes: Option<String>,
}

pub async fn create_payable(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Json(req): Json<CreatePayableRequest>,
) -> ApiResult<(StatusCode, Json<Payable>)> {
    req.validate()?;

    let payable = state
        .payables()
        .create(NewPayable {
            tenant_id: ctx.tenant_id,
            description: req.description,
            supplier: req.supplier,
            category: req.category,
            due_date: req.due_date,
            amount: req.amount,
            discount: req.discount,
            notes: req.notes,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(payable)))
}

pub async fn get_payable(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Payable>> {
    let payable = state.payables().get(ctx.tenant_id, id).await?;
    Ok(Json(payable))
}

/// Registers a supplier payment and posts the outflow to the open drawer
///
/// Late fee and interest are added to the payable's final amount first.
pub async fn register_payment(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<PaymentRequest>,
) -> ApiResult<Json<PaymentReceipt<Payable>>> {
    let receipt = state
        .payments()
        .register_payable_payment(ctx.tenant_id, id, req.into_intent(&ctx))
        .await?;
    Ok(Json(receipt))
}

pub async fn cancel_payable(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Payable>> {
    let payable = state.payables().cancel(ctx.tenant_id, id).await?;
    Ok(Json(payable))
}
