/// Cash drawer endpoints
///
/// # Endpoints
///
/// - `POST /v1/drawers` - Open the tenant's drawer
/// - `GET /v1/drawers/open` - Current open drawer with its movements
/// - `POST /v1/drawers/:id/movements` - Post a manual movement
/// - `DELETE /v1/drawers/:id/movements/:movement_id` - Remove a movement
/// - `POST /v1/drawers/:id/withdrawals` - Withdraw cash (sangria)
/// - `POST /v1/drawers/:id/supplies` - Add cash to the float (suprimento)
/// - `POST /v1/drawers/:id/close` - Close with the counted amount
/// - `GET /v1/drawers/:id/report` - Totals and breakdowns
///
/// Every mutation except opening requires the drawer to be open.

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use gymbill_shared::auth::context::TenantContext;
use gymbill_shared::models::cash_drawer::{
    CashDrawer, ClosingSummary, DrawerReport, Movement, MovementKind, NewMovement,
};
use gymbill_shared::models::invoice::PaymentMethod;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct OpenDrawerRequest {
    pub opening_amount: Decimal,
}

/// Manual movement request
#[derive(Debug, Deserialize, Validate)]
pub struct MovementRequest {
    pub kind: MovementKind,
    pub amount: Decimal,

    #[validate(length(min = 1, max = 255, message = "Description must be 1-255 characters"))]
    pub description: String,

    pub payment_method: PaymentMethod,

    #[validate(length(min = 1, max = 100, message = "Category must be 1-100 characters"))]
    pub category: String,
}

/// Withdrawal or supply request
#[derive(Debug, Deserialize, Validate)]
pub struct CashOperationRequest {
    pub amount: Decimal,

    #[validate(length(min = 1, max = 255, message = "Description must be 1-255 characters"))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CloseDrawerRequest {
    /// Cash counted in the drawer
    pub closing_amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct CloseDrawerResponse {
    pub drawer: CashDrawer,
    pub summary: ClosingSummary,
}

/// Opens the tenant's drawer
///
/// # Errors
///
/// - `400 Bad Request`: a drawer is already open
/// - `422 Unprocessable Entity`: negative opening amount
pub async fn open_drawer(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Json(req): Json<OpenDrawerRequest>,
) -> ApiResult<(StatusCode, Json<CashDrawer>)> {
    let drawer = state
        .drawers()
        .open(ctx.tenant_id, req.opening_amount, Some(ctx.user_id))
        .await?;
    Ok((StatusCode::CREATED, Json(drawer)))
}

pub async fn get_open_drawer(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
) -> ApiResult<Json<CashDrawer>> {
    let drawer = state.drawers().open_drawer(ctx.tenant_id).await?;
    Ok(Json(drawer))
}

pub async fn post_movement(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(drawer_id): Path<Uuid>,
    Json(req): Json<MovementRequest>,
) -> ApiResult<(StatusCode, Json<Movement>)> {
    req.validate()?;

    let movement = NewMovement::new(req.kind, req.amount, req.description, req.payment_method, req.category)
        .created_by(Some(ctx.user_id));
    let movement = state
        .drawers()
        .post_movement(ctx.tenant_id, drawer_id, movement)
        .await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

/// Removes a movement and reverses its effect on the drawer totals
pub async fn remove_movement(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path((drawer_id, movement_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Movement>> {
    let removed = state
        .drawers()
        .remove_movement(ctx.tenant_id, drawer_id, movement_id)
        .await?;
    Ok(Json(removed))
}

/// Withdraws cash; rejected if it would take the balance below zero
pub async fn withdraw(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(drawer_id): Path<Uuid>,
    Json(req): Json<CashOperationRequest>,
) -> ApiResult<(StatusCode, Json<Movement>)> {
    req.validate()?;

    let movement = state
        .drawers()
        .withdraw(ctx.tenant_id, drawer_id, req.amount, req.description, Some(ctx.user_id))
        .await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

pub async fn supply(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(drawer_id): Path<Uuid>,
    Json(req): Json<CashOperationRequest>,
) -> ApiResult<(StatusCode, Json<Movement>)> {
    req.validate()?;

    let movement = state
        .drawers()
        .supply(ctx.tenant_id, drawer_id, req.amount, req.description, Some(ctx.user_id))
        .await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

pub async fn close_drawer(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(drawer_id): Path<Uuid>,
    Json(req): Json<CloseDrawerRequest>,
) -> ApiResult<Json<CloseDrawerResponse>> {
    let (drawer, summary) = state
        .drawers()
        .close(ctx.tenant_id, drawer_id, req.closing_amount, Some(ctx.user_id))
        .await?;
    Ok(Json(CloseDrawerResponse { drawer, summary }))
}

pub async fn drawer_report(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(drawer_id): Path<Uuid>,
) -> ApiResult<Json<DrawerReport>> {
    let report = state.drawers().report(ctx.tenant_id, drawer_id).await?;
    Ok(Json(report))
}
