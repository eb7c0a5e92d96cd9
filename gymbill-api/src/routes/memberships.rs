/// Membership enrollment endpoint
///
/// # Endpoint
///
/// ```text
/// POST /v1/memberships
/// Authorization: Bearer <jwt_token>
/// Content-Type: application/json
///
/// {
///   "member_id": "uuid",
///   "plan_id": "uuid",
///   "discount_id": null,
///   "start_date": "2024-01-10",
///   "billing_day": 5
/// }
/// ```
///
/// Responds `201 Created` with the membership and its first invoice. Both
/// are created or neither is.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::NaiveDate;
use gymbill_shared::auth::context::TenantContext;
use gymbill_shared::billing::{Enrollment, EnrollmentRequest};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Enrollment request body
#[derive(Debug, Deserialize, Validate)]
pub struct EnrollRequest {
    pub member_id: Uuid,
    pub plan_id: Uuid,
    pub discount_id: Option<Uuid>,
    pub start_date: NaiveDate,

    /// Day of month invoices fall due; defaults to a week after the start date
    #[validate(range(min = 1, max = 31, message = "Billing day must be between 1 and 31"))]
    pub billing_day: Option<u32>,
}

pub async fn enroll(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Json(req): Json<EnrollRequest>,
) -> ApiResult<(StatusCode, Json<Enrollment>)> {
    req.validate()?;

    let enrollment = state
        .enrollment()
        .enroll(EnrollmentRequest {
            tenant_id: ctx.tenant_id,
            member_id: req.member_id,
            plan_id: req.plan_id,
            discount_id: req.discount_id,
            start_date: req.start_date,
            billing_day: req.billing_day,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(enrollment)))
}
