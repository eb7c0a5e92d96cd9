/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use gymbill_api::{app::AppState, config::Config};
/// use gymbill_shared::clock::SystemClock;
/// use gymbill_shared::store::postgres::PgStore;
/// use sqlx::PgPool;
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let clock = Arc::new(SystemClock::new(config.billing.timezone));
/// let state = AppState::new(Arc::new(PgStore::new(pool)), clock, config);
/// let app = gymbill_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{delete, get, post},
    Router,
};
use gymbill_shared::auth::{context::TenantContext, jwt};
use gymbill_shared::billing::{EnrollmentService, OverdueSweeper, ReceivableService, RecurringInvoiceGenerator};
use gymbill_shared::cash::{DrawerService, PayableService, PaymentRegistrar};
use gymbill_shared::clock::Clock;
use gymbill_shared::store::BillingStore;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Billing store
    pub store: Arc<dyn BillingStore>,

    /// Source of "now" and of the business date
    pub clock: Arc<dyn Clock>,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Creates new application state
    pub fn new(store: Arc<dyn BillingStore>, clock: Arc<dyn Clock>, config: Config) -> Self {
        Self {
            store,
            clock,
            config: Arc::new(config),
        }
    }

    /// Gets JWT secret for token validation
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }

    pub fn drawers(&self) -> DrawerService {
        DrawerService::new(self.store.clone(), self.clock.clone())
    }

    pub fn payments(&self) -> PaymentRegistrar {
        PaymentRegistrar::new(self.store.clone(), self.clock.clone())
    }

    pub fn payables(&self) -> PayableService {
        PayableService::new(self.store.clone(), self.clock.clone())
    }

    pub fn receivables(&self) -> ReceivableService {
        ReceivableService::new(self.store.clone())
    }

    pub fn enrollment(&self) -> EnrollmentService {
        EnrollmentService::new(self.store.clone(), self.clock.clone())
    }

    pub fn generator(&self) -> RecurringInvoiceGenerator {
        RecurringInvoiceGenerator::new(self.store.clone(), self.clock.clone())
    }

    pub fn sweeper(&self) -> OverdueSweeper {
        OverdueSweeper::new(self.store.clone())
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                               # Health check (public)
/// └── /v1/                                  # API v1 (bearer token required)
///     ├── /billing/
///     │   ├── POST /recurring-invoices/run  # Manual billing run (admin)
///     │   └── POST /overdue-sweep
///     ├── POST /memberships                 # Enrollment + first invoice
///     ├── /receivables/:id
///     │   ├── GET
///     │   ├── POST /payments
///     │   └── POST /cancel
///     ├── /payables/
///     │   ├── POST /
///     │   └── /:id  GET, POST /payments, POST /cancel
///     └── /drawers/
///         ├── POST /                        # Open
///         ├── GET  /open
///         └── /:id
///             ├── POST   /movements
///             ├── DELETE /movements/:movement_id
///             ├── POST   /withdrawals
///             ├── POST   /supplies
///             ├── POST   /close
///             └── GET    /report
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Logging (tower-http TraceLayer)
/// 2. CORS (tower-http CorsLayer)
/// 3. Authentication (on `/v1`)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    // Health check (public, no auth)
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let billing_routes = Router::new()
        .route("/recurring-invoices/run", post(routes::billing::run_recurring_invoices))
        .route("/overdue-sweep", post(routes::billing::sweep_overdue));

    let receivable_routes = Router::new()
        .route("/:id", get(routes::receivables::get_receivable))
        .route("/:id/payments", post(routes::receivables::register_payment))
        .route("/:id/cancel", post(routes::receivables::cancel_receivable));

    let payable_routes = Router::new()
        .route("/", post(routes::payables::create_payable))
        .route("/:id", get(routes::payables::get_payable))
        .route("/:id/payments", post(routes::payables::register_payment))
        .route("/:id/cancel", post(routes::payables::cancel_payable));

    let drawer_routes = Router::new()
        .route("/", post(routes::drawers::open_drawer))
        .route("/open", get(routes::drawers::get_open_drawer))
        .route("/:id/movements", post(routes::drawers::post_movement))
        .route("/:id/movements/:movement_id", delete(routes::drawers::remove_movement))
        .route("/:id/withdrawals", post(routes::drawers::withdraw))
        .route("/:id/supplies", post(routes::drawers::supply))
        .route("/:id/close", post(routes::drawers::close_drawer))
        .route("/:id/report", get(routes::drawers::drawer_report));

    // Build complete v1 API (require JWT authentication)
    let v1_routes = Router::new()
        .nest("/billing", billing_routes)
        .route("/memberships", post(routes::memberships::enroll))
        .nest("/receivables", receivable_routes)
        .nest("/payables", payable_routes)
        .nest("/drawers", drawer_routes)
        .layer(axum::middleware::from_fn_with_state(state.clone(), jwt_auth_layer));

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|origin| origin == "*") {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}

/// JWT authentication middleware layer
///
/// Extracts and validates the bearer token from the Authorization header,
/// then injects the [`TenantContext`] into request extensions.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::BadRequest("Expected Bearer token".to_string()))?;

    let claims = jwt::validate_token(token, state.jwt_secret())?;

    req.extensions_mut().insert(TenantContext::from(claims));

    Ok(next.run(req).await)
}
