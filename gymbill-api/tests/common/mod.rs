//! Common test utilities for the HTTP tests
//!
//! The router runs against `MemoryStore` and a `FixedClock`, so these tests
//! need no database. Requests go through `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use gymbill_api::app::{build_router, AppState};
use gymbill_api::config::{ApiConfig, BillingConfig, Config, DatabaseConfig, JwtConfig};
use gymbill_shared::auth::context::Role;
use gymbill_shared::auth::jwt::{create_token, Claims};
use gymbill_shared::clock::FixedClock;
use gymbill_shared::models::plan::{BillingKind, PeriodUnit, Plan};
use gymbill_shared::store::memory::MemoryStore;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "test-secret-key-at-least-32-bytes-long";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Reads a money field, whether serialized as a string or a number
pub fn money(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).unwrap(),
        other => Decimal::from_str(&other.to_string()).unwrap(),
    }
}

pub fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap()
}

/// Test context containing all necessary resources
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub manual_trigger_enabled: bool,
}

impl TestContext {
    /// Creates a context for a fresh tenant on the given business date
    pub fn on(today: NaiveDate) -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            clock: Arc::new(FixedClock::on(today)),
            tenant_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            manual_trigger_enabled: true,
        }
    }

    pub fn without_manual_trigger(mut self) -> Self {
        self.manual_trigger_enabled = false;
        self
    }

    pub fn config(&self) -> Config {
        Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_origins: vec!["*".to_string()],
            },
            database: DatabaseConfig {
                url: "postgresql://unused".to_string(),
                max_connections: 1,
            },
            jwt: JwtConfig {
                secret: JWT_SECRET.to_string(),
            },
            billing: BillingConfig {
                timezone: Tz::UTC,
                manual_trigger_enabled: self.manual_trigger_enabled,
            },
        }
    }

    pub fn app(&self) -> Router {
        build_router(AppState::new(self.store.clone(), self.clock.clone(), self.config()))
    }

    /// Bearer token for this tenant's user
    pub fn token(&self, role: Role) -> String {
        self.token_for(self.tenant_id, role)
    }

    pub fn token_for(&self, tenant_id: Uuid, role: Role) -> String {
        let claims = Claims::new(self.user_id, tenant_id, role);
        create_token(&claims, JWT_SECRET).unwrap()
    }

    /// Sends a request as staff of this tenant
    pub async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let token = self.token(Role::Staff);
        self.send_with(method, uri, Some(&token), body).await
    }

    /// Sends a request with an explicit (or no) bearer token
    pub async fn send_with(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        (status, json)
    }

    /// Stores a monthly recurring plan for this tenant
    pub async fn monthly_plan(&self, price: &str) -> Plan {
        let plan = Plan {
            id: Uuid::new_v4(),
            tenant_id: self.tenant_id,
            name: "Gold".to_string(),
            billing_kind: BillingKind::Recurring,
            period_unit: PeriodUnit::Monthly,
            period_count: 1,
            price: dec(price),
            duration_months: None,
            duration_days: None,
            created_at: Utc::now(),
        };
        self.store.insert_plan(plan.clone()).await;
        plan
    }

    /// Opens a drawer over HTTP and returns its id
    pub async fn open_drawer(&self, opening_amount: &str) -> String {
        let (status, body) = self
            .send("POST", "/v1/drawers", Some(serde_json::json!({ "opening_amount": opening_amount })))
            .await;
        assert_eq!(status, StatusCode::CREATED, "open drawer failed: {}", body);
        body["id"].as_str().unwrap().to_string()
    }

    /// Enrolls a member over HTTP and returns the first invoice id
    pub async fn enroll(&self, plan: &Plan, start_date: &str, billing_day: u32) -> String {
        let (status, body) = self
            .send(
                "POST",
                "/v1/memberships",
                Some(serde_json::json!({
                    "member_id": Uuid::new_v4(),
                    "plan_id": plan.id,
                    "start_date": start_date,
                    "billing_day": billing_day,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "enroll failed: {}", body);
        body["first_invoice"]["id"].as_str().unwrap().to_string()
    }
}
