//! Shared fixtures for the service tests
//!
//! Everything runs against `MemoryStore` and a `FixedClock`, so these tests
//! need no database.

#![allow(dead_code)]

use chrono::{NaiveDate, Utc};
use gymbill_shared::clock::FixedClock;
use gymbill_shared::models::membership::{Membership, MembershipStatus};
use gymbill_shared::models::plan::{BillingKind, Discount, DiscountKind, PeriodUnit, Plan};
use gymbill_shared::store::memory::MemoryStore;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap()
}

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
    pub tenant_id: Uuid,
}

impl Fixture {
    pub fn on(today: NaiveDate) -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            clock: Arc::new(FixedClock::on(today)),
            tenant_id: Uuid::new_v4(),
        }
    }

    pub async fn monthly_plan(&self, price: &str) -> Plan {
        self.plan(PeriodUnit::Monthly, 1, price).await
    }

    pub async fn plan(&self, period_unit: PeriodUnit, period_count: i32, price: &str) -> Plan {
        let plan = Plan {
            id: Uuid::new_v4(),
            tenant_id: self.tenant_id,
            name: "Gold".to_string(),
            billing_kind: BillingKind::Recurring,
            period_unit,
            period_count,
            price: dec(price),
            duration_months: None,
            duration_days: None,
            created_at: Utc::now(),
        };
        self.store.insert_plan(plan.clone()).await;
        plan
    }

    pub async fn save_plan(&self, plan: Plan) -> Plan {
        self.store.insert_plan(plan.clone()).await;
        plan
    }

    pub async fn percentage_discount(&self, value: &str) -> Discount {
        let discount = Discount {
            id: Uuid::new_v4(),
            tenant_id: self.tenant_id,
            name: "Student".to_string(),
            kind: DiscountKind::Percentage,
            value: dec(value),
        };
        self.store.insert_discount(discount.clone()).await;
        discount
    }

    pub async fn fixed_discount(&self, value: &str) -> Discount {
        let discount = Discount {
            id: Uuid::new_v4(),
            tenant_id: self.tenant_id,
            name: "Staff".to_string(),
            kind: DiscountKind::Fixed,
            value: dec(value),
        };
        self.store.insert_discount(discount.clone()).await;
        discount
    }

    pub async fn membership(&self, plan: &Plan, start: NaiveDate, billing_day: i16) -> Membership {
        let membership = Membership {
            id: Uuid::new_v4(),
            tenant_id: self.tenant_id,
            member_id: Uuid::new_v4(),
            plan_id: plan.id,
            discount_id: None,
            start_date: start,
            end_date: start,
            billing_day,
            status: MembershipStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.store.insert_membership(membership.clone()).await;
        membership
    }

    pub async fn save_membership(&self, membership: Membership) -> Membership {
        self.store.insert_membership(membership.clone()).await;
        membership
    }
}
