/// Membership model and database operations
///
/// A membership is a member's enrollment in a plan. Besides the plan
/// reference it carries the billing cursor: `end_date` marks the date the
/// membership is paid through and moves forward one billing cycle every time
/// a recurring invoice is generated for it.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE membership_status AS ENUM ('active', 'inactive');
///
/// CREATE TABLE memberships (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     tenant_id UUID NOT NULL,
///     member_id UUID NOT NULL,
///     plan_id UUID NOT NULL REFERENCES plans(id),
///     discount_id UUID REFERENCES discounts(id),
///     start_date DATE NOT NULL,
///     end_date DATE NOT NULL,
///     billing_day SMALLINT NOT NULL CHECK (billing_day BETWEEN 1 AND 31),
///     status membership_status NOT NULL DEFAULT 'active',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use gymbill_shared::models::membership::Membership;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let active = Membership::list_active_recurring(&pool, None).await?;
/// println!("{} memberships to bill", active.len());
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgExecutor;
use uuid::Uuid;

/// Membership lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "membership_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    /// Billed by the daily job
    Active,

    /// Ignored by the daily job
    Inactive,
}

/// Membership model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Membership {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub member_id: Uuid,
    pub plan_id: Uuid,
    pub discount_id: Option<Uuid>,
    pub start_date: NaiveDate,

    /// Paid-through cursor
    pub end_date: NaiveDate,

    /// Day of month invoices fall due (1-31, clamped to short months)
    pub billing_day: i16,

    pub status: MembershipStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a membership
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMembership {
    pub tenant_id: Uuid,
    pub member_id: Uuid,
    pub plan_id: Uuid,
    pub discount_id: Option<Uuid>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub billing_day: i16,
}

impl CreateMembership {
    /// Materializes an active membership
    pub fn into_membership(self, now: DateTime<Utc>) -> Membership {
        Membership {
            id: Uuid::new_v4(),
            tenant_id: self.tenant_id,
            member_id: self.member_id,
            plan_id: self.plan_id,
            discount_id: self.discount_id,
            start_date: self.start_date,
            end_date: self.end_date,
            billing_day: self.billing_day,
            status: MembershipStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Membership {
    /// Billing day as an unsigned day-of-month
    pub fn billing_day(&self) -> u32 {
        u32::try_from(self.billing_day).unwrap_or(0)
    }

    /// Inserts a membership built with [`CreateMembership::into_membership`]
    ///
    /// # Errors
    ///
    /// Returns an error if the plan or discount doesn't exist (foreign key
    /// violation), the billing day is out of range, or the database fails
    pub async fn insert<'e, E>(executor: E, membership: &Membership) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO memberships (id, tenant_id, member_id, plan_id, discount_id, start_date,
                                     end_date, billing_day, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING id, tenant_id, member_id, plan_id, discount_id, start_date, end_date,
                      billing_day, status, created_at, updated_at
            "#,
        )
        .bind(membership.id)
        .bind(membership.tenant_id)
        .bind(membership.member_id)
        .bind(membership.plan_id)
        .bind(membership.discount_id)
        .bind(membership.start_date)
        .bind(membership.end_date)
        .bind(membership.billing_day)
        .bind(membership.status)
        .bind(membership.created_at)
        .fetch_one(executor)
        .await
    }

    /// Lists active memberships whose plan is recurring
    ///
    /// `tenant_id = None` lists across every tenant (the daily job);
    /// `Some(id)` restricts to one tenant (manual trigger).
    pub async fn list_active_recurring<'e, E>(
        executor: E,
        tenant_id: Option<Uuid>,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Membership>(
            r#"
            SELECT m.id, m.tenant_id, m.member_id, m.plan_id, m.discount_id, m.start_date,
                   m.end_date, m.billing_day, m.status, m.created_at, m.updated_at
            FROM memberships m
            JOIN plans p ON p.id = m.plan_id
            WHERE m.status = 'active'
              AND p.billing_kind = 'recurring'
              AND ($1::uuid IS NULL OR m.tenant_id = $1)
            ORDER BY m.tenant_id, m.created_at ASC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(executor)
        .await
    }

    /// Moves the paid-through cursor
    ///
    /// Returns false if the membership no longer exists.
    pub async fn update_end_date<'e, E>(
        executor: E,
        id: Uuid,
        end_date: NaiveDate,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE memberships SET end_date = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(end_date)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
