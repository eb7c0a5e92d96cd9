/// Database models for GymBill
///
/// This module contains the billing and cash-ledger models and their queries.
/// Query functions are generic over [`sqlx::postgres::PgExecutor`] so they run
/// equally against the pool or inside a transaction (`&mut *tx`).
///
/// # Models
///
/// - `plan`: Catalog plans and discounts (read-only)
/// - `membership`: Enrollments and their paid-through cursor
/// - `invoice`: Status machine and payment arithmetic shared by both ledgers
/// - `receivable`: Money owed to the tenant
/// - `payable`: Money owed by the tenant
/// - `cash_drawer`: Cash sessions and their movements
///
/// # Example
///
/// ```no_run
/// use gymbill_shared::models::cash_drawer::CashDrawer;
/// use gymbill_shared::db::pool::{create_pool, DatabaseConfig};
/// use uuid::Uuid;
///
/// # async fn example(tenant_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// if let Some(drawer) = CashDrawer::find_open(&pool, tenant_id).await? {
///     println!("Drawer #{} balance {}", drawer.number, drawer.expected_balance());
/// }
/// # Ok(())
/// # }
/// ```

pub mod cash_drawer;
pub mod invoice;
pub mod membership;
pub mod payable;
pub mod plan;
pub mod receivable;
