//! # GymBill Shared Library
//!
//! Billing and cash-ledger core shared by the GymBill API server and the
//! billing worker.
//!
//! ## Module Organization
//!
//! - `models`: Database models, ledger rules and queries
//! - `calendar`: Month arithmetic and billing periods
//! - `store`: Persistence seam (PostgreSQL and in-memory)
//! - `billing`: Recurring invoices, overdue sweep, enrollment
//! - `cash`: Drawers, payments, payables
//! - `auth`: Tenant context from JWTs
//! - `db`: Connection pool and migrations
//! - `clock`: Business-date time source
//! - `error`: Common error type

pub mod auth;
pub mod billing;
pub mod calendar;
pub mod cash;
pub mod clock;
pub mod db;
pub mod error;
pub mod models;
pub mod store;

/// Current version of the GymBill shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
