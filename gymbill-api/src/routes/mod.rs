/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `billing`: Manual billing run and overdue sweep
/// - `memberships`: Enrollment
/// - `receivables`: Member invoices and their payments
/// - `payables`: Supplier bills and their payments
/// - `drawers`: Cash drawer operations

pub mod billing;
pub mod drawers;
pub mod health;
pub mod memberships;
pub mod payables;
pub mod receivables;
