/// Billing services
///
/// - [`generator`]: daily recurring-invoice generation
/// - [`overdue`]: pending-to-overdue sweep
/// - [`enrollment`]: membership creation with its first invoice
/// - [`receivables`]: receivable reads and cancellation

pub mod enrollment;
pub mod generator;
pub mod overdue;
pub mod receivables;

pub use enrollment::{Enrollment, EnrollmentRequest, EnrollmentService};
pub use generator::{MembershipOutcome, Outcome, RecurringInvoiceGenerator, RunSummary, SkipReason};
pub use overdue::{OverdueSweep, OverdueSweeper};
pub use receivables::ReceivableService;
