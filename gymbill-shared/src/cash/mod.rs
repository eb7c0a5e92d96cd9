/// Cash-ledger services
///
/// - [`drawer`]: drawer lifecycle and manual movements
/// - [`payments`]: atomic invoice payment plus drawer movement
/// - [`payables`]: money owed by the tenant

pub mod drawer;
pub mod payables;
pub mod payments;

pub use drawer::DrawerService;
pub use payables::PayableService;
pub use payments::PaymentRegistrar;
