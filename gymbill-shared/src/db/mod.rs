/// Database layer for GymBill
///
/// - `pool`: PostgreSQL connection pool with health checks
/// - `migrations`: Embedded migration runner
///
/// Models and their queries are in the `models` module; the transactional
/// orchestration lives in `store::postgres`.

pub mod migrations;
pub mod pool;

/// Whether a database error is a unique-constraint violation
///
/// Used to translate constraint races (second open drawer, duplicate billing
/// period) into conflicts.
pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}

/// Name of the violated constraint, if the database reported one
pub fn violated_constraint(error: &sqlx::Error) -> Option<String> {
    match error {
        sqlx::Error::Database(db) => db.constraint().map(str::to_string),
        _ => None,
    }
}
