//! Core services
//!
//! Each service owns one domain concern and its SQL. External collaborators
//! (key/value store, broker, geocoder HTTP) enter through narrow seams so the
//! pure decision logic stays unit-testable.

pub mod analytics;
pub mod assignment;
pub mod couriers;
pub mod geocoding;
pub mod orders;
pub mod promo;
pub mod rate_limit;

/// True when a database error is a unique-constraint violation (SQLSTATE 23505).
pub(crate) fn unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}
