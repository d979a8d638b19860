/// Database layer
///
/// - `pool`: PostgreSQL connection pool with a startup health check
/// - `migrations`: embedded sqlx migrations
///
/// Models and their queries live in the crate-level `models` module.

pub mod migrations;
pub mod pool;
