use sqlx::PgPool;

/// Executes `kanau` query commands against the connection pool.
#[derive(Debug, Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}
