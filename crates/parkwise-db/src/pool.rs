use anyhow::Result;
use sqlx::PgPool;

/// Create a PostgreSQL connection pool
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPool::connect(database_url).await?;
    Ok(pool)
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// True when the error (or the error it wraps) is a unique-constraint violation.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_non_database_error_is_not_unique_violation() {
        let err = anyhow::anyhow!("plain failure");
        assert!(!is_unique_violation(&err));

        let wrapped: Result<()> = Err(sqlx::Error::RowNotFound).context("Failed to create user");
        assert!(!is_unique_violation(&wrapped.unwrap_err()));
    }
}
