use crate::error::AppError;
use db_pool::{create_pool as create_pg_pool, DbConfig as DbPoolConfig};
use deadpool_postgres::Pool;

const SCHEMA: &str = include_str!("../migrations/0001_init.sql");

pub async fn init_pool(database_url: &str) -> Result<Pool, AppError> {
    let mut cfg = DbPoolConfig::from_env("marketplace-chat-service");
    if cfg.database_url.is_empty() {
        cfg.database_url = database_url.to_string();
    }
    cfg.log_config();
    let pool = create_pg_pool(cfg)
        .await
        .map_err(|e| AppError::StartServer(format!("db pool: {e}")))?;
    Ok(pool)
}

/// Apply the embedded schema. Statements are idempotent so this is safe to
/// run on every startup.
pub async fn run_migrations(pool: &Pool) -> Result<(), AppError> {
    let client = pool.get().await?;
    client.batch_execute(SCHEMA).await?;
    Ok(())
}
