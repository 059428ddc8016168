use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::Config;

/// Pool over the batch metadata database.
///
/// Every connection is switched to read-only transactions: the tables belong
/// to the batch engine and this crate only observes them.
pub async fn make_pool(cfg: &Config) -> anyhow::Result<PgPool> {
    let disable_jit = cfg.pool.disable_jit;
    // validated by config::validate_schema, safe to splice
    let search_path = cfg
        .db_schema
        .as_deref()
        .map(|s| format!("SET search_path TO {s}, public"));

    let pool = PgPoolOptions::new()
        .max_connections(cfg.pool.max_connections)
        .acquire_timeout(cfg.pool.acquire_timeout)
        .after_connect(move |conn, _meta| {
            let search_path = search_path.clone();
            Box::pin(async move {
                sqlx::query("SET default_transaction_read_only = on")
                    .execute(&mut *conn)
                    .await?;
                if disable_jit {
                    sqlx::query("SET jit = OFF").execute(&mut *conn).await?;
                }
                if let Some(stmt) = search_path {
                    sqlx::query(&stmt).execute(&mut *conn).await?;
                }
                Ok(())
            })
        })
        .connect(&cfg.database_url)
        .await?;

    Ok(pool)
}
