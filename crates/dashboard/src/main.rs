use batchboard::api;
use batchboard::clock::SystemClock;
use batchboard::config;
use batchboard::db;
use batchboard::jobs::BatchRepo;
use batchboard::logging::init_logging;

use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cfg = config::Config::from_env()?;

    info!(
        http_addr = %cfg.http_addr,
        default_days = cfg.default_days,
        db_schema = cfg.db_schema.as_deref().unwrap_or("default"),
        "batchboard starting"
    );

    let pool = db::make_pool(&cfg).await?;
    let repo = BatchRepo::new(pool);

    let api_state = api::ApiState::new(repo, Arc::new(SystemClock), cfg.default_days);
    let app = api::router(api_state);

    let listener = tokio::net::TcpListener::bind(&cfg.http_addr).await?;
    info!("dashboard api listening on http://{}", cfg.http_addr);

    let api_handle = tokio::spawn(async move {
        axum::serve(listener, app).await?;
        Ok::<(), anyhow::Error>(())
    });

    tokio::select! {
        res = api_handle => res??,
        _ = tokio::signal::ctrl_c() => info!("shutdown requested"),
    }

    Ok(())
}
