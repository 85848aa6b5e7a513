use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::info;

use defectdesk::config::AppConfig;
use defectdesk::db;
use defectdesk::routes;
use defectdesk::state::AppState;
use defectdesk::storage::{ObjectStorage, S3Storage};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "defectdesk=info,tower_http=info".into()),
        )
        .init();

    let config = AppConfig::from_env()?;
    info!(
        database_url = %config.redacted_database_url(),
        bucket = %config.s3_bucket,
        "starting defectdesk"
    );

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    run_migrations(&pool).await?;

    let storage: Arc<dyn ObjectStorage> = Arc::new(S3Storage::from_config(&config).await?);

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let state = AppState::new(pool, config, storage);
    let router = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, router)
        .await
        .context("server terminated")?;

    Ok(())
}

async fn run_migrations(pool: &db::PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection for migrations: {err}"))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|err| anyhow!("failed to run migrations: {err}"))?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}
