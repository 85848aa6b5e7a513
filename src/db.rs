use std::time::Duration;

use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

/// Conservative default; cascades hold a connection for the whole
/// transaction, so a small pool surfaces contention early.
pub const DEFAULT_MAX_POOL_SIZE: u32 = 2;

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

pub fn init_pool(database_url: &str) -> anyhow::Result<PgPool> {
    init_pool_with_size(database_url, DEFAULT_MAX_POOL_SIZE)
}

pub fn init_pool_with_size(database_url: &str, max_size: u32) -> anyhow::Result<PgPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = Pool::builder()
        .max_size(max_size.max(1))
        .connection_timeout(CONNECTION_TIMEOUT)
        .build(manager)?;
    Ok(pool)
}
