pub mod models;

use sqlx::{SqlitePool, migrate::Migrator, sqlite::SqlitePoolOptions};

pub type Id = i64;

/// Marker for rows that have not been inserted yet.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct NoId;

pub static MIGRATOR: Migrator = sqlx::migrate!();

/// Open a pool and bring the schema up to date.
pub async fn init_pool(url: &str) -> Result<SqlitePool, sqlx::Error> {
    let pool = SqlitePoolOptions::new().connect(url).await?;
    MIGRATOR.run(&pool).await?;
    Ok(pool)
}

/// In-memory database for tests. A single connection keeps all statements on
/// the same `:memory:` instance.
pub async fn setup_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");
    MIGRATOR
        .run(&pool)
        .await
        .expect("Failed to apply migrations");
    pool
}
