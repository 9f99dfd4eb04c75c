use diesel::sqlite::SqliteConnection;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::{pooled_connection::bb8::Pool, AsyncPgConnection, SimpleAsyncConnection};

use crate::error_handler::ServiceError;

pub type SqliteAsyncConnection = SyncConnectionWrapper<SqliteConnection>;
pub type PgPool = Pool<AsyncPgConnection>;
pub type SqlitePool = Pool<SqliteAsyncConnection>;

const PG_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS plant_groups (
        id SERIAL PRIMARY KEY,
        user_id BIGINT NOT NULL,
        name TEXT NOT NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
    CREATE TABLE IF NOT EXISTS plants (
        id SERIAL PRIMARY KEY,
        user_id BIGINT NOT NULL,
        name TEXT NOT NULL,
        watering_frequency_days INTEGER NOT NULL CHECK (watering_frequency_days > 0),
        plant_type TEXT,
        group_id INTEGER REFERENCES plant_groups (id) ON DELETE SET NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (user_id, name)
    );
    CREATE TABLE IF NOT EXISTS watering_log (
        id SERIAL PRIMARY KEY,
        plant_id INTEGER NOT NULL REFERENCES plants (id) ON DELETE CASCADE,
        watered_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
    CREATE TABLE IF NOT EXISTS plant_photos (
        id SERIAL PRIMARY KEY,
        plant_id INTEGER NOT NULL REFERENCES plants (id) ON DELETE CASCADE,
        file_id TEXT NOT NULL,
        caption TEXT,
        uploaded_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
    CREATE TABLE IF NOT EXISTS user_settings (
        user_id BIGINT PRIMARY KEY,
        notifications_enabled BOOLEAN NOT NULL DEFAULT FALSE,
        notification_time TEXT NOT NULL DEFAULT '09:00'
    );
    CREATE INDEX IF NOT EXISTS idx_plants_user_id ON plants (user_id);
    CREATE INDEX IF NOT EXISTS idx_watering_log_plant_id ON watering_log (plant_id);
    CREATE INDEX IF NOT EXISTS idx_plant_photos_plant_id ON plant_photos (plant_id);
";

const SQLITE_SCHEMA: &str = "
    PRAGMA foreign_keys = ON;
    CREATE TABLE IF NOT EXISTS plant_groups (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id BIGINT NOT NULL,
        name TEXT NOT NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
    CREATE TABLE IF NOT EXISTS plants (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id BIGINT NOT NULL,
        name TEXT NOT NULL,
        watering_frequency_days INTEGER NOT NULL CHECK (watering_frequency_days > 0),
        plant_type TEXT,
        group_id INTEGER REFERENCES plant_groups (id) ON DELETE SET NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (user_id, name)
    );
    CREATE TABLE IF NOT EXISTS watering_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        plant_id INTEGER NOT NULL REFERENCES plants (id) ON DELETE CASCADE,
        watered_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
    CREATE TABLE IF NOT EXISTS plant_photos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        plant_id INTEGER NOT NULL REFERENCES plants (id) ON DELETE CASCADE,
        file_id TEXT NOT NULL,
        caption TEXT,
        uploaded_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
    CREATE TABLE IF NOT EXISTS user_settings (
        user_id BIGINT PRIMARY KEY,
        notifications_enabled BOOLEAN NOT NULL DEFAULT 0,
        notification_time TEXT NOT NULL DEFAULT '09:00'
    );
    CREATE INDEX IF NOT EXISTS idx_plants_user_id ON plants (user_id);
    CREATE INDEX IF NOT EXISTS idx_watering_log_plant_id ON watering_log (plant_id);
    CREATE INDEX IF NOT EXISTS idx_plant_photos_plant_id ON plant_photos (plant_id);
";

pub async fn create_pg_pool(database_url: &str, max_size: u32) -> Result<PgPool, ServiceError> {
    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    let pool = Pool::builder()
        .max_size(max_size)
        .build(config)
        .await
        .map_err(ServiceError::from)?;

    {
        let mut conn = pool.get().await?;
        conn.batch_execute(PG_SCHEMA).await?;
    }
    log::info!("PostgreSQL schema ready");

    Ok(pool)
}

// SQLite allows a single writer, and `foreign_keys` is a per-connection
// pragma, so the pool holds exactly one connection.
pub async fn create_sqlite_pool(path: &str) -> Result<SqlitePool, ServiceError> {
    let config = AsyncDieselConnectionManager::<SqliteAsyncConnection>::new(path);
    let pool = Pool::builder()
        .max_size(1)
        .build(config)
        .await
        .map_err(ServiceError::from)?;

    {
        let mut conn = pool.get().await?;
        conn.batch_execute(SQLITE_SCHEMA).await?;
    }
    log::info!("SQLite schema ready at {}", path);

    Ok(pool)
}
