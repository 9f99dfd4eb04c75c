mod bot;
mod config;
mod db;
mod dispatcher;
mod error_handler;
mod health;
mod lock;
mod messenger;
mod models;
mod schedule;
pub mod schema;
mod store;
mod telegram;

use actix_web::{middleware::Logger, web, App, HttpServer};
use bot::Conversation;
use config::{Config, DatabaseConfig};
use dispatcher::{NotificationDispatcher, SystemClock};
use error_handler::ServiceError;
use health::HealthState;
use lock::InstanceLock;
use std::io;
use std::sync::Arc;
use store::{PgStore, PlantStore, SqliteStore};
use telegram::TelegramClient;

async fn open_store(config: &Config) -> Result<Arc<dyn PlantStore>, ServiceError> {
    match &config.database {
        DatabaseConfig::Postgres { url } => {
            log::info!("Using PostgreSQL plant store");
            let pool = db::create_pg_pool(url, config.pool_size).await?;
            Ok(Arc::new(PgStore::new(pool)))
        }
        DatabaseConfig::Sqlite { path } => {
            log::info!("Using SQLite plant store at {}", path);
            let pool = db::create_sqlite_pool(path).await?;
            Ok(Arc::new(SqliteStore::new(pool)))
        }
    }
}

fn fatal(context: &str, e: impl std::fmt::Display) -> io::Error {
    log::error!("{}: {}", context, e);
    io::Error::other(format!("{}: {}", context, e))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if cfg!(debug_assertions) {
        match dotenvy::dotenv() {
            Ok(path) => log::info!(".env file loaded from path: {}", path.display()),
            Err(e) => log::warn!(
                "Could not load .env file: {}, using environment variables.",
                e
            ),
        }
    }

    let config = Config::from_env().map_err(|e| fatal("Invalid configuration", e))?;
    let _lock = InstanceLock::acquire(&config.lock_file)
        .map_err(|e| fatal("Could not start the bot", e))?;
    log::info!("Starting plant reminder bot with PID {}", std::process::id());

    let store = open_store(&config)
        .await
        .map_err(|e| fatal("Failed to open the plant store", e))?;
    let telegram = TelegramClient::new(&config.telegram_api_url, &config.telegram_token)
        .map_err(|e| fatal("Failed to build the Telegram client", e))?;

    let clock = Arc::new(SystemClock);
    let health = Arc::new(HealthState::new(chrono::Local::now()));

    let dispatcher = Arc::new(NotificationDispatcher::new(
        store.clone(),
        Arc::new(telegram.clone()),
        clock.clone(),
        health.clone(),
        config.notification_period,
        config.send_timeout,
    ));
    dispatcher::run_supervised(dispatcher);

    let conversation = Arc::new(Conversation::new(store.clone(), clock));
    tokio::spawn(bot::poller::run_polling(telegram, conversation));

    log::info!(
        "Health check server will start at http://{}:{}",
        config.host,
        config.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::from(health.clone()))
            .app_data(web::Data::from(store.clone()))
            .service(web::resource("/health").route(web::get().to(health::health_check_handler)))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
