use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use leaderboard_service::config::Config;
use leaderboard_service::handlers::{self, AppState};
use leaderboard_service::jobs::JobContext;
use leaderboard_service::providers::NeynarProvider;
use leaderboard_service::repository::PgStore;

fn init_tracing(json_logs: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,leaderboard_service=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(config.app.json_logs);

    config
        .validate()
        .context("Configuration validation failed")?;
    info!(env = %config.app.env, "Starting leaderboard-service");

    let pg_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.database.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.database.max_lifetime_secs))
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    sqlx::query("SELECT 1")
        .execute(&pg_pool)
        .await
        .context("Failed to verify database connection")?;
    info!("Database pool created and verified");

    sqlx::migrate!("./migrations")
        .run(&pg_pool)
        .await
        .context("Failed to run database migrations")?;
    info!("Database migrations applied");

    let store = Arc::new(PgStore::new(pg_pool));
    let provider = Arc::new(
        NeynarProvider::new(&config.provider).context("Failed to build provider client")?,
    );

    if config.jobs.cron_secret.is_none() {
        tracing::warn!("CRON_SECRET is not set, job triggers will be rejected");
    }

    let state = AppState::new(
        JobContext::new(provider.clone(), store.clone(), config.jobs.clone()),
        store,
        provider,
    );

    let bind_addr = (config.app.host.clone(), config.app.http_port);
    info!(host = %bind_addr.0, port = bind_addr.1, "Starting HTTP server");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(TracingLogger::default())
            .configure(handlers::configure)
    })
    .bind(bind_addr)
    .context("Failed to bind HTTP server")?
    .run()
    .await
    .context("HTTP server error")?;

    info!("leaderboard-service shut down");
    Ok(())
}
