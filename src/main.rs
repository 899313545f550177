// src/main.rs

use std::{net::SocketAddr, sync::Arc, time::Duration};

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use test_analytics::{
    ai::ChatClient,
    cache::AnalyticsCache,
    config::Config,
    routes,
    services::{AnalysisDefaults, AnalysisService, DocxRenderer, ReportService},
    state::AppState,
    store::{PgCacheStore, PgRecordsStore, PgSettingsStore, PgTemplateStore},
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // Initialize Database Pool with Retry
    let mut retry_count = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    panic!("Failed to connect to database after 5 retries: {}", e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };

    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations applied successfully.");

    // Construct the shared service handles once
    let records = Arc::new(PgRecordsStore::new(pool.clone()));
    let cache = AnalyticsCache::new(Arc::new(PgCacheStore::new(pool.clone())));
    let settings = Arc::new(PgSettingsStore::new(pool.clone()));
    let ai = Arc::new(ChatClient::from_config(&config));
    tracing::info!("AI backend: {} ({})", config.ai_base_url, config.ai_model);

    let analysis = Arc::new(AnalysisService::new(
        records.clone(),
        cache,
        ai,
        settings.clone(),
        AnalysisDefaults::from(&config),
    ));
    let reports = Arc::new(ReportService::new(
        &config.output_dir,
        Arc::new(DocxRenderer),
        settings.clone(),
    ));

    let state = AppState {
        config: config.clone(),
        analysis,
        reports,
        templates: Arc::new(PgTemplateStore::new(pool.clone())),
        records,
        settings,
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    // Bind to the listening address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();

    // Start the server
    axum::serve(listener, app).await.unwrap();
}
