use pscheduler_executor::{spawn_periodic_flush, OutputLogBuffer};
use pscheduler_manager::Manager;
use pscheduler_server::{router, AppState, ServerConfig};
use pscheduler_store::Store;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("loaded configuration");

    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    tracing::info!("running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("failed to run migrations");

    let store = Store::new(db_pool);
    let buffer = Arc::new(OutputLogBuffer::new());
    let manager = Arc::new(Manager::new(store.clone(), Arc::clone(&buffer)));

    tracing::info!("reconciling executor registry against the task table");
    manager
        .sync()
        .await
        .expect("failed to perform initial executor sync");

    spawn_periodic_flush(
        Arc::clone(&buffer),
        store.clone(),
        Duration::from_secs(config.flush_interval_seconds),
    );

    let state = AppState { store, manager };
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.http.addr())
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.http.addr());

    axum::serve(listener, app)
        .await
        .expect("server error");
}
