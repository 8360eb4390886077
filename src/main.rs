use lms_portal::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
    session::{MemorySessionStore, SessionManager},
    storage::{FileStore, FileStoreState, LocalFileStore},
    views::Views,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Initializes configuration, logging, database, file storage, sessions and templates,
/// then serves HTTP until the process is stopped.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Configuration & Environment Loading
    // Loads .env file settings before configuration can be read.
    dotenv::dotenv().ok();
    let config = AppConfig::load()?;

    // 2. Logging Filter Setup
    // RUST_LOG wins; otherwise sensible defaults for local development.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "lms_portal=debug,tower_http=info".into());

    // 3. Log format by environment: pretty locally, JSON in production.
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Database: pool, then schema migrations.
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect_with(config.connect_options()?)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database ready");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 5. File storage: the two upload folders on local disk.
    let local_files = LocalFileStore::from_config(&config);
    local_files.ensure_folders().await?;
    let files = Arc::new(local_files) as FileStoreState;

    // 6. Sessions and templates.
    let sessions = SessionManager::from_config(&config, Arc::new(MemorySessionStore::new()));
    let views = Views::new()?;

    // 7. Unified State Assembly
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState {
        repo,
        files,
        sessions,
        views,
        config,
    };

    // 8. Router and Server Startup
    let app = create_router(app_state);
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API documentation available at /swagger-ui");

    axum::serve(listener, app).await?;
    Ok(())
}
