use axum::{extract::State, http::StatusCode, routing::get, Router};
use axum_sql_explorer::{ExplorerLayer, MySqlSource, ServerConfig};
use sqlx::mysql::MySqlPool;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod database;

#[derive(Clone)]
struct ApplicationState {
    pool: MySqlPool,
}

fn init_logger() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() {
    init_logger();

    // Load configuration, EXPLORER_CONFIG overrides the default path
    let config_path = std::env::var("EXPLORER_CONFIG").unwrap_or_else(|_| "config.json".to_string());
    let config = ServerConfig::load(&config_path).expect("Failed to load configuration");

    let source = MySqlSource::connect(&config.db)
        .await
        .expect("Failed to connect to MySQL database");
    let pool = source.pool().clone();

    // Create demo tables when the database is empty
    if std::env::var("EXPLORER_SEED").is_ok() {
        database::setup(&pool).await.expect("Failed to setup database");
    }

    let application_state = ApplicationState { pool: pool.clone() };

    let explorer_layer = ExplorerLayer::mysql("/explorer", pool, config.db.clone())
        .expect("Invalid database configuration");

    // Reflect once at startup so the first request is served from the cache
    if let Err(error) = explorer_layer.explorer().schema().await {
        tracing::warn!(%error, "initial schema reflection failed, retrying on first request");
    }

    // Note: ExplorerLayer must be merged after with_state() since it returns a stateless Router
    let app = Router::new()
        .route("/", get(root_handler))
        .route("/api/health", get(health_handler))
        .with_state(application_state)
        .merge(explorer_layer.into_router())
        .layer(CorsLayer::permissive());

    let address = format!("{}:{}", config.serve.hostname, config.serve.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .expect("Failed to bind listen address");

    tracing::info!("listening on http://{}", address);
    tracing::info!("schema at http://{}/explorer/api/_dbSchema", address);

    axum::serve(listener, app).await.expect("Server error");
}

async fn root_handler() -> &'static str {
    "Welcome to axum-sql-explorer example server"
}

async fn health_handler(
    State(state): State<ApplicationState>,
) -> Result<(StatusCode, &'static str), StatusCode> {
    // Try to verify database connectivity
    sqlx::query("SELECT 1")
        .fetch_one(&state.pool)
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    Ok((StatusCode::OK, "Server is healthy"))
}
