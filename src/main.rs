use sqlx::postgres::PgPoolOptions;
use sqlx::Executor;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;
use treasury_ledger::api::{create_router, AppState};
use treasury_ledger::auth::JwtHandler;
use treasury_ledger::config::Settings;
use treasury_ledger::observability::{
    init_logging, init_metrics, mask_sensitive, LogConfig, LogFormat,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Configuration first: startup aborts here on a missing DATABASE_URL
    // or a weak signing secret.
    let settings = Settings::new()?;

    let log_config = LogConfig {
        level: settings.log_level.clone(),
        format: LogFormat::from(
            std::env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .as_str(),
        ),
        include_target: true,
    };
    init_logging(&log_config);

    let metrics_handle = init_metrics();
    info!("Configuration loaded, metrics initialized");

    let statement_timeout_ms = settings.database_statement_timeout_ms;
    let mut pool_options = PgPoolOptions::new()
        .max_connections(settings.database_pool_size)
        .acquire_timeout(Duration::from_secs(5));
    if statement_timeout_ms > 0 {
        pool_options = pool_options.after_connect(move |conn, _meta| {
            Box::pin(async move {
                conn.execute(format!("SET statement_timeout = {statement_timeout_ms}").as_str())
                    .await?;
                Ok(())
            })
        });
    }

    info!(
        "Connecting to database at {}...",
        mask_sensitive(&settings.database_url, 12)
    );
    let pool = pool_options.connect(&settings.database_url).await?;
    info!("Database connection established");

    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations applied successfully");

    let jwt = Arc::new(JwtHandler::new(
        &settings.jwt_secret,
        &settings.jwt_algorithm,
        settings.jwt_expiration_minutes,
    )?);

    let state = AppState::new(pool, jwt).with_metrics(metrics_handle);

    let mut app = create_router(state);

    let origins = settings.allowed_origins();
    if !origins.is_empty() {
        let origins = origins
            .iter()
            .map(|origin| origin.parse::<axum::http::HeaderValue>())
            .collect::<Result<Vec<_>, _>>()?;
        app = app.layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        );
    }

    let addr = settings.bind_address();
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
