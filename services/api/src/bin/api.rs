//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{db::PgStore, mailer::ResendMailer, stripe::StripeAdapter},
    config::Config,
    error::ApiError,
    web::{api_router, state::AppState, ApiDoc},
};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let store = Arc::new(PgStore::new(db_pool.clone()));
    info!("Running database migrations...");
    store.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let payments = Arc::new(StripeAdapter::new(config.stripe_secret_key.clone()));
    let mailer = Arc::new(ResendMailer::new(
        config.resend_api_key.clone(),
        config.email_from.clone(),
    ));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(store, payments, mailer, config.clone()));

    // --- 5. CORS for the browser front end ---
    let cors_origin = config
        .base_url
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("BASE_URL is not a valid origin: {}", e)))?;
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 6. Create the Web Router ---
    let app = Router::new()
        .merge(api_router(app_state).layer(cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
