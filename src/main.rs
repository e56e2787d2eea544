//! Valence Server - Library Request Broker
//!
//! Brokers patron requests for library material against the catalog,
//! circulation, and shared-collection backends.

use axum::{routing::get, Router};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use valence_server::{api, backends::Backends, config::AppConfig, services::Services, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().expect("Failed to load configuration");

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("valence_server={},tower_http=debug", config.logging.level).into()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Valence Server v{}", env!("CARGO_PKG_VERSION"));

    // Create database connection pool (audit log, legacy patron lookups)
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Connected to database");

    // Construct backend clients and services
    let config = Arc::new(config);
    let backends = Backends::from_config(&config).expect("Failed to construct backend clients");
    let services =
        Services::new(config.clone(), backends, pool).expect("Failed to create services");

    tracing::info!(
        "Registered {} request services",
        services.catalog.keys().count()
    );

    // Save server address before moving config
    let server_host = config.server.host.clone();
    let server_port = config.server.port;

    // Create application state
    let state = AppState {
        config,
        services: Arc::new(services),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(server_host.parse().expect("Invalid host address"), server_port);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health checks
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Patron barcode lookup for partner systems
        .route("/patron_barcode", get(api::patron_barcode::lookup))
        // Request services: every service key maps to the forms handlers.
        // Static routes above take precedence over these captures.
        .route(
            "/:service",
            get(api::forms::show_bare).post(api::forms::create),
        )
        .route("/:service/:id", get(api::forms::show))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
