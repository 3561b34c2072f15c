use axum::{
    Router,
    http::{Method, header},
    routing::get,
};
use planemgr_core::chart::ChartStore;
use planemgr_server::{
    auth::{Authorizer, StaticToken},
    config::Config,
    handlers::{ChartsState, chart_routes, health_routes},
    locks::ChartLocks,
};
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "planemgr_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting Planemgr Server v{}", env!("CARGO_PKG_VERSION"));
    info!("Charts directory: {:?}", config.charts_dir());
    info!("CORS origins: {:?}", config.cors_origins);
    if config.api_token.is_some() {
        info!("API token auth: enabled");
    } else {
        info!("API token auth: disabled (all requests allowed)");
    }

    // Create charts directory
    if let Err(e) = std::fs::create_dir_all(config.charts_dir()) {
        error!("Failed to create charts directory: {}", e);
        std::process::exit(1);
    }

    // Create shared state
    let auth: Arc<dyn Authorizer> = Arc::new(StaticToken::new(config.api_token.clone()));
    let state = ChartsState {
        store: Arc::new(ChartStore::new(config.charts_dir())),
        locks: Arc::new(ChartLocks::new()),
        auth,
    };

    // Build CORS layer. A wildcard origin cannot be combined with credentials.
    let cors = if config.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_methods(Any)
            .allow_headers(Any)
            .allow_origin(Any)
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::HEAD,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .allow_origin(AllowOrigin::list(origins))
    };

    // Build the router
    let app = Router::new()
        .route("/", get(|| async { "Planemgr Server" }))
        .nest("/api", health_routes().merge(chart_routes(state)))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Create listener
    let addr = config.server_addr();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    info!("Server listening on http://{}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    info!("Server shut down gracefully");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
