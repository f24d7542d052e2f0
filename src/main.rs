use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use peer_review_server::config::CorsConfig;
use peer_review_server::reviews::spawn_purge_task;
use peer_review_server::{configure_routes, AppError, AppState, Settings};
use std::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn build_cors(config: &CorsConfig) -> Cors {
    if !config.enabled {
        // CORS disabled - use most restrictive settings
        return Cors::default();
    }

    let cors = if config.allow_any_origin {
        Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
    } else {
        config
            .allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allow_any_method()
            .allow_any_header()
            .supports_credentials()
    };

    cors.max_age(config.max_age as usize)
}

#[actix_web::main]
async fn main() -> peer_review_server::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    // Load configuration
    let config = Settings::new()?;
    info!("Configuration loaded successfully ({} mode)", config.environment);

    // Fails here, not per request, on an unsupported signing algorithm
    let state = AppState::new(config.clone()).await?;
    info!(
        "Signing tokens with {}, valid for {} minutes",
        config.auth.algorithm, config.auth.token_expiry_minutes
    );

    let purge_task = spawn_purge_task(
        state.review_service.rotation().clone(),
        CancellationToken::new(),
    );

    let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))?;
    info!("Starting server at http://{}:{}", config.server.host, config.server.port);

    let data = web::Data::new(state.clone());
    let cors_config = config.cors.clone();
    let result = HttpServer::new(move || {
        App::new()
            .wrap(build_cors(&cors_config))
            .app_data(data.clone())
            .configure(configure_routes)
    })
    .listen(listener)?
    .workers(config.server.workers as usize)
    .run()
    .await
    .map_err(|e| AppError::InternalError(e.to_string()));

    info!("Server stopped, shutting down");
    if let Err(e) = purge_task.shutdown().await {
        error!("Review purge task ended abnormally: {}", e);
    }
    state.shutdown().await?;

    result
}
