use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use imagegen_client::{api, config::Config, service_from_config, AppError};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    Config::dotenv_load();
    let config = Config::new()?;
    Config::log_env_vars();

    let state = Arc::new(api::AppState {
        service: service_from_config(&config),
    });
    let app = api::router(state);

    let addr: SocketAddr = format!("{}:{}", config.api_host, config.api_port)
        .parse()
        .map_err(|e| AppError::Config(format!("invalid API_HOST/API_PORT: {}", e)))?;
    tracing::info!(
        %addr,
        backend = %config.imagegen_url,
        max_concurrent = config.max_concurrent,
        "listening"
    );

    axum::Server::try_bind(&addr)?
        .serve(app.into_make_service())
        .await?;
    Ok(())
}
