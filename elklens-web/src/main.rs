use elklens_web::{create_app, AppState, WebConfig};
use std::net::SocketAddr;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = WebConfig::load()?;
    let state = AppState::new(config.clone()).await?;
    tracing::info!("Using reasoning provider: {}", state.lens.provider_name());

    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(
        "ElkLens web server listening on http://{} (max body {} bytes)",
        addr,
        config.max_body_size
    );

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
