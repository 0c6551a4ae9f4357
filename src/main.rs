// Blog CMS Server

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use blog_cms::{app_state::AppState, config::Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize application state
    let app_state = AppState::new(config.clone()).await?;
    let app = app_state.router();

    // Start server
    let addr = config.server_address();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "blog CMS listening");

    axum::serve(listener, app).await?;

    Ok(())
}
