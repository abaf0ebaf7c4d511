mod configuration;
mod error;
mod routes;
mod state;

use quill::gateway::Gateway;
use quill::providers::factory;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine, the environment may already be set
    dotenv::dotenv().ok();

    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let settings = configuration::Settings::new()?;
    info!(
        provider = %settings.provider.provider_type(),
        max_steps = settings.agent.max_steps,
        "configuration loaded"
    );

    // Create app state, credentials are only checked when a provider is called
    let provider = factory::get_provider(settings.provider.into_config())?;
    let gateway = Gateway::new(provider).with_limits(settings.limits.attachment_limits());
    let state = state::AppState::new(gateway, settings.agent.max_steps);

    // Create router with CORS support
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::configure(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(settings.server.socket_addr()?).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
