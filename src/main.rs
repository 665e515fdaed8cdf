use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use smartcity_assistant::{
    config::AppConfig, gateway::CompletionClient, routes, state::AppState,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env().context("failed to load configuration")?;
    let gateway =
        CompletionClient::new(&config.llm).context("failed to build completion client")?;
    info!(model = gateway.model(), api_base = %config.llm.api_base, "assistant gateway ready");

    let state = Arc::new(AppState::from_config(Arc::new(gateway), &config));
    state.sessions.spawn_purge_task(PURGE_INTERVAL);

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    info!("Smart city assistant running at http://{}", config.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
