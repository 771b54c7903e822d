use std::net::SocketAddr;

use study_quiz_backend::{
    build_router,
    config::{get_config, init_config},
    AppState,
};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    init_config()?;
    let config = get_config()?;

    let app_state = AppState::new(config.clone())?;
    if app_state.quiz_service.generation_enabled() {
        info!(model = %config.gemini_model, "Quiz generation enabled");
    }

    let app = build_router(app_state);

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
