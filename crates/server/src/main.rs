use std::sync::Arc;

use orchestrator::agents::AgentSet;
use orchestrator::{EngineConfig, ManagerConfig, SessionManager};
use server::config::ServerConfig;
use server::state::AppState;
use server::create_router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::from_env();

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;

    let manager = Arc::new(SessionManager::new(
        pool,
        AgentSet::offline(),
        ManagerConfig {
            engine: EngineConfig {
                stage_timeout: config.stage_timeout,
            },
            recovery: config.recovery,
        },
    ));

    let recovered = manager.recover_interrupted().await?;
    if recovered > 0 {
        tracing::info!(count = recovered, "Recovered interrupted sessions");
    }

    let app = create_router(AppState::new(manager));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
