use pacer::{AppState, config::ServerConfig, create_router};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pacer=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!("plan cache capacity {}", config.cache_capacity);

    let app = create_router(AppState::new(config.cache_capacity));

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!("starting pacer on http://{}", config.addr);
    tracing::info!("  POST /api/profile - elevation profile from a GeoJSON track");
    tracing::info!("  POST /api/splits - splits, waypoint segments and arrivals");
    tracing::info!("  POST /api/pace-profile - pace chart samples");
    tracing::info!("  POST /api/nearest - snap a coordinate onto the course");
    axum::serve(listener, app).await?;

    Ok(())
}
