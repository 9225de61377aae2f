use anyhow::Result;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use auth::{
    AppState, ServerConfig,
    jwt::{JwtConfig, JwtService},
    repositories::SessionRepository,
    routes,
    sweeper::SessionSweeper,
};
use common::database::{DatabaseConfig, health_check, init_pool, run_migrations};

#[tokio::main]
async fn main() -> Result<()> {
    common::telemetry::init_tracing("info");

    info!("Starting authentication service");

    let server_config = ServerConfig::from_env()?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;
    run_migrations(&pool).await?;

    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    // Initialize JWT service
    let jwt_config = JwtConfig::from_env()?;
    let jwt_service = JwtService::new(jwt_config)?;

    // Keep the scheduler alive for the lifetime of the server
    let sweeper = SessionSweeper::new(SessionRepository::new(pool.clone()));
    sweeper.sweep().await?;
    let _scheduler = sweeper.start(&server_config.sweep_schedule).await?;

    let app_state = AppState::new(pool, jwt_service);

    let app = routes::create_router(app_state).layer(TraceLayer::new_for_http());

    let address = server_config.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!("Authentication service listening on {}", address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
