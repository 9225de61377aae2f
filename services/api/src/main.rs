use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use api::{
    AppState, ReferenceBackend, ServerConfig,
    clients::{CustomSearchClient, GeminiClient, GeminiConfig, GenerationClient, SearchConfig},
    explanations::seed_prompt,
    references::{CollectionStrategy, CustomSearchStrategy, GroundedSearchStrategy},
    repositories::SettingsRepository,
    routes,
    storage::StorageConfig,
};
use auth::jwt::{JwtConfig, JwtService};
use common::database::{DatabaseConfig, health_check, init_pool, run_migrations};

const EXPLAIN_PROMPT_FILE: &str = "explain_prompt.txt";
const SEARCH_INSTRUCTION_FILE: &str = "search_instruction.txt";

#[tokio::main]
async fn main() -> Result<()> {
    common::telemetry::init_tracing("info");

    info!("Starting API service");

    let server_config = ServerConfig::from_env()?;
    let storage_config = StorageConfig::from_env()?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;
    run_migrations(&pool).await?;

    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    // Tokens are issued by the auth service and verified here with the same secret
    let jwt_service = JwtService::new(JwtConfig::from_env()?)?;

    let gemini = GeminiClient::new(GeminiConfig::from_env()?)
        .context("Gemini client configuration is invalid, is GEMINI_API_KEY set?")?;
    info!("Using generation model {}", gemini.model_name());
    let generator: Arc<dyn GenerationClient> = Arc::new(gemini);

    let prompts = Path::new(&server_config.prompts_path);
    let strategy: Option<Arc<dyn CollectionStrategy>> = match server_config.reference_backend {
        ReferenceBackend::Grounded => Some(Arc::new(GroundedSearchStrategy::with_instruction_file(
            generator.clone(),
            &prompts.join(SEARCH_INSTRUCTION_FILE),
        ))),
        ReferenceBackend::CustomSearch => {
            let client = CustomSearchClient::new(SearchConfig::from_env()?)
                .context("Custom search backend needs GOOGLE_SEARCH_API_KEY and GOOGLE_SEARCH_ENGINE_ID")?;
            Some(Arc::new(CustomSearchStrategy::new(Arc::new(client))))
        }
        ReferenceBackend::Disabled => {
            warn!("Reference collection is disabled");
            None
        }
    };

    if let Err(e) = seed_prompt(
        &SettingsRepository::new(pool.clone()),
        &prompts.join(EXPLAIN_PROMPT_FILE),
    )
    .await
    {
        warn!("Explanation prompt was not seeded: {}", e);
    }

    let app_state = AppState::new(pool, jwt_service, generator, strategy, &storage_config);

    let app = routes::create_router(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let address = server_config.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!("API service listening on {}", address);

    axum::serve(listener, app).await?;

    Ok(())
}
