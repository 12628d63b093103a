use crypto_intelligence_api::{
    api::start_server,
    config::ModelCatalog,
    dispatch::ChatDispatcher,
    memory::ConversationStore,
    registry::ModelRegistry,
    tools::create_default_registry,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8000".to_string())
        .parse()?;

    let catalog = ModelCatalog::from_env();

    info!("Crypto Intelligence API");
    info!("Default model: {}", catalog.default_name());
    info!("Known models: {:?}", catalog.names());
    info!("Port: {}", port);

    // Create components
    let registry = Arc::new(ModelRegistry::new(catalog)?);
    let store = Arc::new(ConversationStore::new());
    let tools = Arc::new(create_default_registry());
    let dispatcher = Arc::new(ChatDispatcher::new(registry, store, tools));

    info!("Dispatcher initialized");
    info!("Starting API server...");

    start_server(dispatcher, port).await?;

    Ok(())
}
