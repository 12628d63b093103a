//! Offline demo: a scripted conversation against mock models.
//!
//! Exercises the full dispatch path (registry, memory, tools, summaries)
//! without any network access.

use crypto_intelligence_api::{
    config::{ModelCatalog, ModelConfig},
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
        .with_max_level(tracing::Level::DEBUG)
        .init();

    info!("Crypto chat demo starting");

    let mut catalog = ModelCatalog::new("fast");
    catalog.insert("fast", ModelConfig::mock(""));
    catalog.insert("slow", ModelConfig::mock("Considered answer from the slow model."));
    catalog.insert("down", ModelConfig::failing_mock("provider unreachable"));

    let registry = Arc::new(ModelRegistry::new(catalog)?);
    let store = Arc::new(ConversationStore::new());
    let tools = Arc::new(create_default_registry());
    let dispatcher = ChatDispatcher::new(registry.clone(), store.clone(), tools);

    println!("\n=== CHAT (model: {}) ===", registry.current_name().await);
    for message in ["What is the price of BTC?", "And ETH?"] {
        let result = dispatcher
            .handle_chat(message, Some("demo"), Some("window:6"))
            .await;
        println!("user: {}", message);
        println!("assistant: {}", result.response.unwrap_or_default());
    }

    let changed = registry.switch("slow").await?;
    println!("\n=== SWITCHED MODEL (changed: {}) ===", changed);

    let result = dispatcher
        .handle_chat("Should I rebalance my portfolio?", Some("demo"), None)
        .await;
    println!("assistant: {}", result.response.unwrap_or_default());

    registry.switch("down").await?;
    println!("\n=== FAILURE PATH ===");
    let result = dispatcher
        .handle_chat("Is the market up today?", Some("demo"), None)
        .await;
    println!("success: {}", result.success);
    println!("error: {}", result.error.unwrap_or_default());

    let snapshot = store.history("demo").await?;
    println!("\n=== TRANSCRIPT ({} turns) ===", snapshot.turns.len());
    for turn in &snapshot.turns {
        println!("  [{:?}] {}", turn.role, turn.content);
    }

    Ok(())
}
