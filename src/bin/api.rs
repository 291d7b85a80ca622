use std::sync::Arc;
use tracing::info;
use travel_advisor::{
    api::start_server, config::AdvisorConfig, embedding::create_embedder, telemetry,
    DestinationSearch,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();
    telemetry::init_tracing("info");

    let config = AdvisorConfig::from_env()?;

    info!("🚀 Travel Advisor - Destination API");
    info!("📍 Port: {}", config.api_port);
    info!("📂 Store: {}", config.db_path.display());

    let embedder = create_embedder(&config.embedding)?;
    let search = Arc::new(
        DestinationSearch::open(&config.db_path, &config.collection_name, embedder).await?,
    );

    match search.count().await {
        Ok(count) => info!("✅ {} destinations available", count),
        Err(e) => info!("⚠️  Store not ready yet ({}); tools will report it until seeded", e),
    }

    info!("📡 Starting API server...");
    start_server(search, config.api_port).await?;

    Ok(())
}
