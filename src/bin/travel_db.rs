use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use travel_advisor::{
    config::AdvisorConfig,
    embedding::create_embedder,
    models::DEFAULT_SEARCH_RESULTS,
    seed::{SeedOptions, Seeder},
    telemetry,
    verify::{run_smoke_queries, verify_store},
    DestinationSearch, Result,
};

#[derive(Parser)]
#[command(name = "travel-db")]
#[command(about = "Seed, verify and query the travel destination store")]
#[command(version)]
struct Cli {
    /// Vector store directory
    #[arg(long, global = true, env = "TRAVEL_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Collection name
    #[arg(long, global = true, env = "TRAVEL_COLLECTION")]
    collection: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Populate the store from the destination CSV (no-op when already seeded)
    Seed {
        /// Destination CSV file
        #[arg(long, env = "TRAVEL_CSV_PATH")]
        csv_path: Option<PathBuf>,
        /// Delete the existing store before seeding
        #[arg(long)]
        reset: bool,
    },
    /// Check the store on disk and run sample queries
    Verify {
        /// Skip the sample queries
        #[arg(long)]
        no_queries: bool,
    },
    /// Print collection statistics
    Stats,
    /// Semantic search over destinations
    Search {
        query: String,
        #[arg(short, long, default_value_t = DEFAULT_SEARCH_RESULTS)]
        n_results: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    telemetry::init_tracing("info");

    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %e, "❌ travel-db failed");
            ExitCode::from(e.exit_code().clamp(1, 255) as u8)
        }
    }
}

async fn run(cli: Cli) -> Result<bool> {
    let mut config = AdvisorConfig::from_env()?;
    if let Some(db_path) = cli.db_path {
        config.db_path = db_path;
    }
    if let Some(collection) = cli.collection {
        config.collection_name = collection;
    }
    config.validate()?;

    let embedder = create_embedder(&config.embedding)?;

    match cli.command {
        Commands::Seed { csv_path, reset } => {
            if let Some(csv_path) = csv_path {
                config.csv_path = csv_path;
            }
            let options = SeedOptions {
                reset,
                ..SeedOptions::from(&config)
            };

            let report = Seeder::new(options, embedder).run().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(true)
        }

        Commands::Verify { no_queries } => {
            let report = verify_store(&config.db_path, &config.collection_name).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);

            if !report.is_ready() {
                warn!("⚠️  Vector store is not ready. Run `travel-db seed` first.");
                return Ok(false);
            }

            if !no_queries {
                let search = DestinationSearch::open(&config.db_path, &config.collection_name, embedder).await?;
                let results = run_smoke_queries(&search).await?;
                println!("{}", serde_json::to_string_pretty(&results)?);
            }

            info!("✅ Vector store is ready");
            Ok(true)
        }

        Commands::Stats => {
            let search = DestinationSearch::open(&config.db_path, &config.collection_name, embedder).await?;
            let stats = search.stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(true)
        }

        Commands::Search { query, n_results } => {
            let search = DestinationSearch::open(&config.db_path, &config.collection_name, embedder).await?;
            let matches = search.search(&query, n_results).await?;
            println!("{}", serde_json::to_string_pretty(&matches)?);
            Ok(true)
        }
    }
}
