//! Container entrypoint: seed the destination store, then run the service.
//!
//! ```text
//! start [--skip-seed] [--seed-command CMD ... ;] [--no-exec] -- PROGRAM [ARGS...]
//! ```

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use travel_advisor::{
    config::AdvisorConfig,
    embedding::create_embedder,
    seed::{SeedOptions, Seeder},
    startup::{run_startup, ExternalSeed, InProcessSeed, LaunchMode, SeedStep, ServiceCommand, SkipSeed},
    telemetry, Result,
};

#[derive(Parser)]
#[command(name = "start")]
#[command(about = "Seed the travel destination store, then start the service")]
#[command(version)]
struct Cli {
    /// Do not seed; start the service directly
    #[arg(long, conflicts_with = "seed_command")]
    skip_seed: bool,

    /// Run this command as the seed step instead of seeding in-process.
    /// Its arguments may start with `-`; end them with `;`
    #[arg(long, num_args = 1.., value_terminator = ";", allow_hyphen_values = true)]
    seed_command: Option<Vec<String>>,

    /// Run the service as a child process instead of replacing this one
    #[arg(long)]
    no_exec: bool,

    /// Service command and its arguments
    #[arg(last = true, required = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    telemetry::init_tracing("info");

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => ExitCode::from(code.clamp(0, 255) as u8),
        Err(e) => {
            error!(error = %e, "❌ Startup failed");
            ExitCode::from(e.exit_code().clamp(1, 255) as u8)
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let command = ServiceCommand::from_argv(cli.command)?;

    let seed: Box<dyn SeedStep> = if cli.skip_seed {
        Box::new(SkipSeed)
    } else if let Some(argv) = cli.seed_command {
        Box::new(ExternalSeed::new(argv)?)
    } else {
        let config = AdvisorConfig::from_env()?;
        info!(
            db_path = %config.db_path.display(),
            csv_path = %config.csv_path.display(),
            "🌱 Seeding travel destinations"
        );
        let embedder = create_embedder(&config.embedding)?;
        Box::new(InProcessSeed::new(Seeder::new(SeedOptions::from(&config), embedder)))
    };

    let mode = if cli.no_exec {
        LaunchMode::Spawn
    } else {
        LaunchMode::Exec
    };

    run_startup(seed.as_ref(), &command, mode).await
}
