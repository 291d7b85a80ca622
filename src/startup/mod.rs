//! Startup wrapper
//!
//! Runs the seeding step to completion, then hands the process over to the
//! service command. A failed seed stops startup before the command runs;
//! the command's own exit status becomes the wrapper's.

use crate::error::AdvisorError;
use crate::seed::Seeder;
use crate::Result;
use async_trait::async_trait;
use std::process::ExitStatus;
use tracing::{error, info};

/// Something that must succeed before the service starts
#[async_trait]
pub trait SeedStep: Send + Sync {
    fn describe(&self) -> String;
    async fn run(&self) -> Result<()>;
}

/// Seed the store inside the wrapper process
pub struct InProcessSeed {
    seeder: Seeder,
}

impl InProcessSeed {
    pub fn new(seeder: Seeder) -> Self {
        Self { seeder }
    }
}

#[async_trait]
impl SeedStep for InProcessSeed {
    fn describe(&self) -> String {
        format!("in-process seed of {}", self.seeder.options().db_path.display())
    }

    async fn run(&self) -> Result<()> {
        self.seeder.run().await.map(|_| ())
    }
}

/// Seed by running an external command; non-zero exit is a failure
pub struct ExternalSeed {
    argv: Vec<String>,
}

impl ExternalSeed {
    pub fn new(argv: Vec<String>) -> Result<Self> {
        if argv.is_empty() {
            return Err(AdvisorError::Startup("Seed command must not be empty".to_string()));
        }
        Ok(Self { argv })
    }
}

#[async_trait]
impl SeedStep for ExternalSeed {
    fn describe(&self) -> String {
        self.argv.join(" ")
    }

    async fn run(&self) -> Result<()> {
        let status = tokio::process::Command::new(&self.argv[0])
            .args(&self.argv[1..])
            .status()
            .await
            .map_err(|source| AdvisorError::LaunchFailed {
                program: self.argv[0].clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(AdvisorError::SeedStepFailed {
                code: exit_code(status),
            })
        }
    }
}

/// No seeding (`--skip-seed`)
pub struct SkipSeed;

#[async_trait]
impl SeedStep for SkipSeed {
    fn describe(&self) -> String {
        "skipped".to_string()
    }

    async fn run(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ServiceCommand {
    pub fn from_argv(argv: Vec<String>) -> Result<Self> {
        let mut iter = argv.into_iter();
        let program = iter
            .next()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| AdvisorError::Startup("No service command given".to_string()))?;

        Ok(Self {
            program,
            args: iter.collect(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Replace this process with the command (Unix only; spawns elsewhere)
    Exec,
    /// Run the command as a child and report its exit code
    Spawn,
}

/// Seed, then launch. Returns the exit code the wrapper should report.
pub async fn run_startup(
    seed: &dyn SeedStep,
    command: &ServiceCommand,
    mode: LaunchMode,
) -> Result<i32> {
    info!(step = %seed.describe(), "Running seed step");

    if let Err(e) = seed.run().await {
        error!(error = %e, program = %command.program, "Seed step failed; not starting service");
        return Err(e);
    }

    info!(program = %command.program, args = ?command.args, ?mode, "Starting service");
    launch(command, mode).await
}

pub async fn launch(command: &ServiceCommand, mode: LaunchMode) -> Result<i32> {
    match mode {
        LaunchMode::Exec => exec(command),
        LaunchMode::Spawn => spawn(command).await,
    }
}

#[cfg(unix)]
fn exec(command: &ServiceCommand) -> Result<i32> {
    use std::os::unix::process::CommandExt;

    // Only returns on failure
    let source = std::process::Command::new(&command.program)
        .args(&command.args)
        .exec();

    Err(AdvisorError::LaunchFailed {
        program: command.program.clone(),
        source,
    })
}

#[cfg(not(unix))]
fn exec(command: &ServiceCommand) -> Result<i32> {
    let status = std::process::Command::new(&command.program)
        .args(&command.args)
        .status()
        .map_err(|source| AdvisorError::LaunchFailed {
            program: command.program.clone(),
            source,
        })?;
    Ok(exit_code(status))
}

async fn spawn(command: &ServiceCommand) -> Result<i32> {
    let status = tokio::process::Command::new(&command.program)
        .args(&command.args)
        .status()
        .await
        .map_err(|source| AdvisorError::LaunchFailed {
            program: command.program.clone(),
            source,
        })?;

    let code = exit_code(status);
    info!(program = %command.program, code, "Service exited");
    Ok(code)
}

/// Exit code as a shell would report it (signals become 128 + signal)
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}
