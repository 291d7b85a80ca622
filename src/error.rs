//! Error types for the travel advisor retrieval layer

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for advisor operations
pub type Result<T> = std::result::Result<T, AdvisorError>;

#[derive(Error, Debug)]
pub enum AdvisorError {

    // =============================
    // Configuration & Input
    // =============================

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV file not found at {}", .0.display())]
    CsvNotFound(PathBuf),

    #[error("No destinations loaded from {}", .0.display())]
    EmptyCatalog(PathBuf),

    // =============================
    // Vector Store
    // =============================

    #[error("Vector store error: {0}")]
    Store(String),

    #[error("Collection '{0}' does not exist")]
    CollectionNotFound(String),

    #[error("No destinations found in database. Run the seeding step to populate it.")]
    StoreEmpty,

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Collection was built with '{stored}' but '{requested}' was requested")]
    EmbeddingModelMismatch { stored: String, requested: String },

    #[error("Embedding error: {0}")]
    Embedding(String),

    // =============================
    // Seeding & Startup
    // =============================

    #[error("Seed step exited with status {code}")]
    SeedStepFailed { code: i32 },

    #[error("Startup error: {0}")]
    Startup(String),

    #[error("Failed to launch '{program}': {source}")]
    LaunchFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    // =============================
    // Tools
    // =============================

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid tool input: {0}")]
    InvalidToolInput(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AdvisorError {
    /// Process exit code a binary should report for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            AdvisorError::SeedStepFailed { code } if *code != 0 => *code,
            // Shell conventions: 127 not found, 126 not executable
            AdvisorError::LaunchFailed { source, .. } => match source.kind() {
                std::io::ErrorKind::NotFound => 127,
                _ => 126,
            },
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_uses_seed_status() {
        assert_eq!(AdvisorError::SeedStepFailed { code: 3 }.exit_code(), 3);
        assert_eq!(AdvisorError::SeedStepFailed { code: 0 }.exit_code(), 1);
        assert_eq!(AdvisorError::StoreEmpty.exit_code(), 1);
    }

    #[test]
    fn test_exit_code_for_launch_failures() {
        let missing = AdvisorError::LaunchFailed {
            program: "uvicorn".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert_eq!(missing.exit_code(), 127);

        let denied = AdvisorError::LaunchFailed {
            program: "./server".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert_eq!(denied.exit_code(), 126);
    }

    #[test]
    fn test_csv_not_found_message() {
        let err = AdvisorError::CsvNotFound(PathBuf::from("./documents_rows.csv"));
        assert!(err.to_string().contains("documents_rows.csv"));
    }
}
