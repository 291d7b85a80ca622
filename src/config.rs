//! Runtime configuration
//!
//! Values come from the process environment (after `.env` is loaded) with
//! container-aware defaults for the store and CSV paths.

use crate::error::AdvisorError;
use crate::Result;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Root directory of the service inside the container image
pub const CONTAINER_ROOT: &str = "/app";
pub const DEFAULT_DB_DIR: &str = "travel_chromadb";
pub const DEFAULT_CSV_FILE: &str = "documents_rows.csv";
pub const DEFAULT_COLLECTION: &str = "travel_destinations";
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_API_PORT: u16 = 8080;
pub const DEFAULT_HASHING_DIMENSIONS: usize = 384;
pub const DEFAULT_GEMINI_EMBEDDING_MODEL: &str = "text-embedding-004";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingProvider {
    /// Offline feature-hashing embedder
    Hashing,
    /// Gemini `batchEmbedContents` API
    Gemini,
}

impl FromStr for EmbeddingProvider {
    type Err = AdvisorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "hashing" | "local" => Ok(EmbeddingProvider::Hashing),
            "gemini" | "google" => Ok(EmbeddingProvider::Gemini),
            other => Err(AdvisorError::Config(format!(
                "Unknown EMBEDDING_PROVIDER '{}' (expected 'hashing' or 'gemini')",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    /// Only used by the hashing provider; Gemini reports its own size
    pub dimensions: usize,
    pub gemini_api_key: String,
    pub gemini_model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Hashing,
            dimensions: DEFAULT_HASHING_DIMENSIONS,
            gemini_api_key: String::new(),
            gemini_model: DEFAULT_GEMINI_EMBEDDING_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdvisorConfig {
    pub db_path: PathBuf,
    pub csv_path: PathBuf,
    pub collection_name: String,
    pub embedding: EmbeddingConfig,
    pub batch_size: usize,
    pub api_port: u16,
}

impl AdvisorConfig {
    /// Build configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok(), Path::new(CONTAINER_ROOT).exists())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// `in_container` selects `/app`-rooted default paths.
    pub fn from_lookup<F>(lookup: F, in_container: bool) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let root = if in_container {
            PathBuf::from(CONTAINER_ROOT)
        } else {
            PathBuf::from(".")
        };

        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let db_path = get("TRAVEL_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| root.join(DEFAULT_DB_DIR));
        let csv_path = get("TRAVEL_CSV_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| root.join(DEFAULT_CSV_FILE));
        let collection_name =
            get("TRAVEL_COLLECTION").unwrap_or_else(|| DEFAULT_COLLECTION.to_string());

        let provider = match get("EMBEDDING_PROVIDER") {
            Some(value) => value.parse()?,
            None => EmbeddingProvider::Hashing,
        };

        let embedding = EmbeddingConfig {
            provider,
            dimensions: parse_number(get("EMBEDDING_DIMENSIONS"), "EMBEDDING_DIMENSIONS")?
                .unwrap_or(DEFAULT_HASHING_DIMENSIONS),
            gemini_api_key: get("GEMINI_API_KEY").unwrap_or_default(),
            gemini_model: get("GEMINI_EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_GEMINI_EMBEDDING_MODEL.to_string()),
        };

        let batch_size = parse_number(get("SEED_BATCH_SIZE"), "SEED_BATCH_SIZE")?
            .unwrap_or(DEFAULT_BATCH_SIZE);

        let api_port = parse_number(get("PORT").or_else(|| get("API_PORT")), "PORT")?
            .unwrap_or(DEFAULT_API_PORT);

        let config = Self {
            db_path,
            csv_path,
            collection_name,
            embedding,
            batch_size,
            api_port,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(AdvisorError::Config(
                "SEED_BATCH_SIZE must be greater than zero".to_string(),
            ));
        }
        if self.embedding.dimensions == 0 {
            return Err(AdvisorError::Config(
                "EMBEDDING_DIMENSIONS must be greater than zero".to_string(),
            ));
        }
        if self.collection_name.trim().is_empty() {
            return Err(AdvisorError::Config(
                "TRAVEL_COLLECTION must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_number<T: FromStr>(value: Option<String>, key: &str) -> Result<Option<T>> {
    match value {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| AdvisorError::Config(format!("{} is not a valid number: '{}'", key, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_local_defaults() {
        let config = AdvisorConfig::from_lookup(lookup_from(&[]), false).unwrap();
        assert_eq!(config.db_path, PathBuf::from("./travel_chromadb"));
        assert_eq!(config.csv_path, PathBuf::from("./documents_rows.csv"));
        assert_eq!(config.collection_name, "travel_destinations");
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.embedding.provider, EmbeddingProvider::Hashing);
    }

    #[test]
    fn test_container_defaults() {
        let config = AdvisorConfig::from_lookup(lookup_from(&[]), true).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/app/travel_chromadb"));
        assert_eq!(config.csv_path, PathBuf::from("/app/documents_rows.csv"));
    }

    #[test]
    fn test_overrides() {
        let config = AdvisorConfig::from_lookup(
            lookup_from(&[
                ("TRAVEL_DB_PATH", "/data/db"),
                ("EMBEDDING_PROVIDER", "Gemini"),
                ("SEED_BATCH_SIZE", "25"),
                ("API_PORT", "9000"),
            ]),
            false,
        )
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/data/db"));
        assert_eq!(config.embedding.provider, EmbeddingProvider::Gemini);
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.api_port, 9000);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(AdvisorConfig::from_lookup(lookup_from(&[("SEED_BATCH_SIZE", "lots")]), false).is_err());
        assert!(AdvisorConfig::from_lookup(lookup_from(&[("SEED_BATCH_SIZE", "0")]), false).is_err());
        assert!(AdvisorConfig::from_lookup(lookup_from(&[("EMBEDDING_PROVIDER", "word2vec")]), false).is_err());
    }
}
