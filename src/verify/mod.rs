//! On-disk store verification
//!
//! Inspects the store directory without modifying it and runs a handful of
//! smoke queries against a live search service.

use crate::search::DestinationSearch;
use crate::store::{database_file, VectorStore};
use crate::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const SMOKE_QUERIES: &[&str] = &[
    "beach destinations",
    "cultural cities in Europe",
    "adventure travel",
    "romantic getaways",
];

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StoreReport {
    pub db_path: PathBuf,
    pub directory_exists: bool,
    pub database_file_exists: bool,
    pub size_bytes: u64,
    pub collection: String,
    pub collection_exists: bool,
    pub entry_count: usize,
    pub embedding_model: Option<String>,
}

impl StoreReport {
    pub fn is_ready(&self) -> bool {
        self.directory_exists
            && self.database_file_exists
            && self.collection_exists
            && self.entry_count > 0
    }

    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Inspect the store at `dir`
pub async fn verify_store(dir: impl AsRef<Path>, collection: &str) -> Result<StoreReport> {
    let dir = dir.as_ref();

    let mut report = StoreReport {
        db_path: dir.to_path_buf(),
        directory_exists: dir.is_dir(),
        database_file_exists: database_file(dir).is_file(),
        size_bytes: 0,
        collection: collection.to_string(),
        collection_exists: false,
        entry_count: 0,
        embedding_model: None,
    };

    if !report.directory_exists {
        warn!(path = %dir.display(), "Vector store directory not found");
        return Ok(report);
    }
    report.size_bytes = directory_size(dir)?;

    if !report.database_file_exists {
        warn!(path = %dir.display(), "Vector store database file not found");
        return Ok(report);
    }

    let store = VectorStore::open(dir).await?;
    if let Some(c) = store.get_collection(collection).await? {
        report.collection_exists = true;
        report.entry_count = c.count().await?;
        report.embedding_model = Some(c.info().embedding_model.clone());
    }
    store.close().await;

    info!(
        ready = report.is_ready(),
        entries = report.entry_count,
        size_mb = report.size_mb(),
        "Vector store verified"
    );
    Ok(report)
}

fn directory_size(dir: &Path) -> Result<u64> {
    let mut total = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        total += if metadata.is_dir() {
            directory_size(&entry.path())?
        } else {
            metadata.len()
        };
    }
    Ok(total)
}

#[derive(Debug, Clone, Serialize)]
pub struct SmokeQueryResult {
    pub query: String,
    pub results: usize,
    pub top_destination: Option<String>,
}

/// Run the sample queries; each asks for 3 results
pub async fn run_smoke_queries(search: &DestinationSearch) -> Result<Vec<SmokeQueryResult>> {
    let mut results = Vec::with_capacity(SMOKE_QUERIES.len());

    for query in SMOKE_QUERIES {
        let matches = search.search(query, 3).await?;
        results.push(SmokeQueryResult {
            query: query.to_string(),
            results: matches.len(),
            top_destination: matches.first().map(|m| m.destination.destination.clone()),
        });
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use crate::seed::{SeedOptions, Seeder};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_directory() {
        let dir = TempDir::new().unwrap();
        let report = verify_store(dir.path().join("absent"), "travel_destinations")
            .await
            .unwrap();
        assert!(!report.directory_exists);
        assert!(!report.is_ready());
    }

    #[tokio::test]
    async fn test_seeded_store_is_ready() {
        let dir = TempDir::new().unwrap();
        let csv_path = dir.path().join("rows.csv");
        std::fs::write(&csv_path, "destination,country\nOslo,Norway\nBergen,Norway\n").unwrap();

        let options = SeedOptions {
            db_path: dir.path().join("db"),
            csv_path,
            collection_name: "travel_destinations".to_string(),
            batch_size: 10,
            reset: false,
        };
        let embedder = Arc::new(HashingEmbedder::new(16));
        Seeder::new(options.clone(), embedder.clone()).run().await.unwrap();

        let report = verify_store(&options.db_path, "travel_destinations").await.unwrap();
        assert!(report.is_ready());
        assert_eq!(report.entry_count, 2);
        assert!(report.size_bytes > 0);
        assert_eq!(report.embedding_model.as_deref(), Some("hashing-16"));

        let search = DestinationSearch::open(&options.db_path, "travel_destinations", embedder)
            .await
            .unwrap();
        let smoke = run_smoke_queries(&search).await.unwrap();
        assert_eq!(smoke.len(), SMOKE_QUERIES.len());
        assert!(smoke.iter().all(|r| r.results == 2));
    }
}
