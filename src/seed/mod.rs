//! Guarded one-time population of the destination store
//!
//! Seeding only writes when the target collection is empty. Embedding runs
//! batch by batch; the insert is a single transaction so a failed run
//! never leaves a half-filled collection behind to be mistaken for a seeded
//! one.

use crate::catalog;
use crate::config::AdvisorConfig;
use crate::embedding::Embedder;
use crate::error::AdvisorError;
use crate::store::{database_file, CollectionSpec, NewEntry, VectorStore};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

pub const COLLECTION_DESCRIPTION: &str = "Travel destinations with embeddings";

#[derive(Debug, Clone)]
pub struct SeedOptions {
    pub db_path: PathBuf,
    pub csv_path: PathBuf,
    pub collection_name: String,
    pub batch_size: usize,
    /// Wipe the store directory before seeding
    pub reset: bool,
}

impl From<&AdvisorConfig> for SeedOptions {
    fn from(config: &AdvisorConfig) -> Self {
        Self {
            db_path: config.db_path.clone(),
            csv_path: config.csv_path.clone(),
            collection_name: config.collection_name.clone(),
            batch_size: config.batch_size,
            reset: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SeedOutcome {
    AlreadySeeded { count: usize },
    Seeded { inserted: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct SeedReport {
    pub run_id: Uuid,
    pub outcome: SeedOutcome,
    pub collection: String,
    pub db_path: PathBuf,
    pub embedding_model: String,
    pub source_checksum: Option<String>,
    pub elapsed_ms: u64,
    pub finished_at: DateTime<Utc>,
}

pub struct Seeder {
    options: SeedOptions,
    embedder: Arc<dyn Embedder>,
}

impl Seeder {
    pub fn new(options: SeedOptions, embedder: Arc<dyn Embedder>) -> Self {
        Self { options, embedder }
    }

    pub fn options(&self) -> &SeedOptions {
        &self.options
    }

    pub async fn run(&self) -> Result<SeedReport> {
        let start = Instant::now();
        let run_id = Uuid::new_v4();
        let opts = &self.options;

        if opts.batch_size == 0 {
            return Err(AdvisorError::Config("Seed batch size must be greater than zero".to_string()));
        }

        info!(%run_id, db_path = %opts.db_path.display(), "Starting destination seeding");

        if !opts.reset {
            if let Some(count) = populated_count(&opts.db_path, &opts.collection_name).await? {
                info!(count, "Vector store already contains destinations. Skipping seeding.");
                return Ok(self.report(run_id, SeedOutcome::AlreadySeeded { count }, None, start));
            }
        }

        // The CSV must be readable before an existing store is wiped
        if !opts.csv_path.exists() {
            return Err(AdvisorError::CsvNotFound(opts.csv_path.clone()));
        }
        let checksum = file_checksum(&opts.csv_path)?;

        if opts.reset {
            self.clear_existing().await?;
        }

        let store = VectorStore::open(&opts.db_path).await?;
        let result = self.populate(&store, &checksum).await;
        store.close().await;

        let outcome = result?;
        let report = self.report(run_id, outcome, Some(checksum), start);
        info!(
            %run_id,
            outcome = ?report.outcome,
            elapsed_ms = report.elapsed_ms,
            "Destination seeding completed"
        );
        Ok(report)
    }

    /// Drop the target collection inside the store, so a service reading the
    /// same store re-attaches to the reseeded one. A store that cannot be
    /// read is removed from disk instead.
    async fn clear_existing(&self) -> Result<()> {
        let opts = &self.options;
        if !database_file(&opts.db_path).exists() {
            return VectorStore::reset(&opts.db_path).await.map(|_| ());
        }

        let dropped: Result<()> = async {
            let store = VectorStore::open(&opts.db_path).await?;
            let result = match store.get_collection(&opts.collection_name).await? {
                Some(_) => store.delete_collection(&opts.collection_name).await,
                None => Ok(()),
            };
            store.close().await;
            result
        }
        .await;

        match dropped {
            Ok(()) => {
                info!(collection = %opts.collection_name, "Dropped existing collection for reseed");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Existing store is unreadable; removing it");
                VectorStore::reset(&opts.db_path).await.map(|_| ())
            }
        }
    }

    async fn populate(&self, store: &VectorStore, checksum: &str) -> Result<SeedOutcome> {
        let opts = &self.options;
        let spec = CollectionSpec {
            description: COLLECTION_DESCRIPTION.to_string(),
            embedding_model: self.embedder.model_name().to_string(),
            dimensions: self.embedder.dimensions(),
            source_checksum: Some(checksum.to_string()),
        };

        let mut collection = store.get_or_create_collection(&opts.collection_name, spec.clone()).await?;

        // Re-checked under the open store: another process may have seeded meanwhile
        let existing = collection.count().await?;
        if existing > 0 {
            info!(count = existing, "Collection already populated. Skipping seeding.");
            return Ok(SeedOutcome::AlreadySeeded { count: existing });
        }

        let info = collection.info();
        if info.embedding_model != spec.embedding_model || info.dimensions != spec.dimensions {
            warn!(
                stored = %info.embedding_model,
                requested = %spec.embedding_model,
                "Empty collection was created with another embedder; recreating"
            );
            store.delete_collection(&opts.collection_name).await?;
            collection = store.create_collection(&opts.collection_name, spec).await?;
        } else {
            collection.set_source_checksum(checksum).await?;
        }

        let records = catalog::load_destinations(&opts.csv_path)?;
        if records.is_empty() {
            return Err(AdvisorError::EmptyCatalog(opts.csv_path.clone()));
        }
        info!(count = records.len(), "Embedding destinations");

        let mut entries = Vec::with_capacity(records.len());
        for (batch_index, batch) in records.chunks(opts.batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|r| r.document_text.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;

            if embeddings.len() != batch.len() {
                return Err(AdvisorError::Embedding(format!(
                    "Embedder returned {} vectors for {} documents",
                    embeddings.len(),
                    batch.len()
                )));
            }

            for (record, embedding) in batch.iter().zip(embeddings) {
                entries.push(NewEntry {
                    id: format!("dest_{}", entries.len() + 1),
                    document: record.document_text.clone(),
                    metadata: serde_json::to_value(&record.destination)?,
                    embedding,
                });
            }

            info!(batch = batch_index + 1, size = batch.len(), "Embedded batch");
        }

        let inserted = collection.add(&entries).await?;
        info!(inserted, collection = %opts.collection_name, "Added destinations to vector store");

        Ok(SeedOutcome::Seeded { inserted })
    }

    fn report(
        &self,
        run_id: Uuid,
        outcome: SeedOutcome,
        source_checksum: Option<String>,
        start: Instant,
    ) -> SeedReport {
        SeedReport {
            run_id,
            outcome,
            collection: self.options.collection_name.clone(),
            db_path: self.options.db_path.clone(),
            embedding_model: self.embedder.model_name().to_string(),
            source_checksum,
            elapsed_ms: start.elapsed().as_millis() as u64,
            finished_at: Utc::now(),
        }
    }
}

/// Entry count of a non-empty collection, without creating anything on disk
async fn populated_count(dir: &Path, collection: &str) -> Result<Option<usize>> {
    if !database_file(dir).exists() {
        return Ok(None);
    }

    let store = VectorStore::open(dir).await?;
    let count = match store.get_collection(collection).await? {
        Some(c) => c.count().await?,
        None => 0,
    };
    store.close().await;

    Ok((count > 0).then_some(count))
}

/// Whether the store at `dir` already holds destinations in `collection`
pub async fn store_is_populated(dir: impl AsRef<Path>, collection: &str) -> Result<bool> {
    Ok(populated_count(dir.as_ref(), collection).await?.is_some())
}

/// SHA-256 of a file, hex encoded. Streams the file into the hasher.
pub fn file_checksum(path: impl AsRef<Path>) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
