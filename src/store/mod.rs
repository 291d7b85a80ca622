//! Directory-backed vector store
//!
//! One SQLite file inside the store directory holds named collections of
//! `(id, document, metadata, embedding)` entries. Similarity search is an
//! exact cosine scan over an in-memory copy of the collection.

use crate::error::AdvisorError;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

mod filter;
pub use filter::MetadataFilter;

/// Database file created inside the store directory
pub const DB_FILE_NAME: &str = "travel.sqlite3";

pub fn database_file(dir: impl AsRef<Path>) -> PathBuf {
    dir.as_ref().join(DB_FILE_NAME)
}

/// Cosine similarity in [-1, 1]; 0 when either vector has no magnitude
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

//
// ================= Collection metadata =================
//

/// Parameters for creating a collection
#[derive(Debug, Clone)]
pub struct CollectionSpec {
    pub description: String,
    pub embedding_model: String,
    pub dimensions: usize,
    pub source_checksum: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionInfo {
    pub name: String,
    pub description: String,
    pub embedding_model: String,
    pub dimensions: usize,
    pub source_checksum: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CollectionInfo {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        let dimensions: i64 = row.try_get("dimensions")?;
        Ok(Self {
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            embedding_model: row.try_get("embedding_model")?,
            dimensions: dimensions.max(0) as usize,
            source_checksum: row.try_get("source_checksum")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

//
// ================= Entries =================
//

/// Entry to insert
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub id: String,
    pub document: String,
    pub metadata: Value,
    pub embedding: Vec<f32>,
}

/// Entry as read back (embedding omitted)
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StoredEntry {
    pub id: String,
    pub document: String,
    pub metadata: Value,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QueryMatch {
    pub id: String,
    pub document: String,
    pub metadata: Value,
    /// 1 - cosine similarity; lower is closer
    pub distance: f32,
}

#[derive(Debug)]
struct IndexedEntry {
    id: String,
    document: String,
    metadata: Value,
    embedding: Vec<f32>,
}

impl IndexedEntry {
    fn stored(&self) -> StoredEntry {
        StoredEntry {
            id: self.id.clone(),
            document: self.document.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

//
// ================= Store =================
//

pub struct VectorStore {
    pool: SqlitePool,
    root: PathBuf,
}

impl VectorStore {
    /// Open (creating if needed) the store rooted at `dir`
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let root = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;

        let options = SqliteConnectOptions::new()
            .filename(database_file(&root))
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self { pool, root };
        store.ensure_schema().await?;

        debug!(path = %store.root.display(), "Vector store opened");
        Ok(store)
    }

    /// Remove the store directory. Returns whether anything was deleted.
    pub async fn reset(dir: impl AsRef<Path>) -> Result<bool> {
        let dir = dir.as_ref();
        if !dir.exists() {
            return Ok(false);
        }
        tokio::fs::remove_dir_all(dir).await?;
        info!(path = %dir.display(), "Removed existing vector store");
        Ok(true)
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS collections (
              name TEXT PRIMARY KEY,
              description TEXT NOT NULL DEFAULT '',
              embedding_model TEXT NOT NULL,
              dimensions INTEGER NOT NULL,
              source_checksum TEXT,
              created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS embeddings (
              collection TEXT NOT NULL REFERENCES collections(name) ON DELETE CASCADE,
              id TEXT NOT NULL,
              document TEXT NOT NULL,
              metadata TEXT NOT NULL,
              embedding BLOB NOT NULL,
              PRIMARY KEY (collection, id)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_collection(&self, name: &str) -> Result<Option<Collection>> {
        let row = sqlx::query(
            "SELECT name, description, embedding_model, dimensions, source_checksum, created_at \
             FROM collections WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Collection::new(self.pool.clone(), CollectionInfo::from_row(&row)?))),
            None => Ok(None),
        }
    }

    pub async fn create_collection(&self, name: &str, spec: CollectionSpec) -> Result<Collection> {
        if spec.dimensions == 0 {
            return Err(AdvisorError::Store(
                "Collection dimensions must be greater than zero".to_string(),
            ));
        }

        let info = CollectionInfo {
            name: name.to_string(),
            description: spec.description,
            embedding_model: spec.embedding_model,
            dimensions: spec.dimensions,
            source_checksum: spec.source_checksum,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO collections (name, description, embedding_model, dimensions, source_checksum, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&info.name)
        .bind(&info.description)
        .bind(&info.embedding_model)
        .bind(info.dimensions as i64)
        .bind(&info.source_checksum)
        .bind(info.created_at)
        .execute(&self.pool)
        .await?;

        info!(collection = name, model = %info.embedding_model, "Created collection");
        Ok(Collection::new(self.pool.clone(), info))
    }

    pub async fn get_or_create_collection(&self, name: &str, spec: CollectionSpec) -> Result<Collection> {
        match self.get_collection(name).await? {
            Some(collection) => {
                debug!(collection = name, "Using existing collection");
                Ok(collection)
            }
            None => self.create_collection(name, spec).await,
        }
    }

    pub async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM embeddings WHERE collection = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM collections WHERE name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        if deleted.rows_affected() == 0 {
            return Err(AdvisorError::CollectionNotFound(name.to_string()));
        }
        info!(collection = name, "Deleted collection");
        Ok(())
    }

    pub async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let rows = sqlx::query(
            "SELECT name, description, embedding_model, dimensions, source_checksum, created_at \
             FROM collections ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(CollectionInfo::from_row).collect()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

//
// ================= Collection =================
//

/// Handle to one collection. Clones share the embedding cache.
#[derive(Clone)]
pub struct Collection {
    pool: SqlitePool,
    info: CollectionInfo,
    cache: Arc<RwLock<Option<Arc<Vec<IndexedEntry>>>>>,
}

impl Collection {
    fn new(pool: SqlitePool, info: CollectionInfo) -> Self {
        Self {
            pool,
            info,
            cache: Arc::new(RwLock::new(None)),
        }
    }

    pub fn info(&self) -> &CollectionInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn dimensions(&self) -> usize {
        self.info.dimensions
    }

    pub async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM embeddings WHERE collection = ?")
            .bind(&self.info.name)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as usize)
    }

    pub async fn set_source_checksum(&mut self, checksum: &str) -> Result<()> {
        sqlx::query("UPDATE collections SET source_checksum = ? WHERE name = ?")
            .bind(checksum)
            .bind(&self.info.name)
            .execute(&self.pool)
            .await?;
        self.info.source_checksum = Some(checksum.to_string());
        Ok(())
    }

    /// Insert entries atomically
    pub async fn add(&self, entries: &[NewEntry]) -> Result<usize> {
        for entry in entries {
            if entry.embedding.len() != self.info.dimensions {
                return Err(AdvisorError::DimensionMismatch {
                    expected: self.info.dimensions,
                    actual: entry.embedding.len(),
                });
            }
        }

        let mut tx = self.pool.begin().await?;
        for entry in entries {
            sqlx::query(
                "INSERT INTO embeddings (collection, id, document, metadata, embedding) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&self.info.name)
            .bind(&entry.id)
            .bind(&entry.document)
            .bind(serde_json::to_string(&entry.metadata)?)
            .bind(encode_embedding(&entry.embedding))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        *self.cache.write().await = None;
        Ok(entries.len())
    }

    pub async fn get(&self, id: &str) -> Result<Option<StoredEntry>> {
        let row = sqlx::query(
            "SELECT id, document, metadata FROM embeddings WHERE collection = ? AND id = ?",
        )
        .bind(&self.info.name)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let metadata: String = row.try_get("metadata")?;
                Ok(Some(StoredEntry {
                    id: row.try_get("id")?,
                    document: row.try_get("document")?,
                    metadata: serde_json::from_str(&metadata)?,
                }))
            }
            None => Ok(None),
        }
    }

    /// Nearest neighbours of `embedding`, closest first.
    ///
    /// The filter is applied before ranking, so up to `n_results` matching
    /// entries are returned.
    pub async fn query(
        &self,
        embedding: &[f32],
        n_results: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryMatch>> {
        if embedding.len() != self.info.dimensions {
            return Err(AdvisorError::DimensionMismatch {
                expected: self.info.dimensions,
                actual: embedding.len(),
            });
        }

        let entries = self.entries().await?;

        let mut matches: Vec<QueryMatch> = entries
            .iter()
            .filter(|e| filter.map_or(true, |f| f.matches(&e.metadata)))
            .map(|e| QueryMatch {
                id: e.id.clone(),
                document: e.document.clone(),
                metadata: e.metadata.clone(),
                distance: 1.0 - cosine_similarity(embedding, &e.embedding),
            })
            .collect();

        // Stable sort: equal distances keep insertion order
        matches.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
        matches.truncate(n_results);

        Ok(matches)
    }

    /// Entries whose metadata `key` equals `value`, ignoring case
    pub async fn find_by_field(&self, key: &str, value: &str) -> Result<Vec<StoredEntry>> {
        let needle = value.trim().to_lowercase();
        let entries = self.entries().await?;

        Ok(entries
            .iter()
            .filter(|e| {
                e.metadata
                    .get(key)
                    .and_then(Value::as_str)
                    .map_or(false, |v| v.trim().to_lowercase() == needle)
            })
            .map(IndexedEntry::stored)
            .collect())
    }

    /// All metadata objects in insertion order
    pub async fn metadatas(&self) -> Result<Vec<Value>> {
        let entries = self.entries().await?;
        Ok(entries.iter().map(|e| e.metadata.clone()).collect())
    }

    async fn entries(&self) -> Result<Arc<Vec<IndexedEntry>>> {
        if let Some(cached) = self.cache.read().await.as_ref() {
            return Ok(Arc::clone(cached));
        }

        let mut guard = self.cache.write().await;
        if let Some(cached) = guard.as_ref() {
            return Ok(Arc::clone(cached));
        }

        let rows = sqlx::query(
            "SELECT id, document, metadata, embedding FROM embeddings \
             WHERE collection = ? ORDER BY rowid",
        )
        .bind(&self.info.name)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let metadata: String = row.try_get("metadata")?;
            let embedding: Vec<u8> = row.try_get("embedding")?;
            entries.push(IndexedEntry {
                id: row.try_get("id")?,
                document: row.try_get("document")?,
                metadata: serde_json::from_str(&metadata)?,
                embedding: decode_embedding(&embedding),
            });
        }

        debug!(collection = %self.info.name, count = entries.len(), "Loaded collection into memory");

        let entries = Arc::new(entries);
        *guard = Some(Arc::clone(&entries));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn spec(dimensions: usize) -> CollectionSpec {
        CollectionSpec {
            description: "test".to_string(),
            embedding_model: "unit".to_string(),
            dimensions,
            source_checksum: None,
        }
    }

    fn entry(id: &str, country: &str, embedding: Vec<f32>) -> NewEntry {
        NewEntry {
            id: id.to_string(),
            document: format!("doc {}", id),
            metadata: json!({ "destination": id, "country": country }),
            embedding,
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_embedding_blob_roundtrip() {
        let v = vec![0.25f32, -1.5, 3.0];
        assert_eq!(decode_embedding(&encode_embedding(&v)), v);
    }

    #[tokio::test]
    async fn test_query_orders_by_distance() {
        let dir = TempDir::new().unwrap();
        let store = VectorStore::open(dir.path()).await.unwrap();
        let collection = store.create_collection("places", spec(2)).await.unwrap();

        collection
            .add(&[
                entry("north", "A", vec![0.0, 1.0]),
                entry("east", "B", vec![1.0, 0.0]),
                entry("northeast", "A", vec![0.7, 0.7]),
            ])
            .await
            .unwrap();

        let results = collection.query(&[1.0, 0.1], 2, None).await.unwrap();
        let ids: Vec<_> = results.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["east", "northeast"]);
        assert!(results[0].distance <= results[1].distance);
    }

    #[tokio::test]
    async fn test_filter_applies_before_ranking() {
        let dir = TempDir::new().unwrap();
        let store = VectorStore::open(dir.path()).await.unwrap();
        let collection = store.create_collection("places", spec(2)).await.unwrap();

        collection
            .add(&[
                entry("near", "France", vec![1.0, 0.0]),
                entry("far", "Japan", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let filter = MetadataFilter::new().contains("country", "japan");
        let results = collection.query(&[1.0, 0.0], 1, Some(&filter)).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "far");
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let dir = TempDir::new().unwrap();
        let store = VectorStore::open(dir.path()).await.unwrap();
        let collection = store.create_collection("places", spec(3)).await.unwrap();

        let err = collection.add(&[entry("x", "A", vec![1.0])]).await.unwrap_err();
        assert!(matches!(err, AdvisorError::DimensionMismatch { expected: 3, actual: 1 }));

        let err = collection.query(&[1.0], 1, None).await.unwrap_err();
        assert!(matches!(err, AdvisorError::DimensionMismatch { .. }));
        assert_eq!(collection.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_ids_roll_back_batch() {
        let dir = TempDir::new().unwrap();
        let store = VectorStore::open(dir.path()).await.unwrap();
        let collection = store.create_collection("places", spec(2)).await.unwrap();

        let result = collection
            .add(&[entry("a", "A", vec![1.0, 0.0]), entry("a", "A", vec![0.0, 1.0])])
            .await;
        assert!(result.is_err());
        assert_eq!(collection.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = VectorStore::open(dir.path()).await.unwrap();
            let collection = store.create_collection("places", spec(2)).await.unwrap();
            collection.add(&[entry("kept", "A", vec![1.0, 0.0])]).await.unwrap();
            store.close().await;
        }

        assert!(database_file(dir.path()).exists());

        let store = VectorStore::open(dir.path()).await.unwrap();
        let collection = store.get_collection("places").await.unwrap().unwrap();
        assert_eq!(collection.count().await.unwrap(), 1);
        assert_eq!(collection.dimensions(), 2);

        let stored = collection.get("kept").await.unwrap().unwrap();
        assert_eq!(stored.metadata["country"], "A");
        assert!(store.get_collection("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cache_invalidated_on_add() {
        let dir = TempDir::new().unwrap();
        let store = VectorStore::open(dir.path()).await.unwrap();
        let collection = store.create_collection("places", spec(2)).await.unwrap();

        collection.add(&[entry("first", "A", vec![1.0, 0.0])]).await.unwrap();
        assert_eq!(collection.metadatas().await.unwrap().len(), 1);

        collection.add(&[entry("second", "B", vec![0.0, 1.0])]).await.unwrap();
        assert_eq!(collection.metadatas().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_find_by_field_ignores_case() {
        let dir = TempDir::new().unwrap();
        let store = VectorStore::open(dir.path()).await.unwrap();
        let collection = store.create_collection("places", spec(2)).await.unwrap();
        collection.add(&[entry("Paris", "France", vec![1.0, 0.0])]).await.unwrap();

        let found = collection.find_by_field("destination", "  paris ").await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(collection.find_by_field("destination", "Par").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_and_reset() {
        let dir = TempDir::new().unwrap();
        let db_dir = dir.path().join("db");
        let store = VectorStore::open(&db_dir).await.unwrap();
        store.create_collection("places", spec(2)).await.unwrap();
        assert_eq!(store.list_collections().await.unwrap().len(), 1);

        store.delete_collection("places").await.unwrap();
        assert!(store.list_collections().await.unwrap().is_empty());
        assert!(matches!(
            store.delete_collection("places").await,
            Err(AdvisorError::CollectionNotFound(_))
        ));
        store.close().await;

        assert!(VectorStore::reset(&db_dir).await.unwrap());
        assert!(!db_dir.exists());
        assert!(!VectorStore::reset(&db_dir).await.unwrap());
    }
}
