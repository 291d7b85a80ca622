//! Destination search service
//!
//! Semantic search, name lookup, criteria search and statistics over the
//! seeded collection. Shared by the agent tools and the HTTP API.

use crate::embedding::Embedder;
use crate::error::AdvisorError;
use crate::models::{DatabaseStats, Destination, DestinationMatch, SearchCriteria};
use crate::store::{Collection, MetadataFilter, QueryMatch, VectorStore};
use crate::Result;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Neighbours inspected when resolving a name semantically
const NAME_CANDIDATES: usize = 10;
const SAMPLE_LIMIT: usize = 10;

const ACTIVITY_FIELDS: &[&str] = &[
    "famous_for",
    "unique_offerings",
    "other_characteristics",
    "description",
];

pub struct DestinationSearch {
    store: VectorStore,
    collection_name: String,
    /// Collection currently served; replaced when the stored one is recreated
    attached: RwLock<Option<Collection>>,
    embedder: Arc<dyn Embedder>,
}

impl DestinationSearch {
    /// Open the store at `db_path`. The collection is resolved on first use,
    /// so a service may start before seeding has finished.
    pub async fn open(
        db_path: impl AsRef<Path>,
        collection_name: &str,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let store = VectorStore::open(db_path).await?;
        Ok(Self {
            store,
            collection_name: collection_name.to_string(),
            attached: RwLock::new(None),
            embedder,
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.store.path().to_path_buf()
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    pub fn embedding_model(&self) -> &str {
        self.embedder.model_name()
    }

    /// Current collection handle. A collection recreated since it was
    /// attached (a reseed) is re-attached with a fresh entry cache and its
    /// embedder is checked again.
    async fn collection(&self) -> Result<Collection> {
        let current = self
            .store
            .get_collection(&self.collection_name)
            .await?
            .ok_or_else(|| AdvisorError::CollectionNotFound(self.collection_name.clone()))?;

        if let Some(attached) = self.attached.read().await.as_ref() {
            if attached.info().created_at == current.info().created_at {
                return Ok(attached.clone());
            }
        }

        let stored = &current.info().embedding_model;
        if stored != self.embedder.model_name() {
            return Err(AdvisorError::EmbeddingModelMismatch {
                stored: stored.clone(),
                requested: self.embedder.model_name().to_string(),
            });
        }

        let mut attached = self.attached.write().await;
        if attached.is_some() {
            info!(collection = %current.name(), "Destination collection was recreated; re-attached");
        } else {
            info!(collection = %current.name(), "Destination collection attached");
        }
        *attached = Some(current.clone());
        Ok(current)
    }

    /// Collection handle that refuses to serve an empty store
    async fn populated(&self) -> Result<(Collection, usize)> {
        let collection = self.collection().await?;
        let count = collection.count().await?;
        if count == 0 {
            return Err(AdvisorError::StoreEmpty);
        }
        Ok((collection, count))
    }

    pub async fn count(&self) -> Result<usize> {
        self.collection().await?.count().await
    }

    /// Semantic nearest-neighbour search
    pub async fn search(&self, query: &str, n_results: usize) -> Result<Vec<DestinationMatch>> {
        let (collection, _) = self.populated().await?;
        let embedding = self.embedder.embed(query).await?;
        let matches = collection.query(&embedding, n_results, None).await?;

        debug!(query, results = matches.len(), "Destination search");
        matches.into_iter().map(to_destination_match).collect()
    }

    /// Exact (case-insensitive) name match first, then the closest
    /// neighbour whose name overlaps the requested one.
    pub async fn get_by_name(&self, name: &str) -> Result<Option<DestinationMatch>> {
        let (collection, _) = self.populated().await?;
        let wanted = name.trim().to_lowercase();
        if wanted.is_empty() {
            return Ok(None);
        }

        if let Some(entry) = collection.find_by_field("destination", &wanted).await?.into_iter().next() {
            return Ok(Some(DestinationMatch {
                destination: to_destination(entry.metadata)?,
                similarity_score: 1.0,
            }));
        }

        let embedding = self.embedder.embed(name).await?;
        let candidates = collection.query(&embedding, NAME_CANDIDATES, None).await?;

        // Candidates arrive closest first, so the first overlap is the best score
        for candidate in candidates {
            let found = destination_name(&candidate.metadata).to_lowercase();
            if !found.is_empty() && (found.contains(&wanted) || wanted.contains(&found)) {
                return to_destination_match(candidate).map(Some);
            }
        }

        Ok(None)
    }

    /// Filtered search. Country, region and best time are substring filters;
    /// the activity type is looked up across the descriptive fields.
    pub async fn search_by_criteria(&self, criteria: &SearchCriteria) -> Result<Vec<DestinationMatch>> {
        let (collection, _) = self.populated().await?;

        let mut filter = MetadataFilter::new();
        if let Some(country) = &criteria.country {
            filter = filter.contains("country", country);
        }
        if let Some(region) = &criteria.region {
            filter = filter.contains("region", region);
        }
        if let Some(best_time) = &criteria.best_time {
            filter = filter.contains("best_time_to_travel", best_time);
        }
        if let Some(activity) = &criteria.activity_type {
            filter = filter.contains_any(ACTIVITY_FIELDS, activity);
        }

        let query = criteria_query(criteria);
        let embedding = self.embedder.embed(&query).await?;
        let matches = collection
            .query(&embedding, criteria.n_results, (!filter.is_empty()).then_some(&filter))
            .await?;

        debug!(query = %query, results = matches.len(), "Criteria search");
        matches.into_iter().map(to_destination_match).collect()
    }

    pub async fn stats(&self) -> Result<DatabaseStats> {
        let collection = self.collection().await?;
        let metadatas = collection.metadatas().await?;

        let mut countries = BTreeSet::new();
        let mut regions = BTreeSet::new();
        for metadata in &metadatas {
            if let Some(country) = non_empty_str(metadata, "country") {
                countries.insert(country.to_string());
            }
            if let Some(region) = non_empty_str(metadata, "region") {
                regions.insert(region.to_string());
            }
        }

        let info = collection.info();
        Ok(DatabaseStats {
            total_destinations: metadatas.len(),
            unique_countries: countries.len(),
            unique_regions: regions.len(),
            sample_countries: countries.into_iter().take(SAMPLE_LIMIT).collect(),
            sample_regions: regions.into_iter().take(SAMPLE_LIMIT).collect(),
            database_path: self.db_path(),
            embedding_model: info.embedding_model.clone(),
            source_checksum: info.source_checksum.clone(),
            seeded_at: (!metadatas.is_empty()).then_some(info.created_at),
        })
    }
}

/// Text embedded for a criteria search
pub fn criteria_query(criteria: &SearchCriteria) -> String {
    if criteria.is_empty() {
        return "travel destinations".to_string();
    }

    let present = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);

    let mut parts = Vec::new();
    if let Some(country) = present(&criteria.country) {
        parts.push(format!("country {}", country));
    }
    if let Some(region) = present(&criteria.region) {
        parts.push(format!("region {}", region));
    }
    if let Some(activity) = present(&criteria.activity_type) {
        parts.push(format!("{} activities", activity));
    }
    if let Some(best_time) = present(&criteria.best_time) {
        parts.push(format!("best time {}", best_time));
    }

    parts.join(" ")
}

fn non_empty_str<'a>(metadata: &'a Value, key: &str) -> Option<&'a str> {
    metadata
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn destination_name(metadata: &Value) -> &str {
    non_empty_str(metadata, "destination").unwrap_or_default()
}

fn to_destination(metadata: Value) -> Result<Destination> {
    Ok(serde_json::from_value(metadata)?)
}

fn to_destination_match(m: QueryMatch) -> Result<DestinationMatch> {
    Ok(DestinationMatch {
        similarity_score: 1.0 - m.distance,
        destination: to_destination(m.metadata)?,
    })
}
