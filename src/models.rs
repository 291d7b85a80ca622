//! Core data models for the destination store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

//
// ================= Destination =================
//

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Destination {
    pub destination: String,
    #[serde(default)]
    pub description: String,
    /// Attractions
    #[serde(default)]
    pub famous_for: Vec<String>,
    /// Activities
    #[serde(default)]
    pub unique_offerings: Vec<String>,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub country: String,
    /// Cultural notes and anything else that did not fit elsewhere
    #[serde(default)]
    pub other_characteristics: String,
    #[serde(default)]
    pub best_time_to_travel: String,
}

/// A destination as loaded from the catalog, with the text that gets embedded
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DestinationRecord {
    #[serde(flatten)]
    pub destination: Destination,
    pub document_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DestinationMatch {
    #[serde(flatten)]
    pub destination: Destination,
    /// 1 - cosine distance
    pub similarity_score: f32,
}

//
// ================= Search =================
//

pub const DEFAULT_SEARCH_RESULTS: usize = 5;
pub const DEFAULT_CRITERIA_RESULTS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchCriteria {
    pub country: Option<String>,
    pub region: Option<String>,
    /// e.g. "beach", "cultural", "adventure"
    pub activity_type: Option<String>,
    pub best_time: Option<String>,
    #[serde(default = "default_criteria_results")]
    pub n_results: usize,
}

fn default_criteria_results() -> usize {
    DEFAULT_CRITERIA_RESULTS
}

impl Default for SearchCriteria {
    fn default() -> Self {
        Self {
            country: None,
            region: None,
            activity_type: None,
            best_time: None,
            n_results: DEFAULT_CRITERIA_RESULTS,
        }
    }
}

impl SearchCriteria {
    pub fn is_empty(&self) -> bool {
        [&self.country, &self.region, &self.activity_type, &self.best_time]
            .iter()
            .all(|v| v.as_deref().map_or(true, |s| s.trim().is_empty()))
    }
}

//
// ================= Stats =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseStats {
    pub total_destinations: usize,
    pub unique_countries: usize,
    pub unique_regions: usize,
    pub sample_countries: Vec<String>,
    pub sample_regions: Vec<String>,
    pub database_path: PathBuf,
    pub embedding_model: String,
    pub source_checksum: Option<String>,
    pub seeded_at: Option<DateTime<Utc>>,
}

//
// ================= Tool I/O =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInput {
    pub tool_name: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub message: String,
    pub data: serde_json::Value,
    pub error: Option<String>,
}

impl ToolOutput {
    pub fn ok(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            error: None,
        }
    }

    pub fn unavailable(message: impl Into<String>, data: serde_json::Value) -> Self {
        let message = message.into();
        Self {
            success: false,
            error: Some(message.clone()),
            message,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_serializes_flat() {
        let m = DestinationMatch {
            destination: Destination {
                destination: "Kyoto".to_string(),
                country: "Japan".to_string(),
                ..Default::default()
            },
            similarity_score: 0.8,
        };
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["destination"], "Kyoto");
        assert_eq!(json["country"], "Japan");
        assert!(json.get("similarity_score").is_some());
    }

    #[test]
    fn test_criteria_defaults() {
        let criteria: SearchCriteria = serde_json::from_str(r#"{"country": "Italy"}"#).unwrap();
        assert_eq!(criteria.n_results, DEFAULT_CRITERIA_RESULTS);
        assert!(!criteria.is_empty());
        assert!(SearchCriteria::default().is_empty());
    }
}
