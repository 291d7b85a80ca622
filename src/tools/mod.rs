//! Tool trait and registry
//!
//! Tools are what the advisory agents call to reach the destination store.
//! Every tool reads only; an unseeded store is reported as an unsuccessful
//! output rather than an error so the agent can relay it.

use crate::error::AdvisorError;
use crate::models::{SearchCriteria, ToolInput, ToolOutput, DEFAULT_CRITERIA_RESULTS, DEFAULT_SEARCH_RESULTS};
use crate::search::DestinationSearch;
use crate::Result;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Trait for a single tool
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput>;
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
}

/// Tool registry for looking up and executing tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn describe(&self) -> Vec<ToolDescriptor> {
        self.list()
            .into_iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| ToolDescriptor {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
            })
            .collect()
    }

    /// Look up `name` and run it with `parameters`
    pub async fn invoke(&self, name: &str, parameters: Value) -> Result<ToolOutput> {
        let tool = self
            .get(name)
            .ok_or_else(|| AdvisorError::ToolNotFound(name.to_string()))?;

        let input = ToolInput {
            tool_name: name.to_string(),
            parameters,
        };
        tool.execute(&input).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

//
// ================= Parameter helpers =================
//

fn ensure_object_parameters(input: &ToolInput) -> Result<()> {
    if input.parameters.is_object() || input.parameters.is_null() {
        Ok(())
    } else {
        Err(AdvisorError::InvalidToolInput(
            "tool_input must be a JSON object".to_string(),
        ))
    }
}

fn optional_str<'a>(input: &'a ToolInput, key: &str) -> Option<&'a str> {
    input
        .parameters
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn require_str<'a>(input: &'a ToolInput, key: &str, alias: &str) -> Result<&'a str> {
    optional_str(input, key)
        .or_else(|| optional_str(input, alias))
        .ok_or_else(|| {
            AdvisorError::InvalidToolInput(format!("Expected '{}' in tool_input", key))
        })
}

fn n_results(input: &ToolInput, default: usize) -> Result<usize> {
    match input.parameters.get("n_results") {
        None | Some(Value::Null) => Ok(default),
        Some(value) => match value.as_u64() {
            Some(n) if n > 0 => Ok(n as usize),
            _ => Err(AdvisorError::InvalidToolInput(
                "'n_results' must be a positive integer".to_string(),
            )),
        },
    }
}

/// Turn "store not ready" into an unsuccessful output the agent can relay
fn store_unavailable(err: AdvisorError, empty_data: Value) -> Result<ToolOutput> {
    match err {
        AdvisorError::CollectionNotFound(_) => Ok(ToolOutput::unavailable(
            "Travel vector database not available. Please run the seeding step first.",
            empty_data,
        )),
        AdvisorError::StoreEmpty => Ok(ToolOutput::unavailable(
            "No destinations found in database. Please run the seeding step to populate the database.",
            empty_data,
        )),
        other => Err(other),
    }
}

//
// ================= Destination tools =================
//

pub struct SearchDestinationsTool {
    search: Arc<DestinationSearch>,
}

impl SearchDestinationsTool {
    pub fn new(search: Arc<DestinationSearch>) -> Self {
        Self { search }
    }
}

#[async_trait::async_trait]
impl Tool for SearchDestinationsTool {
    fn name(&self) -> &'static str {
        "search_destinations"
    }

    fn description(&self) -> &'static str {
        "Semantic search for travel destinations (e.g. \"beach destinations\", \"cultural cities\")"
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        ensure_object_parameters(input)?;
        let query = require_str(input, "query", "text")?;
        let limit = n_results(input, DEFAULT_SEARCH_RESULTS)?;

        let destinations = match self.search.search(query, limit).await {
            Ok(found) => found,
            Err(e) => return store_unavailable(e, json!({ "destinations": [] })),
        };
        let total = self.search.count().await?;

        Ok(ToolOutput::ok(
            format!("Found {} destinations matching '{}'", destinations.len(), query),
            json!({
                "destinations": destinations,
                "query": query,
                "total_in_db": total,
            }),
        ))
    }
}

pub struct GetDestinationByNameTool {
    search: Arc<DestinationSearch>,
}

impl GetDestinationByNameTool {
    pub fn new(search: Arc<DestinationSearch>) -> Self {
        Self { search }
    }
}

#[async_trait::async_trait]
impl Tool for GetDestinationByNameTool {
    fn name(&self) -> &'static str {
        "get_destination_by_name"
    }

    fn description(&self) -> &'static str {
        "Get detailed information about a specific destination by name"
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        ensure_object_parameters(input)?;
        let name = require_str(input, "destination_name", "name")?;

        match self.search.get_by_name(name).await {
            Ok(Some(found)) => Ok(ToolOutput::ok(
                format!("Found destination: {}", found.destination.destination),
                json!({ "destination": found }),
            )),
            Ok(None) => Ok(ToolOutput::unavailable(
                format!("Destination '{}' not found in database", name),
                json!({ "destination": null }),
            )),
            Err(e) => store_unavailable(e, json!({ "destination": null })),
        }
    }
}

pub struct SearchByCriteriaTool {
    search: Arc<DestinationSearch>,
}

impl SearchByCriteriaTool {
    pub fn new(search: Arc<DestinationSearch>) -> Self {
        Self { search }
    }
}

#[async_trait::async_trait]
impl Tool for SearchByCriteriaTool {
    fn name(&self) -> &'static str {
        "search_destinations_by_criteria"
    }

    fn description(&self) -> &'static str {
        "Search destinations by country, region, activity type and best travel time"
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        ensure_object_parameters(input)?;

        let criteria = SearchCriteria {
            country: optional_str(input, "country").map(str::to_string),
            region: optional_str(input, "region").map(str::to_string),
            activity_type: optional_str(input, "activity_type").map(str::to_string),
            best_time: optional_str(input, "best_time").map(str::to_string),
            n_results: n_results(input, DEFAULT_CRITERIA_RESULTS)?,
        };

        let destinations = match self.search.search_by_criteria(&criteria).await {
            Ok(found) => found,
            Err(e) => return store_unavailable(e, json!({ "destinations": [] })),
        };
        let total = self.search.count().await?;

        Ok(ToolOutput::ok(
            format!("Found {} destinations matching criteria", destinations.len()),
            json!({
                "destinations": destinations,
                "search_criteria": {
                    "country": criteria.country,
                    "region": criteria.region,
                    "activity_type": criteria.activity_type,
                    "best_time": criteria.best_time,
                },
                "total_in_db": total,
            }),
        ))
    }
}

pub struct DatabaseStatsTool {
    search: Arc<DestinationSearch>,
}

impl DatabaseStatsTool {
    pub fn new(search: Arc<DestinationSearch>) -> Self {
        Self { search }
    }
}

#[async_trait::async_trait]
impl Tool for DatabaseStatsTool {
    fn name(&self) -> &'static str {
        "get_database_stats"
    }

    fn description(&self) -> &'static str {
        "Statistics about the travel destination database"
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        ensure_object_parameters(input)?;

        match self.search.stats().await {
            Ok(stats) => Ok(ToolOutput::ok(
                format!("Database contains {} destinations", stats.total_destinations),
                json!({ "stats": stats }),
            )),
            Err(e) => store_unavailable(e, json!({ "stats": null })),
        }
    }
}

/// Registry with every destination tool wired to `search`
pub fn create_destination_registry(search: Arc<DestinationSearch>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(SearchDestinationsTool::new(search.clone())));
    registry.register(Arc::new(GetDestinationByNameTool::new(search.clone())));
    registry.register(Arc::new(SearchByCriteriaTool::new(search.clone())));
    registry.register(Arc::new(DatabaseStatsTool::new(search)));

    registry
}
