//! Metadata filters for collection queries

use serde_json::Value;

/// Conjunction of case-insensitive "contains" conditions.
///
/// A condition holds when any of its keys maps to a string (or an array of
/// strings) containing the needle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFilter {
    conditions: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq)]
struct Condition {
    keys: Vec<String>,
    needle: String,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(self, key: &str, needle: &str) -> Self {
        self.contains_any(&[key], needle)
    }

    /// Blank needles are ignored
    pub fn contains_any(mut self, keys: &[&str], needle: &str) -> Self {
        let needle = needle.trim().to_lowercase();
        if !needle.is_empty() {
            self.conditions.push(Condition {
                keys: keys.iter().map(|k| k.to_string()).collect(),
                needle,
            });
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, metadata: &Value) -> bool {
        self.conditions.iter().all(|condition| {
            condition
                .keys
                .iter()
                .filter_map(|key| metadata.get(key))
                .any(|value| value_contains(value, &condition.needle))
        })
    }
}

fn value_contains(value: &Value, needle: &str) -> bool {
    match value {
        Value::String(s) => s.to_lowercase().contains(needle),
        Value::Array(items) => items.iter().any(|item| value_contains(item, needle)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(MetadataFilter::new().matches(&json!({})));
        assert!(MetadataFilter::new().contains("country", "  ").is_empty());
    }

    #[test]
    fn test_conditions_are_anded() {
        let metadata = json!({ "country": "Italy", "region": "Tuscany" });

        assert!(MetadataFilter::new()
            .contains("country", "ital")
            .contains("region", "TUSCANY")
            .matches(&metadata));
        assert!(!MetadataFilter::new()
            .contains("country", "italy")
            .contains("region", "sicily")
            .matches(&metadata));
    }

    #[test]
    fn test_any_key_and_array_values() {
        let metadata = json!({
            "famous_for": ["Coral reefs", "Beaches"],
            "description": "Island chain",
        });

        let filter = MetadataFilter::new().contains_any(&["famous_for", "description"], "beach");
        assert!(filter.matches(&metadata));

        let filter = MetadataFilter::new().contains_any(&["famous_for", "description"], "ski");
        assert!(!filter.matches(&metadata));
    }

    #[test]
    fn test_missing_key_does_not_match() {
        let filter = MetadataFilter::new().contains("country", "peru");
        assert!(!filter.matches(&json!({ "region": "Andes" })));
    }
}
