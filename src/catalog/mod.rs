//! Destination catalog loading
//!
//! Reads the destination CSV into `DestinationRecord`s. Two layouts are
//! understood: one column per field, or a single `content` column holding
//! `key: value` lines. Malformed rows are skipped, never fatal.

use crate::error::AdvisorError;
use crate::models::{Destination, DestinationRecord};
use crate::Result;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info, warn};

const CANDIDATE_DELIMITERS: &[u8] = b",;\t|";

/// Load every usable destination row from `path`
pub fn load_destinations(path: impl AsRef<Path>) -> Result<Vec<DestinationRecord>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(AdvisorError::CsvNotFound(path.to_path_buf()));
    }

    let delimiter = sniff_delimiter(path)?;
    debug!(delimiter = %(delimiter as char).escape_default(), "Detected CSV delimiter");

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)?;

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(normalize_key)
        .collect();

    let mut destinations = Vec::new();

    for (index, record) in reader.records().enumerate() {
        let row_num = index + 1;

        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!(row = row_num, error = %e, "Skipping unreadable CSV row");
                continue;
            }
        };

        let row: HashMap<&str, &str> = headers
            .iter()
            .map(String::as_str)
            .zip(record.iter())
            .collect();

        match process_row(&row) {
            Some(destination) => destinations.push(destination),
            None => warn!(row = row_num, "Skipping CSV row without a destination name"),
        }
    }

    info!(count = destinations.len(), path = %path.display(), "Loaded destinations from CSV");
    Ok(destinations)
}

/// Pick the delimiter that occurs most often in the header line
pub fn sniff_delimiter(path: &Path) -> Result<u8> {
    let mut first_line = String::new();
    BufReader::new(File::open(path)?).read_line(&mut first_line)?;
    Ok(detect_delimiter(&first_line))
}

fn detect_delimiter(header: &str) -> u8 {
    CANDIDATE_DELIMITERS
        .iter()
        .copied()
        .map(|d| (d, header.bytes().filter(|b| *b == d).count()))
        .filter(|(_, count)| *count > 0)
        // max_by_key keeps the last maximum; reverse so ',' wins ties
        .rev()
        .max_by_key(|(_, count)| *count)
        .map(|(d, _)| d)
        .unwrap_or(b',')
}

/// Split a comma-separated field into trimmed, non-empty items
pub fn parse_list_field(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn normalize_key(key: &str) -> String {
    key.trim_start_matches('\u{feff}')
        .trim()
        .to_lowercase()
        .replace(' ', "_")
}

fn process_row(row: &HashMap<&str, &str>) -> Option<DestinationRecord> {
    if let Some(content) = row.get("content").map(|c| c.trim()) {
        if !content.is_empty() {
            return process_content_row(content);
        }
    }

    let field = |key: &str| row.get(key).map(|v| v.trim()).unwrap_or_default().to_string();

    let destination = Destination {
        destination: field("destination"),
        description: field("description"),
        famous_for: parse_list_field(&field("famous_for")),
        unique_offerings: parse_list_field(&field("unique_offerings")),
        region: field("region"),
        country: field("country"),
        other_characteristics: field("other_characteristics"),
        best_time_to_travel: field("best_time_to_travel"),
    };

    if destination.destination.is_empty() {
        return None;
    }

    let document_text = build_document_text(&destination);
    Some(DestinationRecord {
        destination,
        document_text,
    })
}

/// Rows whose `content` column carries `key: value` lines
fn process_content_row(content: &str) -> Option<DestinationRecord> {
    let data: HashMap<String, String> = content
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (normalize_key(key), value.trim().to_string()))
        .collect();

    let field = |key: &str| data.get(key).cloned().unwrap_or_default();

    let destination = Destination {
        destination: field("destination"),
        description: field("description"),
        famous_for: parse_list_field(&field("famous_for")),
        unique_offerings: parse_list_field(&field("unique_offerings")),
        region: field("region"),
        country: field("country"),
        other_characteristics: field("other_characteristics"),
        best_time_to_travel: field("best_time_to_travel"),
    };

    if destination.destination.is_empty() {
        return None;
    }

    Some(DestinationRecord {
        destination,
        document_text: content.to_string(),
    })
}

/// Text that represents a destination in embedding space
pub fn build_document_text(d: &Destination) -> String {
    let mut parts = vec![
        format!("Destination: {}", d.destination),
        format!("Description: {}", d.description),
        format!("Country: {}", d.country),
        format!("Region: {}", d.region),
    ];

    if !d.famous_for.is_empty() {
        parts.push(format!("Famous for: {}", d.famous_for.join(", ")));
    }
    if !d.unique_offerings.is_empty() {
        parts.push(format!("Unique offerings: {}", d.unique_offerings.join(", ")));
    }
    if !d.other_characteristics.is_empty() {
        parts.push(format!("Characteristics: {}", d.other_characteristics));
    }
    if !d.best_time_to_travel.is_empty() {
        parts.push(format!("Best time to travel: {}", d.best_time_to_travel));
    }

    parts.join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_column_layout() {
        let file = write_csv(
            "destination,description,famous_for,unique_offerings,region,country,other_characteristics,best_time_to_travel\n\
             Santorini,Whitewashed cliffs,\"sunsets, caldera\",\"wine tasting, sailing\",Aegean,Greece,Romantic,May to October\n",
        );

        let records = load_destinations(file.path()).unwrap();
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.destination.destination, "Santorini");
        assert_eq!(record.destination.famous_for, vec!["sunsets", "caldera"]);
        assert_eq!(record.destination.unique_offerings, vec!["wine tasting", "sailing"]);
        assert!(record.document_text.starts_with("Destination: Santorini | Description: Whitewashed cliffs"));
        assert!(record.document_text.contains("Best time to travel: May to October"));
    }

    #[test]
    fn test_content_layout() {
        let file = write_csv(
            "id,content\n\
             1,\"destination: Banff\ncountry: Canada\nregion: Alberta\nfamous_for: lakes, hiking\"\n",
        );

        let records = load_destinations(file.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].destination.destination, "Banff");
        assert_eq!(records[0].destination.country, "Canada");
        assert_eq!(records[0].destination.famous_for, vec!["lakes", "hiking"]);
        assert!(records[0].document_text.contains("region: Alberta"));
    }

    #[test]
    fn test_rows_without_name_are_skipped() {
        let file = write_csv(
            "destination,country\n\
             Lisbon,Portugal\n\
             ,Nowhere\n\
             Porto,Portugal\n",
        );

        let records = load_destinations(file.path()).unwrap();
        let names: Vec<_> = records.iter().map(|r| r.destination.destination.as_str()).collect();
        assert_eq!(names, vec!["Lisbon", "Porto"]);
    }

    #[test]
    fn test_semicolon_delimiter() {
        let file = write_csv("destination;country;region\nCusco;Peru;Andes\n");
        assert_eq!(sniff_delimiter(file.path()).unwrap(), b';');

        let records = load_destinations(file.path()).unwrap();
        assert_eq!(records[0].destination.country, "Peru");
        assert_eq!(records[0].destination.region, "Andes");
    }

    #[test]
    fn test_missing_file() {
        let err = load_destinations("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, AdvisorError::CsvNotFound(_)));
    }

    #[test]
    fn test_parse_list_field() {
        assert_eq!(parse_list_field(" a, b ,,c "), vec!["a", "b", "c"]);
        assert!(parse_list_field("").is_empty());
    }

    #[test]
    fn test_detect_delimiter_prefers_comma_on_tie() {
        assert_eq!(detect_delimiter("a,b;c"), b',');
        assert_eq!(detect_delimiter("a\tb\tc"), b'\t');
        assert_eq!(detect_delimiter("single"), b',');
    }
}
