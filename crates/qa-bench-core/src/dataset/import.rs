//! Flat-file ingestion.
//!
//! The source CSV has a header row followed by `metadata, problem, answer`
//! columns, where `metadata` is a dict literal. The literal is parsed, never
//! evaluated.

use std::path::Path;

use serde_json::{Map, Value};

use super::literal::parse_literal;
use super::DatasetStore;
use crate::error::{BenchError, Result};

const METADATA_COLUMN: usize = 0;
const INPUT_COLUMN: usize = 1;
const EXPECTED_COLUMN: usize = 2;

/// A validated CSV row, ready to insert.
struct ImportRow {
    input: String,
    expected: String,
    metadata: Map<String, Value>,
}

/// Append every row of `csv_path` to `store`, returning the number imported.
///
/// Every row is validated before the first one is written: a bad row leaves
/// the dataset untouched.
pub fn import_csv(store: &mut DatasetStore, csv_path: &Path) -> Result<usize> {
    let rows = read_rows(csv_path)?;
    let imported = rows.len();

    for row in rows {
        store.insert(row.input, Some(row.expected), row.metadata)?;
    }

    tracing::info!(
        path = %csv_path.display(),
        imported,
        "dataset_import"
    );
    Ok(imported)
}

fn read_rows(csv_path: &Path) -> Result<Vec<ImportRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(csv_path)?;

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        // Header is line 1
        let line = index + 2;
        let invalid = |reason: String| BenchError::InvalidRecord {
            path: csv_path.to_path_buf(),
            line,
            reason,
        };

        if record.len() <= EXPECTED_COLUMN {
            return Err(invalid(format!(
                "expected at least 3 columns (metadata, problem, answer), found {}",
                record.len()
            )));
        }

        let metadata = parse_metadata(&record[METADATA_COLUMN]).map_err(invalid)?;
        let input = record[INPUT_COLUMN].to_string();
        if input.trim().is_empty() {
            return Err(invalid("empty problem".to_string()));
        }

        rows.push(ImportRow {
            input,
            expected: record[EXPECTED_COLUMN].to_string(),
            metadata,
        });
    }
    Ok(rows)
}

/// Parse a metadata cell into a mapping. Blank cells yield an empty mapping.
pub fn parse_metadata(text: &str) -> std::result::Result<Map<String, Value>, String> {
    if text.trim().is_empty() {
        return Ok(Map::new());
    }
    match parse_literal(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!(
            "metadata must be a mapping, found {}",
            value_kind(&other)
        )),
        Err(e) => Err(format!("invalid metadata literal: {}", e)),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}
