//! Dataset store
//!
//! A dataset is an ordered list of `{input, expected, metadata}` records kept
//! as JSON lines at `<root>/<project>/<name>.jsonl`. Records are append-only;
//! the harness only ever reads them.

pub mod import;
pub mod literal;

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::bail_invalid;
use crate::error::{BenchError, Result};

pub use import::import_csv;

/// One question with its gold answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetItem {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub input: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl DatasetItem {
    pub fn new(input: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            input: input.into(),
            expected: Some(expected.into()),
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Overview of a dataset's contents
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub project: String,
    pub name: String,
    pub path: PathBuf,
    pub records: usize,
    pub with_expected: usize,
    /// How many records carry each metadata key
    pub metadata_keys: BTreeMap<String, usize>,
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dataset: {}/{}", self.project, self.name)?;
        writeln!(f, "Path: {}", self.path.display())?;
        writeln!(f, "Records: {}", self.records)?;
        writeln!(f, "With expected answer: {}", self.with_expected)?;
        if !self.metadata_keys.is_empty() {
            writeln!(f, "Metadata keys:")?;
            for (key, count) in &self.metadata_keys {
                writeln!(f, "  {}: {}", key, count)?;
            }
        }
        Ok(())
    }
}

pub struct DatasetStore {
    project: String,
    name: String,
    path: PathBuf,
    items: Vec<DatasetItem>,
}

impl DatasetStore {
    /// Open a dataset, creating an empty one if it does not exist yet.
    pub fn init_or_load(root: &Path, project: &str, name: &str) -> Result<Self> {
        let path = dataset_path(root, project, name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let items = if path.exists() {
            load_items(&path)?
        } else {
            Vec::new()
        };

        tracing::debug!(project, name, records = items.len(), "dataset_loaded");

        Ok(Self {
            project: project.to_string(),
            name: name.to_string(),
            path,
            items,
        })
    }

    /// Open an existing dataset.
    pub fn open(root: &Path, project: &str, name: &str) -> Result<Self> {
        let path = dataset_path(root, project, name)?;
        if !path.exists() {
            return Err(BenchError::not_found(
                "dataset",
                format!("{}/{} (expected {})", project, name, path.display()),
            ));
        }
        Self::init_or_load(root, project, name)
    }

    /// Append a record, assigning it a fresh id.
    pub fn insert(
        &mut self,
        input: impl Into<String>,
        expected: Option<String>,
        metadata: Map<String, Value>,
    ) -> Result<&DatasetItem> {
        let item = DatasetItem {
            id: ulid::Ulid::new().to_string(),
            input: input.into(),
            expected,
            metadata,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(&item)?;
        writeln!(file, "{}", line)?;

        self.items.push(item);
        Ok(&self.items[self.items.len() - 1])
    }

    pub fn items(&self) -> &[DatasetItem] {
        &self.items
    }

    /// The first `max_items` records, or all of them
    pub fn take(&self, max_items: Option<usize>) -> Vec<DatasetItem> {
        let limit = max_items.unwrap_or(self.items.len());
        self.items.iter().take(limit).cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn summarize(&self) -> DatasetSummary {
        let mut metadata_keys = BTreeMap::new();
        for item in &self.items {
            for key in item.metadata.keys() {
                *metadata_keys.entry(key.clone()).or_insert(0) += 1;
            }
        }

        DatasetSummary {
            project: self.project.clone(),
            name: self.name.clone(),
            path: self.path.clone(),
            records: self.items.len(),
            with_expected: self.items.iter().filter(|i| i.expected.is_some()).count(),
            metadata_keys,
        }
    }
}

fn validate_component(context: &str, value: &str) -> Result<()> {
    if value.trim().is_empty()
        || value == "."
        || value == ".."
        || value.contains(|c: char| c == '/' || c == '\\')
    {
        bail_invalid!(context, format!("'{}'", value));
    }
    Ok(())
}

fn dataset_path(root: &Path, project: &str, name: &str) -> Result<PathBuf> {
    validate_component("dataset project", project)?;
    validate_component("dataset name", name)?;
    Ok(root.join(project).join(format!("{}.jsonl", name)))
}

fn load_items(path: &Path) -> Result<Vec<DatasetItem>> {
    let content = fs::read_to_string(path)?;
    let mut items = Vec::new();

    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let item: DatasetItem =
            serde_json::from_str(line).map_err(|e| BenchError::InvalidRecord {
                path: path.to_path_buf(),
                line: index + 1,
                reason: e.to_string(),
            })?;
        items.push(item);
    }

    Ok(items)
}
