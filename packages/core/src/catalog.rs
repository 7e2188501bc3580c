//! # Class catalog
//! Ordered table mapping model output index to a disease name and its descriptive text.
//! Position in the file is the contract with the model's final layer.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassRecord {
    pub name: String,
    #[serde(default)]
    pub cause: String,
    #[serde(default)]
    pub cure: String,
}

#[derive(Debug, Clone)]
pub struct ClassCatalog {
    records: Vec<ClassRecord>,
    by_name: HashMap<String, usize>,
}

impl ClassCatalog {
    /// Builds a catalog, rejecting empty tables, blank names and duplicate names.
    pub fn new(records: Vec<ClassRecord>) -> Result<Self> {
        if records.is_empty() {
            return Err(Error::InvalidCatalog("catalog contains no classes".into()));
        }

        let mut by_name = HashMap::with_capacity(records.len());
        for (idx, record) in records.iter().enumerate() {
            if record.name.trim().is_empty() {
                return Err(Error::InvalidCatalog(format!(
                    "class at index {idx} has an empty name"
                )));
            }
            if let Some(prev) = by_name.insert(record.name.clone(), idx) {
                return Err(Error::InvalidCatalog(format!(
                    "class '{}' appears at index {prev} and {idx}",
                    record.name
                )));
            }
        }

        Ok(Self { records, by_name })
    }

    pub fn from_json(data: &[u8]) -> Result<Self> {
        let records: Vec<ClassRecord> = serde_json::from_slice(data)
            .map_err(|e| Error::InvalidCatalog(format!("malformed JSON: {e}")))?;
        Self::new(records)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| Error::CatalogLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let catalog = Self::from_json(&data).map_err(|e| Error::CatalogLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        tracing::info!(path = %path.display(), classes = catalog.len(), "Loaded class catalog");
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ClassRecord> {
        self.records.get(index)
    }

    pub fn lookup(&self, name: &str) -> Option<&ClassRecord> {
        self.by_name.get(name).map(|&idx| &self.records[idx])
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.name.as_str())
    }
}
