//! Schema Provider - static catalog of specification templates
//!
//! Each catalog entry is an opaque JSON mapping keyed by its
//! `challenge_type` string. The catalog is read fresh on every lookup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

/// Built-in catalog used when no schema file is configured
pub const EMBEDDED_CATALOG: &str = include_str!("../schemas/platform_schema.json");

/// Key naming the challenge type of a catalog entry
pub const CHALLENGE_TYPE_KEY: &str = "challenge_type";

/// A single specification template
pub type SchemaEntry = Map<String, Value>;

/// Errors from loading the schema catalog
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Failed to read schema catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse schema catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Schema catalog is empty")]
    EmptyCatalog,
}

/// Read-only source of specification templates
pub trait SchemaProvider: Send + Sync {
    /// Load the full catalog, in file order
    fn load(&self) -> Result<Vec<SchemaEntry>, SchemaError>;
}

/// Catalog compiled into the binary
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedSchemaProvider;

impl SchemaProvider for EmbeddedSchemaProvider {
    fn load(&self) -> Result<Vec<SchemaEntry>, SchemaError> {
        debug!("EmbeddedSchemaProvider::load: called");
        Ok(serde_json::from_str(EMBEDDED_CATALOG)?)
    }
}

/// Catalog read from a JSON file on every lookup
#[derive(Debug, Clone)]
pub struct FileSchemaProvider {
    path: PathBuf,
}

impl FileSchemaProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SchemaProvider for FileSchemaProvider {
    fn load(&self) -> Result<Vec<SchemaEntry>, SchemaError> {
        debug!(path = %self.path.display(), "FileSchemaProvider::load: called");
        let content = std::fs::read_to_string(&self.path).map_err(|source| SchemaError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Provider for an optional catalog file, falling back to the embedded catalog
pub fn catalog_provider(schema_file: Option<&Path>) -> Arc<dyn SchemaProvider> {
    match schema_file {
        Some(path) => {
            debug!(path = %path.display(), "catalog_provider: using catalog file");
            Arc::new(FileSchemaProvider::new(path))
        }
        None => Arc::new(EmbeddedSchemaProvider),
    }
}

/// Challenge type of an entry, if present
pub fn entry_type(entry: &SchemaEntry) -> Option<&str> {
    entry.get(CHALLENGE_TYPE_KEY).and_then(Value::as_str)
}

/// Pick the entry for `challenge_type`
///
/// Returns the first entry whose type matches, or the catalog's first entry
/// when none does. Only an empty catalog is an error.
pub fn select_schema(catalog: &[SchemaEntry], challenge_type: &str) -> Result<SchemaEntry, SchemaError> {
    debug!(%challenge_type, catalog_len = catalog.len(), "select_schema: called");
    if let Some(entry) = catalog.iter().find(|e| entry_type(e) == Some(challenge_type)) {
        debug!("select_schema: matched entry");
        return Ok(entry.clone());
    }

    debug!("select_schema: no match, falling back to first entry");
    catalog.first().cloned().ok_or(SchemaError::EmptyCatalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn catalog(types: &[&str]) -> Vec<SchemaEntry> {
        types
            .iter()
            .map(|t| {
                let mut entry = Map::new();
                entry.insert(CHALLENGE_TYPE_KEY.to_string(), Value::from(*t));
                entry.insert("fields".to_string(), serde_json::json!({ "title": t }));
                entry
            })
            .collect()
    }

    #[test]
    fn test_embedded_catalog_loads() {
        let entries = EmbeddedSchemaProvider.load().unwrap();
        let types: Vec<_> = entries.iter().filter_map(entry_type).collect();
        assert_eq!(types, vec!["development", "design", "datascience", "qa"]);
    }

    #[test]
    fn test_select_matching_entry() {
        let entries = catalog(&["development", "design"]);
        let selected = select_schema(&entries, "design").unwrap();
        assert_eq!(entry_type(&selected), Some("design"));
    }

    #[test]
    fn test_select_unknown_type_falls_back_to_first() {
        let entries = catalog(&["development", "design"]);
        let selected = select_schema(&entries, "nonexistent-type").unwrap();
        assert_eq!(entry_type(&selected), Some("development"));
    }

    #[test]
    fn test_select_first_of_duplicates() {
        let mut entries = catalog(&["design", "design"]);
        entries[1].insert("marker".to_string(), Value::from(2));
        let selected = select_schema(&entries, "design").unwrap();
        assert!(selected.get("marker").is_none());
    }

    #[test]
    fn test_select_empty_catalog_errors() {
        assert!(matches!(select_schema(&[], "design"), Err(SchemaError::EmptyCatalog)));
    }

    #[test]
    fn test_file_provider_reads_fresh_each_time() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("schema.json");
        std::fs::write(&path, r#"[{"challenge_type": "design"}]"#).unwrap();

        let provider = FileSchemaProvider::new(&path);
        assert_eq!(entry_type(&provider.load().unwrap()[0]), Some("design"));

        std::fs::write(&path, r#"[{"challenge_type": "qa"}]"#).unwrap();
        assert_eq!(entry_type(&provider.load().unwrap()[0]), Some("qa"));
    }

    #[test]
    fn test_file_provider_missing_file() {
        let provider = FileSchemaProvider::new("/definitely/not/here.json");
        assert!(matches!(provider.load(), Err(SchemaError::Io { .. })));
    }

    #[test]
    fn test_catalog_provider_defaults_to_embedded() {
        let types: Vec<_> = catalog_provider(None)
            .load()
            .unwrap()
            .iter()
            .filter_map(|e| entry_type(e).map(String::from))
            .collect();
        assert_eq!(types, vec!["development", "design", "datascience", "qa"]);
    }
}
