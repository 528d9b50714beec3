//! Store Configuration
//!
//! Tunables for both executors, loadable from a JSON file. Every field has
//! a default matching the native engines' limits.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{StoreError, StoreResult};

/// Largest membership list the document store accepts in one query
pub const MAX_IN_VALUES: usize = 30;

/// Largest number of writes the document store accepts in one batch
pub const MAX_BATCH_WRITES: usize = 500;

/// Executor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Values per chunk when an `in` filter is split (default: 30)
    #[serde(default = "default_in_chunk_size")]
    pub in_chunk_size: usize,

    /// Writes per atomic batch commit (default: 500)
    #[serde(default = "default_max_batch_writes")]
    pub max_batch_writes: usize,

    /// Path prefix under which tree store collections live
    #[serde(default)]
    pub tree_root: Option<String>,

    /// Sort by every declared ordering client-side on the tree store
    /// instead of only the first (default: false)
    #[serde(default)]
    pub emulate_secondary_order: bool,
}

fn default_in_chunk_size() -> usize {
    MAX_IN_VALUES
}

fn default_max_batch_writes() -> usize {
    MAX_BATCH_WRITES
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            in_chunk_size: default_in_chunk_size(),
            max_batch_writes: default_max_batch_writes(),
            tree_root: None,
            emulate_secondary_order: false,
        }
    }
}

impl StoreConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> StoreResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| StoreError::Config(format!("Failed to read config: {}", e)))?;

        Self::from_json_str(&content)
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(content: &str) -> StoreResult<Self> {
        let config: StoreConfig = serde_json::from_str(content)
            .map_err(|e| StoreError::Config(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate limits against the native engines
    pub fn validate(&self) -> StoreResult<()> {
        if self.in_chunk_size == 0 || self.in_chunk_size > MAX_IN_VALUES {
            return Err(StoreError::Config(format!(
                "in_chunk_size must be in 1..={}, got {}",
                MAX_IN_VALUES, self.in_chunk_size
            )));
        }

        if self.max_batch_writes == 0 || self.max_batch_writes > MAX_BATCH_WRITES {
            return Err(StoreError::Config(format!(
                "max_batch_writes must be in 1..={}, got {}",
                MAX_BATCH_WRITES, self.max_batch_writes
            )));
        }

        Ok(())
    }

    /// Tree store path of a collection
    pub fn collection_path(&self, collection: &str) -> String {
        match self.tree_root.as_deref().map(|r| r.trim_matches('/')) {
            Some(root) if !root.is_empty() => format!("{}/{}", root, collection),
            _ => collection.to_string(),
        }
    }

    /// Tree store path of a record
    pub fn record_path(&self, collection: &str, key: &str) -> String {
        format!("{}/{}", self.collection_path(collection), key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.in_chunk_size, 30);
        assert_eq!(config.max_batch_writes, 500);
        assert!(!config.emulate_secondary_order);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = StoreConfig::from_json_str(r#"{"tree_root": "/station/"}"#).unwrap();
        assert_eq!(config.in_chunk_size, 30);
        assert_eq!(config.collection_path("vehicles"), "station/vehicles");
        assert_eq!(config.record_path("vehicles", "k1"), "station/vehicles/k1");
    }

    #[test]
    fn test_rejects_oversized_chunk() {
        let err = StoreConfig::from_json_str(r#"{"in_chunk_size": 31}"#).unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));

        let err = StoreConfig::from_json_str(r#"{"max_batch_writes": 0}"#).unwrap_err();
        assert!(err.to_string().contains("max_batch_writes"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"in_chunk_size": 10, "emulate_secondary_order": true}}"#).unwrap();

        let config = StoreConfig::load(file.path()).unwrap();
        assert_eq!(config.in_chunk_size, 10);
        assert!(config.emulate_secondary_order);
        assert_eq!(config.collection_path("x"), "x");
    }

    #[test]
    fn test_load_missing_file() {
        let err = StoreConfig::load(Path::new("/nonexistent/duostore.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }
}
