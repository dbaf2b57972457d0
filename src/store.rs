//! Persistent store of saved statement templates.
//!
//! Saved queries live in one JSON file mapping label to
//! `{sql, params}`. The whole file is rewritten on every mutation. Parameter
//! names are the distinct `$name` placeholder tokens in the statement, in
//! first-occurrence order. Entries outlive the session and are never
//! invalidated automatically — a schema change surfaces only as an ordinary
//! execution failure at next use.

use std::path::PathBuf;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the saved-query store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store file could not be read or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The store file is not valid JSON.
    #[error("malformed store file: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A saved statement template with its extracted parameter names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedQuery {
    pub sql: String,
    pub params: Vec<String>,
}

/// Label-keyed store of saved statements, persisted as one JSON file.
///
/// Labels iterate in insertion order (the underlying map is ordered).
pub struct QueryStore {
    path: PathBuf,
    entries: IndexMap<String, SavedQuery>,
}

impl QueryStore {
    /// Open the store, creating an empty file if none exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            let entries = serde_json::from_str(&data)?;
            return Ok(Self { path, entries });
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = Self {
            path,
            entries: IndexMap::new(),
        };
        store.persist()?;
        Ok(store)
    }

    /// Save a statement under a label, overwriting any existing entry, and
    /// persist immediately.
    pub fn save(&mut self, label: &str, sql: &str) -> Result<(), StoreError> {
        let params = extract_params(sql);
        self.entries.insert(
            label.to_string(),
            SavedQuery {
                sql: sql.to_string(),
                params,
            },
        );
        self.persist()
    }

    pub fn get(&self, label: &str) -> Option<&SavedQuery> {
        self.entries.get(label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.entries.contains_key(label)
    }

    /// Saved labels in store order.
    pub fn labels(&self) -> Vec<&str> {
        self.entries.keys().map(|k| k.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rewrite the whole store file.
    fn persist(&self) -> Result<(), StoreError> {
        let data = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, data)?;
        Ok(())
    }
}

/// Placeholder tokens are a `$` sigil followed by an identifier.
fn placeholder_regex() -> Regex {
    Regex::new(r"\$([A-Za-z0-9_]+)").unwrap()
}

/// Extract distinct `$name` parameter names in first-occurrence order.
pub fn extract_params(sql: &str) -> Vec<String> {
    let mut params: Vec<String> = Vec::new();
    for cap in placeholder_regex().captures_iter(sql) {
        let name = cap[1].to_string();
        if !params.contains(&name) {
            params.push(name);
        }
    }
    params
}

/// Rewrite every `$name` occurrence to a `?` placeholder and collect the
/// matching values in occurrence order, ready for driver-native binding.
///
/// Placeholders with no supplied value are left untouched so the driver
/// reports them rather than silently binding garbage.
pub fn bind_template(sql: &str, values: &IndexMap<String, String>) -> (String, Vec<String>) {
    let mut bound = Vec::new();
    let rewritten = placeholder_regex()
        .replace_all(sql, |caps: &regex::Captures| {
            let name = &caps[1];
            match values.get(name) {
                Some(value) => {
                    bound.push(value.clone());
                    "?".to_string()
                }
                None => caps[0].to_string(),
            }
        })
        .into_owned();
    (rewritten, bound)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (QueryStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = QueryStore::open(dir.path().join("queries.json")).unwrap();
        (store, dir)
    }

    // --- extract_params ---

    #[test]
    fn test_extract_single_param() {
        assert_eq!(
            extract_params("SELECT * FROM t WHERE id = $id"),
            vec!["id"]
        );
    }

    #[test]
    fn test_extract_dedup_first_occurrence_order() {
        let params = extract_params(
            "SELECT * FROM t WHERE locale = $locale AND id = $id OR locale = $locale",
        );
        assert_eq!(params, vec!["locale", "id"]);
    }

    #[test]
    fn test_extract_none() {
        assert!(extract_params("SELECT COUNT(*) FROM node").is_empty());
    }

    // --- bind_template ---

    #[test]
    fn test_bind_replaces_every_occurrence() {
        let mut values = IndexMap::new();
        values.insert("id".to_string(), "5".to_string());

        let (sql, bound) =
            bind_template("SELECT * FROM t WHERE id = $id OR parent = $id", &values);
        assert_eq!(sql, "SELECT * FROM t WHERE id = ? OR parent = ?");
        assert_eq!(bound, vec!["5", "5"]);
    }

    #[test]
    fn test_bind_occurrence_order_across_params() {
        let mut values = IndexMap::new();
        values.insert("a".to_string(), "1".to_string());
        values.insert("b".to_string(), "2".to_string());

        let (sql, bound) = bind_template("WHERE x = $b AND y = $a", &values);
        assert_eq!(sql, "WHERE x = ? AND y = ?");
        assert_eq!(bound, vec!["2", "1"]);
    }

    #[test]
    fn test_bind_leaves_unknown_placeholder() {
        let values = IndexMap::new();
        let (sql, bound) = bind_template("WHERE id = $id", &values);
        assert_eq!(sql, "WHERE id = $id");
        assert!(bound.is_empty());
    }

    // --- QueryStore ---

    #[test]
    fn test_save_and_get_round_trip() {
        let (mut store, _dir) = temp_store();
        store
            .save("by-id", "SELECT * FROM t WHERE id = $id")
            .unwrap();

        let saved = store.get("by-id").unwrap();
        assert_eq!(saved.sql, "SELECT * FROM t WHERE id = $id");
        assert_eq!(saved.params, vec!["id"]);
    }

    #[test]
    fn test_save_same_label_overwrites() {
        let (mut store, _dir) = temp_store();
        store.save("q", "SELECT 1").unwrap();
        store.save("q", "SELECT 2").unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("q").unwrap().sql, "SELECT 2");
    }

    #[test]
    fn test_labels_in_insertion_order() {
        let (mut store, _dir) = temp_store();
        store.save("beta", "SELECT 1").unwrap();
        store.save("alpha", "SELECT 2").unwrap();
        assert_eq!(store.labels(), vec!["beta", "alpha"]);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queries.json");

        {
            let mut store = QueryStore::open(&path).unwrap();
            store
                .save("translators", "SELECT name FROM users WHERE locale = $locale")
                .unwrap();
        }

        let reopened = QueryStore::open(&path).unwrap();
        let saved = reopened.get("translators").unwrap();
        assert_eq!(saved.params, vec!["locale"]);
    }

    #[test]
    fn test_open_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("queries.json");
        let store = QueryStore::open(&path).unwrap();
        assert!(store.is_empty());
        assert!(path.exists());
    }

    #[test]
    fn test_open_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queries.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            QueryStore::open(&path),
            Err(StoreError::Malformed(_))
        ));
    }
}
