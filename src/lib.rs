//! Natural-language SQL query tool — shared library for the `nlquery` binary.
//!
//! A language model translates free-form questions into SQL against a schema
//! document supplied at startup. Candidate statements are validated by running
//! a row-bounded sample; execution errors are fed back to the model for
//! correction, up to [`MAX_ATTEMPTS`]. A validated statement runs at full
//! scale only after explicit confirmation, and can then be saved as a
//! parameterized template for later reuse.

pub mod correction;
pub mod cost;
pub mod db;
pub mod display;
pub mod error;
pub mod history;
pub mod llm;
pub mod prompt;
pub mod store;
pub mod translate;

use std::path::PathBuf;

/// Maximum number of translation attempts per natural-language query.
pub const MAX_ATTEMPTS: u32 = 3;

/// Row bound appended to candidate statements during sample execution.
pub const SAMPLE_ROW_LIMIT: usize = 5;

/// Resolve the saved-query store path from env var or default location.
pub fn resolve_store_path() -> PathBuf {
    if let Ok(path) = std::env::var("NATURAL_QUERY_STORE") {
        return PathBuf::from(path);
    }

    let data_dir = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    data_dir.join("natural-query").join("queries.json")
}

/// Resolve the schema documentation path from env var or default location.
pub fn resolve_schema_path() -> PathBuf {
    if let Ok(path) = std::env::var("NATURAL_QUERY_SCHEMA") {
        return PathBuf::from(path);
    }

    PathBuf::from("schema.md")
}
