//! Hierarchical JSON document store used to share brackets between scoring
//! stations.
//!
//! Paths are `/`-separated. The store offers whole-document writes,
//! top-level field merges, a compare-and-swap primitive for claiming locks
//! and committing sets, and change subscriptions.

pub mod memory;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::watch;

use crate::bracket::models::MatchId;

pub use memory::MemoryStore;

/// Document store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Document at {path} is not an object")]
    NotAnObject { path: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Trait for document store backends
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read the document at `path`
    async fn get(&self, path: &str) -> StoreResult<Option<Value>>;

    /// Replace the document at `path`; `Value::Null` removes it
    async fn set(&self, path: &str, value: Value) -> StoreResult<()>;

    /// Merge top-level fields into the object at `path`, creating it if absent
    async fn update(&self, path: &str, fields: Map<String, Value>) -> StoreResult<()>;

    /// Write `new` only if the current document equals `expected`
    ///
    /// `None` stands for an absent document on either side. Returns whether
    /// the write happened.
    async fn compare_and_swap(
        &self,
        path: &str,
        expected: Option<&Value>,
        new: Option<Value>,
    ) -> StoreResult<bool>;

    /// Watch the document at `path`
    async fn subscribe(&self, path: &str) -> StoreResult<watch::Receiver<Option<Value>>>;
}

/// Document paths for one store root
#[derive(Debug, Clone)]
pub struct StorePaths {
    root: String,
}

impl StorePaths {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }

    /// Bracket index of a category
    pub fn bracket(&self, category: &str) -> String {
        format!("{}/brackets/{}", self.root, category)
    }

    pub fn match_doc(&self, category: &str, match_id: &MatchId) -> String {
        format!("{}/matches/{}/{}", self.root, category, match_id)
    }

    pub fn lock(&self, category: &str, match_id: &MatchId) -> String {
        format!("{}/locks/{}/{}", self.root, category, match_id)
    }
}
