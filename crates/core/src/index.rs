//! Vector index trait: namespaced nearest-neighbour storage.
//!
//! Every call carries the namespace explicitly; the index itself has no
//! notion of the caller, so isolation depends on callers deriving the
//! namespace from [`crate::TenantId::namespace`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::IndexError;

/// One stored entry: id, embedding, and the text payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: String,
    pub values: Vec<f32>,
    /// Canonical recipe text, stored as metadata `contents`
    pub contents: String,
}

/// A query hit. Raw vectors are never returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMatch {
    pub id: String,
    pub score: f32,
    pub contents: String,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Backend name for logging (e.g., "pinecone", "in-memory").
    fn name(&self) -> &str;

    /// Insert or overwrite a record. A single call is atomic per record.
    async fn upsert(&self, namespace: &str, record: IndexRecord) -> Result<(), IndexError>;

    /// Nearest neighbours, best first, at most `top_k`.
    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<IndexMatch>, IndexError>;
}
