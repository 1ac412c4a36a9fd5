//! In-process index: used by tests and single-node deployments.

use async_trait::async_trait;
use souschef_core::error::IndexError;
use souschef_core::index::{IndexMatch, IndexRecord, VectorIndex};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::vector::rank_by_similarity;

type Namespace = HashMap<String, IndexRecord>;

/// Records keyed by namespace, then by id. Upserting an existing id
/// replaces the record wholesale.
pub struct InMemoryIndex {
    namespaces: Arc<RwLock<HashMap<String, Namespace>>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            namespaces: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of records in `namespace`.
    pub async fn count(&self, namespace: &str) -> usize {
        self.namespaces
            .read()
            .await
            .get(namespace)
            .map_or(0, HashMap::len)
    }

    /// Fetch one record by id.
    pub async fn get(&self, namespace: &str, id: &str) -> Option<IndexRecord> {
        self.namespaces
            .read()
            .await
            .get(namespace)
            .and_then(|ns| ns.get(id))
            .cloned()
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn upsert(&self, namespace: &str, record: IndexRecord) -> Result<(), IndexError> {
        let mut namespaces = self.namespaces.write().await;
        let ns = namespaces.entry(namespace.to_string()).or_default();

        if let Some(existing) = ns.values().next() {
            if existing.values.len() != record.values.len() {
                return Err(IndexError::DimensionMismatch {
                    expected: existing.values.len(),
                    actual: record.values.len(),
                });
            }
        }

        ns.insert(record.id.clone(), record);
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<IndexMatch>, IndexError> {
        let namespaces = self.namespaces.read().await;
        let Some(ns) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let ranked = rank_by_similarity(
            ns.values().map(|r| (r.id.as_str(), r.values.as_slice())),
            vector,
            top_k,
        );

        Ok(ranked
            .into_iter()
            .filter_map(|(id, score)| {
                ns.get(id).map(|r| IndexMatch {
                    id: r.id.clone(),
                    score,
                    contents: r.contents.clone(),
                })
            })
            .collect())
    }
}
