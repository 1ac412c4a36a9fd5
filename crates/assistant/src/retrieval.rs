//! Retrieval client: embed a query, search one tenant's namespace.

use std::sync::Arc;

use souschef_core::error::ProviderError;
use souschef_core::index::VectorIndex;
use souschef_core::message::TenantId;
use souschef_core::provider::{EmbeddingRequest, Provider};
use souschef_core::Result;
use tracing::{debug, warn};

pub const DEFAULT_TOP_K: usize = 5;

pub struct Retriever {
    provider: Arc<dyn Provider>,
    index: Arc<dyn VectorIndex>,
    embedding_model: String,
    top_k: usize,
}

impl Retriever {
    pub fn new(
        provider: Arc<dyn Provider>,
        index: Arc<dyn VectorIndex>,
        embedding_model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            index,
            embedding_model: embedding_model.into(),
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Embed a single string.
    ///
    /// Only the first returned vector is used. The endpoint returns one
    /// vector per input, so more than one here means the service split
    /// the input; that is logged rather than resolved.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .provider
            .embed(EmbeddingRequest {
                model: self.embedding_model.clone(),
                inputs: vec![text.to_string()],
            })
            .await?;

        if response.embeddings.len() > 1 {
            warn!(
                count = response.embeddings.len(),
                "Embedding call returned several vectors for one input; using the first"
            );
        }

        response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("no embedding returned".into()).into())
    }

    /// Recipe texts nearest to `vector` in the tenant's namespace, best first.
    pub async fn search(&self, tenant: &TenantId, vector: &[f32], top_k: usize) -> Result<Vec<String>> {
        let namespace = tenant.namespace();
        let matches = self.index.query(&namespace, vector, top_k).await?;
        debug!(namespace = %namespace, hits = matches.len(), "Recipe search complete");
        Ok(matches.into_iter().map(|m| m.contents).collect())
    }

    /// Embed `query` and search with the configured `top_k`.
    pub async fn find_relevant(&self, tenant: &TenantId, query: &str) -> Result<Vec<String>> {
        let vector = self.embed(query).await?;
        self.search(tenant, &vector, self.top_k).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{HashEmbedder, ScriptedEmbedder};
    use souschef_core::index::IndexRecord;
    use souschef_core::Error;
    use souschef_index::InMemoryIndex;

    async fn seeded(tenant: &TenantId, provider: Arc<dyn Provider>, index: Arc<InMemoryIndex>, texts: &[&str]) {
        let retriever = Retriever::new(provider, index.clone(), "embed-model");
        for (i, text) in texts.iter().enumerate() {
            let values = retriever.embed(text).await.unwrap();
            index
                .upsert(&tenant.namespace(), IndexRecord {
                    id: format!("r{i}"),
                    values,
                    contents: text.to_string(),
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn finds_closest_recipe() {
        let provider: Arc<dyn Provider> = Arc::new(HashEmbedder::new());
        let index = Arc::new(InMemoryIndex::new());
        let tenant = TenantId::from("1");
        seeded(&tenant, provider.clone(), index.clone(), &[
            "title: Tomato soup",
            "title: Chocolate cake",
        ])
        .await;

        let retriever = Retriever::new(provider, index, "embed-model");
        let hits = retriever.find_relevant(&tenant, "title: Tomato soup").await.unwrap();
        assert_eq!(hits[0], "title: Tomato soup");
    }

    #[tokio::test]
    async fn other_tenants_never_match() {
        let provider: Arc<dyn Provider> = Arc::new(HashEmbedder::new());
        let index = Arc::new(InMemoryIndex::new());
        seeded(&TenantId::from("a"), provider.clone(), index.clone(), &["title: Secret stew"]).await;

        let retriever = Retriever::new(provider, index, "embed-model");
        let hits = retriever
            .find_relevant(&TenantId::from("b"), "title: Secret stew")
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn top_k_bounds_results() {
        let provider: Arc<dyn Provider> = Arc::new(HashEmbedder::new());
        let index = Arc::new(InMemoryIndex::new());
        let tenant = TenantId::from("1");
        let texts: Vec<String> = (0..9).map(|i| format!("title: Dish {i}")).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        seeded(&tenant, provider.clone(), index.clone(), &refs).await;

        let retriever = Retriever::new(provider, index, "embed-model");
        assert_eq!(retriever.find_relevant(&tenant, "dish").await.unwrap().len(), 5);
        let retriever = retriever.with_top_k(2);
        assert_eq!(retriever.find_relevant(&tenant, "dish").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn first_of_several_vectors_is_used() {
        let provider = Arc::new(ScriptedEmbedder::new(vec![vec![1.0, 0.0], vec![0.0, 1.0]]));
        let retriever = Retriever::new(provider, Arc::new(InMemoryIndex::new()), "m");
        assert_eq!(retriever.embed("x").await.unwrap(), vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn no_vectors_is_upstream_error() {
        let provider = Arc::new(ScriptedEmbedder::new(vec![]));
        let retriever = Retriever::new(provider, Arc::new(InMemoryIndex::new()), "m");
        let err = retriever.embed("x").await.unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::InvalidResponse(_))));
    }
}
