//! Pinecone data-plane client.
//!
//! Talks to a single index host over REST:
//! - `POST {host}/vectors/upsert` with `{vectors: [{id, values, metadata}], namespace}`
//! - `POST {host}/query` with `{namespace, vector, topK, includeValues, includeMetadata}`
//!
//! Recipe text lives in `metadata.contents`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use souschef_core::error::IndexError;
use souschef_core::index::{IndexMatch, IndexRecord, VectorIndex};
use std::time::Duration;
use tracing::{debug, warn};

pub struct PineconeIndex {
    host: String,
    api_key: String,
    client: reqwest::Client,
}

impl PineconeIndex {
    pub fn new(
        host: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, IndexError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IndexError::NotConfigured(format!("HTTP client: {e}")))?;

        let mut host = host.into().trim_end_matches('/').to_string();
        if !host.starts_with("http://") && !host.starts_with("https://") {
            host = format!("https://{host}");
        }

        Ok(Self {
            host,
            api_key: api_key.into(),
            client,
        })
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<reqwest::Response, IndexError> {
        let url = format!("{}/{path}", self.host);
        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| IndexError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, path, "Pinecone returned error");
            return Err(IndexError::ApiError {
                status_code: status.as_u16(),
                message: body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    fn name(&self) -> &str {
        "pinecone"
    }

    async fn upsert(&self, namespace: &str, record: IndexRecord) -> Result<(), IndexError> {
        let body = UpsertRequest {
            vectors: vec![ApiVector {
                id: record.id,
                values: record.values,
                metadata: ApiMetadata {
                    contents: record.contents,
                },
            }],
            namespace,
        };

        debug!(namespace, id = %body.vectors[0].id, "Upserting vector");
        let response = self.post("vectors/upsert", &body).await?;

        let parsed: UpsertResponse = response
            .json()
            .await
            .map_err(|e| IndexError::Network(format!("Failed to parse upsert response: {e}")))?;
        if parsed.upserted_count != 1 {
            return Err(IndexError::ApiError {
                status_code: 200,
                message: format!("expected 1 upserted vector, got {}", parsed.upserted_count),
            });
        }
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<IndexMatch>, IndexError> {
        let body = QueryRequest {
            namespace,
            vector,
            top_k,
            include_values: false,
            include_metadata: true,
        };

        debug!(namespace, top_k, "Querying index");
        let response = self.post("query", &body).await?;

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| IndexError::Network(format!("Failed to parse query response: {e}")))?;

        Ok(parsed
            .matches
            .into_iter()
            .filter_map(|m| {
                let contents = m.metadata?.contents;
                Some(IndexMatch {
                    id: m.id,
                    score: m.score,
                    contents,
                })
            })
            .collect())
    }
}

// --- Pinecone API types (internal) ---

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<ApiVector>,
    namespace: &'a str,
}

#[derive(Debug, Serialize)]
struct ApiVector {
    id: String,
    values: Vec<f32>,
    metadata: ApiMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiMetadata {
    contents: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    namespace: &'a str,
    vector: &'a [f32],
    top_k: usize,
    include_values: bool,
    include_metadata: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<ApiMatch>,
}

#[derive(Debug, Deserialize)]
struct ApiMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<ApiMetadata>,
}
