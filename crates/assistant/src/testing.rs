//! Scripted collaborators for tests: providers, embedders, and a page fetcher.
//!
//! Compiled for this crate's own tests and, behind the `testing` feature,
//! for downstream crates' tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use souschef_core::error::ProviderError;
use souschef_core::message::{Message, MessageToolCall};
use souschef_core::provider::{
    EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse, Usage,
};

use crate::normalizer::{ExtractionFailure, PageFetcher};

const HASH_DIMENSIONS: usize = 64;

/// Deterministic bag-of-words embedding: each lowercase word bumps one of
/// 64 buckets picked by an FNV-1a hash. Identical texts embed identically
/// and texts sharing words score above zero.
pub fn hash_embedding(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; HASH_DIMENSIONS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in word.to_lowercase().bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        vector[(hash % HASH_DIMENSIONS as u64) as usize] += 1.0;
    }
    vector
}

fn hash_embeddings(request: &EmbeddingRequest) -> EmbeddingResponse {
    EmbeddingResponse {
        embeddings: request.inputs.iter().map(|t| hash_embedding(t)).collect(),
        model: request.model.clone(),
        usage: None,
    }
}

/// Embeds with [`hash_embedding`]; chat completion is not supported.
pub struct HashEmbedder;

impl HashEmbedder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for HashEmbedder {
    fn name(&self) -> &str {
        "hash_embedder"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::NotConfigured("hash_embedder cannot chat".into()))
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        Ok(hash_embeddings(&request))
    }
}

/// Returns the same fixed set of vectors for every embedding call.
pub struct ScriptedEmbedder {
    vectors: Vec<Vec<f32>>,
}

impl ScriptedEmbedder {
    pub fn new(vectors: Vec<Vec<f32>>) -> Self {
        Self { vectors }
    }
}

#[async_trait]
impl Provider for ScriptedEmbedder {
    fn name(&self) -> &str {
        "scripted_embedder"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::NotConfigured("scripted_embedder cannot chat".into()))
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        Ok(EmbeddingResponse {
            embeddings: self.vectors.clone(),
            model: request.model,
            usage: None,
        })
    }
}

/// Every call fails with a 500.
pub struct FailingEmbedder;

#[async_trait]
impl Provider for FailingEmbedder {
    fn name(&self) -> &str {
        "failing_embedder"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(server_error())
    }

    async fn embed(&self, _request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        Err(server_error())
    }
}

fn server_error() -> ProviderError {
    ProviderError::ApiError {
        status_code: 500,
        message: "upstream exploded".into(),
    }
}

/// A mock provider that returns a sequence of scripted completions and
/// embeds with [`hash_embedding`].
///
/// Every completion request is recorded so tests can inspect what the
/// model was sent. Running out of script is an `InvalidResponse` error.
pub struct SequentialMockProvider {
    responses: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::scripted(responses.into_iter().map(Ok).collect())
    }

    pub fn scripted(responses: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A provider that returns a single text response (no tool calls).
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    /// A provider that first returns tool calls, then a final answer.
    pub fn tool_then_answer(tool_calls: Vec<MessageToolCall>, answer: &str) -> Self {
        Self::new(vec![make_tool_call_response(tool_calls, ""), make_text_response(answer)])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        self.responses.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(ProviderError::InvalidResponse(format!(
                "SequentialMockProvider: no more responses (call #{call})"
            )))
        })
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        Ok(hash_embeddings(&request))
    }
}

/// A simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// A response carrying tool calls and optional text.
pub fn make_tool_call_response(tool_calls: Vec<MessageToolCall>, text: &str) -> ProviderResponse {
    let mut response = make_text_response(text);
    response.message.tool_calls = tool_calls;
    response
}

pub fn make_tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: args.to_string(),
    }
}

/// Serves canned HTML by URL; anything else is a 404.
pub struct StaticFetcher {
    pages: HashMap<String, String>,
    fetched: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new(pages: &[(&str, &str)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(url, html)| (url.to_string(), html.to_string()))
                .collect(),
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::new(&[])
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ExtractionFailure> {
        self.fetched.lock().unwrap().push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| ExtractionFailure("404 Not Found".into()))
    }
}
