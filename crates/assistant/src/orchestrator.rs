//! The conversation orchestrator: one turn, start to finish.
//!
//! A turn runs as a single sequential pipeline:
//! 1. Resolve the thread (tenant-checked)
//! 2. Normalize input: inline URL content, normalize any image
//! 3. Retrieve relevant recipes from the caller's namespace
//! 4. Build the system prompt under the token budget
//! 5. Call the model, offering the recipe tools
//! 6. Run any requested tools, then call the model again without tools
//! 7. Persist the (user, assistant) pair
//!
//! The streaming variant runs the same pipeline on a spawned task and
//! reports progress on a channel.

use std::sync::Arc;

use souschef_config::AppConfig;
use souschef_core::event::ProgressEvent;
use souschef_core::index::VectorIndex;
use souschef_core::message::{Message, TenantId, Thread, ThreadId};
use souschef_core::provider::{Provider, ProviderRequest};
use souschef_core::store::ConversationStore;
use souschef_core::{Error, Result};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::normalizer::{normalize_image, PageFetcher, UrlEnricher};
use crate::prompt::PromptAssembler;
use crate::recipes::RecipeBook;
use crate::retrieval::{Retriever, DEFAULT_TOP_K};
use crate::token::TokenBudgeter;
use crate::tools::{self, RecipeTool};

/// Reply used when the model returns no text.
pub const FALLBACK_REPLY: &str = "No response generated";

pub const DEFAULT_CONTEXT_WINDOW: usize = 128_000;

/// One incoming user message.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub message: String,
    pub thread_id: Option<ThreadId>,
    /// Raw image bytes in any format the decoder understands.
    pub attachment: Option<Vec<u8>>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn in_thread(mut self, thread_id: ThreadId) -> Self {
        self.thread_id = Some(thread_id);
        self
    }

    pub fn with_attachment(mut self, bytes: Vec<u8>) -> Self {
        self.attachment = Some(bytes);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub content: String,
    pub thread_id: ThreadId,
}

/// Tunables for the orchestrator.
#[derive(Debug, Clone)]
pub struct AssistantSettings {
    pub model: String,
    pub embedding_model: String,
    pub temperature: Option<f32>,
    pub context_window: usize,
    pub top_k: usize,
    pub stream_buffer: usize,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o".into(),
            embedding_model: "text-embedding-3-small".into(),
            temperature: None,
            context_window: DEFAULT_CONTEXT_WINDOW,
            top_k: DEFAULT_TOP_K,
            stream_buffer: 128,
        }
    }
}

impl AssistantSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.provider.model.clone(),
            embedding_model: config.provider.embedding_model.clone(),
            temperature: config.provider.temperature,
            context_window: config.assistant.context_window,
            top_k: config.assistant.top_k,
            stream_buffer: config.assistant.stream_buffer.max(1),
        }
    }
}

/// External collaborators, injected at construction.
pub struct Collaborators {
    pub provider: Arc<dyn Provider>,
    pub index: Arc<dyn VectorIndex>,
    pub store: Arc<dyn ConversationStore>,
    pub fetcher: Arc<dyn PageFetcher>,
}

/// The conversation orchestrator. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Assistant {
    inner: Arc<Inner>,
}

struct Inner {
    provider: Arc<dyn Provider>,
    store: Arc<dyn ConversationStore>,
    retriever: Arc<Retriever>,
    book: RecipeBook,
    enricher: UrlEnricher,
    prompts: PromptAssembler,
    settings: AssistantSettings,
}

impl Assistant {
    pub fn new(
        collaborators: Collaborators,
        prompts: PromptAssembler,
        settings: AssistantSettings,
    ) -> Result<Self> {
        let Collaborators { provider, index, store, fetcher } = collaborators;
        let retriever = Arc::new(
            Retriever::new(provider.clone(), index, settings.embedding_model.clone())
                .with_top_k(settings.top_k),
        );

        Ok(Self {
            inner: Arc::new(Inner {
                provider,
                store,
                book: RecipeBook::new(retriever.clone()),
                retriever,
                enricher: UrlEnricher::new(fetcher)?,
                prompts,
                settings,
            }),
        })
    }

    pub fn recipes(&self) -> &RecipeBook {
        &self.inner.book
    }

    /// Process one turn and return the final reply.
    pub async fn chat(&self, tenant: &TenantId, request: ChatRequest) -> Result<ChatReply> {
        self.run_turn(tenant, request, &EventSink::discard()).await
    }

    /// Process one turn on a background task, reporting progress.
    ///
    /// The receiver yields status events, then either `response` and `end`,
    /// or a single `error`. Dropping the receiver does not cancel the turn.
    pub fn chat_stream(&self, tenant: TenantId, request: ChatRequest) -> mpsc::Receiver<ProgressEvent> {
        let (tx, rx) = mpsc::channel(self.inner.settings.stream_buffer);
        let assistant = self.clone();

        tokio::spawn(async move {
            let sink = EventSink::channel(tx);
            match assistant.run_turn(&tenant, request, &sink).await {
                Ok(reply) => {
                    sink.emit(ProgressEvent::Response {
                        content: reply.content,
                        thread_id: reply.thread_id.to_string(),
                    })
                    .await;
                    sink.emit(ProgressEvent::End).await;
                }
                Err(e) => {
                    error!(tenant = %tenant, error = %e, "Streaming turn failed");
                    sink.emit(ProgressEvent::Error { message: e.to_string() }).await;
                }
            }
        });

        rx
    }

    async fn run_turn(&self, tenant: &TenantId, request: ChatRequest, sink: &EventSink) -> Result<ChatReply> {
        let inner = &self.inner;

        sink.status("Initializing conversation...").await;
        let thread = self.resolve_thread(tenant, request.thread_id.as_ref()).await?;
        info!(
            tenant = %tenant,
            thread_id = thread.as_ref().map(|t| t.id.as_str()).unwrap_or("new"),
            history = thread.as_ref().map_or(0, |t| t.messages.len()),
            "Processing turn"
        );

        // ── Input normalization ──
        let text = if inner.enricher.contains_urls(&request.message) {
            sink.status("Extracting content from URLs...").await;
            inner.enricher.enrich(&request.message).await
        } else {
            request.message
        };

        let mut user = Message::user(text.clone());
        if let Some(bytes) = request.attachment {
            sink.status("Processing image attachment...").await;
            let image = tokio::task::spawn_blocking(move || normalize_image(&bytes))
                .await
                .map_err(|e| Error::Internal(format!("image task failed: {e}")))??;
            debug!(width = image.width, height = image.height, "Normalized image attachment");
            user = user.with_image(image.data_url());
        }

        // ── Retrieval ──
        sink.status("Searching your recipe database...").await;
        let recipes = inner.retriever.find_relevant(tenant, &text).await?;
        sink.emit(recipe_search_event(recipes.len())).await;

        // ── Model call #1 ──
        sink.status("Generating AI response...").await;
        let budgeter = inner.prompts.budgeter();
        let max_tokens = TokenBudgeter::remaining(inner.settings.context_window, budgeter.count_message(&user));
        let history = thread.as_ref().map(|t| t.messages.as_slice()).unwrap_or_default();
        let prompt = inner.prompts.build(history, &recipes, max_tokens);

        let mut messages = vec![Message::system(prompt), user.clone()];
        let first = inner
            .provider
            .complete(self.request(messages.clone()).with_tools(tools::definitions()))
            .await?;

        let reply = if first.message.tool_calls.is_empty() {
            first.message
        } else {
            // ── Tool dispatch ──
            debug!(tool_count = first.message.tool_calls.len(), "Executing tool calls");
            let calls = first.message.tool_calls.clone();
            messages.push(first.message);

            for call in &calls {
                let tool = RecipeTool::parse(call)?;
                if let Some(message) = tool.progress_message() {
                    sink.emit(ProgressEvent::ToolUse {
                        tool: tool.name().to_string(),
                        message: message.to_string(),
                    })
                    .await;
                }

                let outcome = tool.execute(&inner.book, tenant).await?;
                debug!(tool = tool.name(), "Tool call finished");

                if let Some(message) = tool.completion_message() {
                    sink.emit(ProgressEvent::ToolComplete {
                        tool: tool.name().to_string(),
                        message: message.to_string(),
                    })
                    .await;
                }
                messages.push(Message::tool_result(&call.id, outcome.content));
            }

            // ── Model call #2 ──
            sink.status("Finalizing response...").await;
            inner.provider.complete(self.request(messages)).await?.message
        };

        let content = if reply.content.trim().is_empty() {
            FALLBACK_REPLY.to_string()
        } else {
            reply.content
        };

        // ── Persistence ──
        let pair = [user, Message::assistant(content.clone())];
        let thread_id = match thread {
            Some(thread) => {
                inner.store.append_messages(&thread.id, &pair).await?;
                thread.id
            }
            None => inner.store.create_thread_with_messages(tenant, &pair).await?.id,
        };

        info!(tenant = %tenant, thread_id = %thread_id, "Turn complete");
        Ok(ChatReply { content, thread_id })
    }

    /// `None` means a new thread is created when the turn is persisted.
    async fn resolve_thread(&self, tenant: &TenantId, id: Option<&ThreadId>) -> Result<Option<Thread>> {
        let Some(id) = id else {
            return Ok(None);
        };

        match self.inner.store.get_thread(id).await? {
            Some(thread) if thread.is_owned_by(tenant) => Ok(Some(thread)),
            Some(_) => {
                // Same answer as a missing thread.
                info!(tenant = %tenant, thread_id = %id, "Rejected cross-tenant thread access");
                Err(Error::NotFound("Conversation not found".into()))
            }
            None => Err(Error::NotFound("Conversation not found".into())),
        }
    }

    fn request(&self, messages: Vec<Message>) -> ProviderRequest {
        let mut request = ProviderRequest::new(self.inner.settings.model.clone(), messages);
        request.temperature = self.inner.settings.temperature;
        request
    }
}

fn recipe_search_event(count: usize) -> ProgressEvent {
    let message = match count {
        0 => "No relevant recipes found in your database".to_string(),
        1 => "Found 1 relevant recipe".to_string(),
        n => format!("Found {n} relevant recipes"),
    };
    ProgressEvent::RecipeSearch { count, message }
}

/// Where progress events go. Send failures mean the consumer left; the
/// turn keeps running regardless.
struct EventSink {
    tx: Option<mpsc::Sender<ProgressEvent>>,
}

impl EventSink {
    fn discard() -> Self {
        Self { tx: None }
    }

    fn channel(tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    async fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).await.is_err() {
                debug!("Progress consumer disconnected");
            }
        }
    }

    async fn status(&self, message: &str) {
        self.emit(ProgressEvent::status(message)).await;
    }
}
