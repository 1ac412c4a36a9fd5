//! Request handlers.

use std::convert::Infallible;

use axum::{
    extract::{Multipart, State},
    response::{
        sse::{Event as SseEvent, Sse},
        Json,
    },
    Extension,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use souschef_assistant::{import_recipes, is_yaml_filename, ChatRequest, ImportReport};
use souschef_core::message::{TenantId, ThreadId};
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use crate::error::ApiError;
use crate::SharedState;

/// The JSON carried in the `message` form field.
#[derive(Debug, Deserialize)]
pub struct MessagePayload {
    pub message: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub response: String,
    pub thread_id: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /chat`: one turn, answered when complete.
pub async fn chat_handler(
    State(state): State<SharedState>,
    Extension(tenant): Extension<TenantId>,
    multipart: Multipart,
) -> Result<Json<MessageResponse>, ApiError> {
    let request = read_chat_form(multipart).await?;
    info!(tenant = %tenant, has_attachment = request.attachment.is_some(), "Chat request");

    let reply = state.assistant.chat(&tenant, request).await?;
    Ok(Json(MessageResponse {
        response: reply.content,
        thread_id: reply.thread_id.to_string(),
    }))
}

/// `POST /chat/stream`: one turn, reported as server-sent events.
pub async fn chat_stream_handler(
    State(state): State<SharedState>,
    Extension(tenant): Extension<TenantId>,
    multipart: Multipart,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let request = read_chat_form(multipart).await?;
    info!(tenant = %tenant, has_attachment = request.attachment.is_some(), "Streaming chat request");

    let rx = state.assistant.chat_stream(tenant, request);
    let stream = ReceiverStream::new(rx).map(|event| Ok(SseEvent::default().data(event.to_json())));

    Ok(Sse::new(stream))
}

/// `POST /recipes/bulk-upload`: import every recipe in a YAML file.
pub async fn bulk_upload_handler(
    State(state): State<SharedState>,
    Extension(tenant): Extension<TenantId>,
    mut multipart: Multipart,
) -> Result<Json<ImportReport>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.map_err(malformed)?;
            upload = Some((filename, bytes));
        }
    }

    let (filename, bytes) = upload.ok_or_else(|| ApiError::bad_request("Missing 'file' field"))?;
    if !is_yaml_filename(&filename) {
        return Err(ApiError::bad_request("File must be a YAML file (.yaml or .yml)"));
    }
    let source = std::str::from_utf8(&bytes)
        .map_err(|_| ApiError::bad_request("File must be valid UTF-8 encoded text"))?;

    info!(tenant = %tenant, filename = %filename, bytes = bytes.len(), "Bulk recipe upload");
    let report = import_recipes(state.assistant.recipes(), &tenant, source).await;
    Ok(Json(report))
}

/// Read the `message` JSON field and optional `attachment` file.
async fn read_chat_form(mut multipart: Multipart) -> Result<ChatRequest, ApiError> {
    let mut message = None;
    let mut attachment = None;

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("message") => message = Some(field.text().await.map_err(malformed)?),
            Some("attachment") => {
                let bytes = field.bytes().await.map_err(malformed)?;
                if !bytes.is_empty() {
                    attachment = Some(bytes.to_vec());
                }
            }
            _ => {}
        }
    }

    let message = message.ok_or_else(|| ApiError::bad_request("Missing 'message' field"))?;
    let payload: MessagePayload =
        serde_json::from_str(&message).map_err(|_| ApiError::bad_request("Invalid JSON payload"))?;

    Ok(ChatRequest {
        message: payload.message,
        thread_id: payload.thread_id.map(|id| ThreadId::from(id.as_str())),
        attachment,
    })
}

fn malformed(e: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::new(e.status(), e.body_text())
}
