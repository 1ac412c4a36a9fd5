//! `souschef chat`: one conversation turn from the terminal.

use std::path::PathBuf;

use souschef_assistant::{build_assistant, ChatRequest};
use souschef_config::AppConfig;
use souschef_core::event::ProgressEvent;
use souschef_core::message::{TenantId, ThreadId};

pub struct ChatArgs {
    pub tenant: String,
    pub message: String,
    pub thread: Option<String>,
    pub image: Option<PathBuf>,
    pub stream: bool,
}

pub async fn run(config: AppConfig, args: ChatArgs) -> Result<(), Box<dyn std::error::Error>> {
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set OPENAI_API_KEY (or SOUSCHEF_API_KEY), or add provider.api_key to:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let assistant = build_assistant(&config).await?;
    let tenant = TenantId::from(args.tenant.as_str());

    let mut request = ChatRequest::new(args.message);
    if let Some(thread) = args.thread {
        request = request.in_thread(ThreadId::from(thread.as_str()));
    }
    if let Some(path) = args.image {
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| format!("Failed to read image {}: {e}", path.display()))?;
        request = request.with_attachment(bytes);
    }

    if !args.stream {
        let reply = assistant.chat(&tenant, request).await?;
        println!("{}", reply.content);
        eprintln!("\n(thread: {})", reply.thread_id);
        return Ok(());
    }

    let mut events = assistant.chat_stream(tenant, request);
    while let Some(event) = events.recv().await {
        match event {
            ProgressEvent::Status { message }
            | ProgressEvent::RecipeSearch { message, .. }
            | ProgressEvent::ToolUse { message, .. }
            | ProgressEvent::ToolComplete { message, .. } => eprintln!("  … {message}"),
            ProgressEvent::Response { content, thread_id } => {
                println!("{content}");
                eprintln!("\n(thread: {thread_id})");
            }
            ProgressEvent::Error { message } => return Err(message.into()),
            ProgressEvent::End => break,
        }
    }

    Ok(())
}
