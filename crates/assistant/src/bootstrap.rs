//! Wire an [`Assistant`] from configuration.

use std::sync::Arc;

use souschef_config::AppConfig;
use souschef_core::{Error, Result};
use tracing::info;

use crate::normalizer::HttpFetcher;
use crate::orchestrator::{Assistant, AssistantSettings, Collaborators};
use crate::prompt::{PromptAssembler, DEFAULT_TEMPLATE};
use crate::token::TokenBudgeter;

/// Build the provider, index, store, and fetcher named by `config` and
/// assemble them into an assistant.
pub async fn build_assistant(config: &AppConfig) -> Result<Assistant> {
    let provider = souschef_providers::build_from_config(&config.provider)?;
    let index = souschef_index::build_from_config(&config.index)?;
    let store = souschef_store::build_from_config(&config.store).await?;
    let fetcher = Arc::new(HttpFetcher::new(&config.extraction)?);

    let budgeter = TokenBudgeter::from_name(&config.assistant.tokenizer)?;
    let template = match &config.assistant.system_prompt_path {
        Some(path) => tokio::fs::read_to_string(path).await.map_err(|e| Error::Config {
            message: format!("failed to read system prompt {}: {e}", path.display()),
        })?,
        None => DEFAULT_TEMPLATE.to_string(),
    };

    info!(
        provider = provider.name(),
        index = index.name(),
        model = %config.provider.model,
        tokenizer = %config.assistant.tokenizer,
        "Assistant ready"
    );

    Assistant::new(
        Collaborators { provider, index, store, fetcher },
        PromptAssembler::new(template, budgeter),
        AssistantSettings::from_config(config),
    )
}
