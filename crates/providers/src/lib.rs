//! Language-model provider implementations for SousChef.
//!
//! All providers implement the `souschef_core::Provider` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use std::sync::Arc;

use souschef_config::ProviderConfig;
use souschef_core::error::ProviderError;
use souschef_core::Provider;

/// Build the configured provider.
pub fn build_from_config(config: &ProviderConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = config.api_key.clone().ok_or_else(|| {
        ProviderError::NotConfigured(
            "no API key; set provider.api_key or OPENAI_API_KEY".into(),
        )
    })?;

    let provider = OpenAiCompatProvider::new(
        "openai",
        &config.api_url,
        api_key,
        std::time::Duration::from_secs(config.timeout_secs),
    )?;
    Ok(Arc::new(provider))
}
