//! Conversation store implementations for SousChef.

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use std::sync::Arc;

use souschef_config::StoreConfig;
use souschef_core::error::StoreError;
use souschef_core::ConversationStore;

/// Build the configured store backend.
pub async fn build_from_config(config: &StoreConfig) -> Result<Arc<dyn ConversationStore>, StoreError> {
    match config.backend.as_str() {
        "in_memory" => Ok(Arc::new(InMemoryStore::new())),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let url = config.resolved_database_url();
            if let Some(parent) = url
                .strip_prefix("sqlite://")
                .map(std::path::Path::new)
                .and_then(std::path::Path::parent)
            {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| StoreError::Storage(format!("{}: {e}", parent.display())))?;
                }
            }
            Ok(Arc::new(SqliteStore::new(&url).await?))
        }
        other => Err(StoreError::Storage(format!("unsupported store backend \"{other}\""))),
    }
}
