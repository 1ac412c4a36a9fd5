//! Vector index backends for the recipe library.

pub mod in_memory;
pub mod pinecone;
pub mod vector;

pub use in_memory::InMemoryIndex;
pub use pinecone::PineconeIndex;
pub use vector::{cosine_similarity, rank_by_similarity};

use std::sync::Arc;
use std::time::Duration;

use souschef_config::IndexConfig;
use souschef_core::error::IndexError;
use souschef_core::VectorIndex;

/// Build the configured index backend.
pub fn build_from_config(config: &IndexConfig) -> Result<Arc<dyn VectorIndex>, IndexError> {
    match config.backend.as_str() {
        "in_memory" => Ok(Arc::new(InMemoryIndex::new())),
        "pinecone" => {
            let host = config.host.clone().ok_or_else(|| {
                IndexError::NotConfigured("index.host is required for pinecone".into())
            })?;
            let api_key = config.api_key.clone().ok_or_else(|| {
                IndexError::NotConfigured("no API key; set index.api_key or PINECONE_API_KEY".into())
            })?;
            let index = PineconeIndex::new(host, api_key, Duration::from_secs(config.timeout_secs))?;
            Ok(Arc::new(index))
        }
        other => Err(IndexError::NotConfigured(format!("unknown index backend \"{other}\""))),
    }
}
