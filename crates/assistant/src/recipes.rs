//! Knowledge mutator: validates, canonicalizes, embeds, and stores recipes.
//!
//! A recipe is any YAML mapping. Its canonical form is the mapping with
//! `recipe_id` stamped in, re-serialized. That text is both what gets
//! embedded and what retrieval returns.

use std::sync::Arc;

use serde_yaml::{Mapping, Value};
use souschef_core::index::IndexRecord;
use souschef_core::message::TenantId;
use souschef_core::{Error, Result};
use tracing::info;
use uuid::Uuid;

use crate::retrieval::Retriever;

pub struct RecipeBook {
    retriever: Arc<Retriever>,
}

impl RecipeBook {
    pub fn new(retriever: Arc<Retriever>) -> Self {
        Self { retriever }
    }

    /// Store a new recipe under a fresh id.
    pub async fn create(&self, raw: &str, tenant: &TenantId) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.upsert(&id, raw, tenant).await?;
        Ok(id)
    }

    /// Replace (or create) the recipe stored under `id`.
    ///
    /// Nothing is written unless `raw` parses as a YAML mapping and its
    /// embedding succeeds. The index write is a single upsert.
    pub async fn upsert(&self, id: &str, raw: &str, tenant: &TenantId) -> Result<()> {
        let canonical = canonicalize(id, raw)?;
        let values = self.retriever.embed(&canonical).await?;

        let namespace = tenant.namespace();
        self.retriever
            .index()
            .upsert(&namespace, IndexRecord {
                id: id.to_string(),
                values,
                contents: canonical,
            })
            .await?;

        info!(recipe_id = id, namespace = %namespace, "Recipe stored");
        Ok(())
    }
}

/// Parse `raw`, stamp `recipe_id: <id>`, and serialize back to YAML.
pub fn canonicalize(id: &str, raw: &str) -> Result<String> {
    let parsed: Value = serde_yaml::from_str(raw)
        .map_err(|e| Error::validation(format!("recipe is not valid YAML: {e}")))?;

    let Value::Mapping(mut recipe) = parsed else {
        return Err(Error::validation(format!(
            "recipe must be a YAML mapping, got {}",
            describe(&parsed)
        )));
    };

    stamp_id(&mut recipe, id);
    serde_yaml::to_string(&recipe)
        .map_err(|e| Error::Internal(format!("failed to serialize recipe: {e}")))
}

fn stamp_id(recipe: &mut Mapping, id: &str) {
    recipe.insert(Value::String("recipe_id".into()), Value::String(id.into()));
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "an empty document",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a plain string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
