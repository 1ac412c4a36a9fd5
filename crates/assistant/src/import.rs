//! Bulk recipe import from an uploaded YAML file.
//!
//! Accepted shapes:
//! - one document with a `recipes:` list of `{recipe: ...}` entries
//! - one document with a top-level `recipe:` key
//! - several `---`-separated documents, each a `{recipe: ...}` entry
//!
//! Valid entries go through [`RecipeBook::create`]; the rest are reported
//! per entry and do not stop the import.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use souschef_core::message::TenantId;
use tracing::{info, warn};

use crate::recipes::RecipeBook;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub success: bool,
    pub message: String,
    pub recipes_added: usize,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Whether `filename` looks like a YAML file.
pub fn is_yaml_filename(filename: &str) -> bool {
    filename.ends_with(".yaml") || filename.ends_with(".yml")
}

/// Import every recipe in `source` into the tenant's library.
pub async fn import_recipes(book: &RecipeBook, tenant: &TenantId, source: &str) -> ImportReport {
    let mut errors = Vec::new();
    let mut added = 0;

    match parse_documents(source) {
        Ok(documents) => {
            let entries = collect_entries(documents, &mut errors);
            for (i, entry) in entries.into_iter().enumerate() {
                let n = i + 1;
                if !entry.is_mapping() {
                    errors.push(format!("Recipe {n}: Must be an object"));
                    continue;
                }
                if entry.get("recipe").is_none() {
                    errors.push(format!("Recipe {n}: Missing 'recipe' key"));
                    continue;
                }

                let created = match serde_yaml::to_string(&entry) {
                    Ok(raw) => book.create(&raw, tenant).await.map_err(|e| e.to_string()),
                    Err(e) => Err(e.to_string()),
                };
                match created {
                    Ok(id) => {
                        added += 1;
                        info!(recipe_id = %id, entry = n, "Imported recipe");
                    }
                    Err(e) => {
                        warn!(entry = n, error = %e, "Recipe import failed");
                        errors.push(format!("Recipe {n}: {e}"));
                    }
                }
            }
        }
        Err(e) => errors.push(format!("YAML parsing error: {e}")),
    }

    report(added, errors)
}

fn parse_documents(source: &str) -> Result<Vec<Value>, serde_yaml::Error> {
    serde_yaml::Deserializer::from_str(source)
        .map(Value::deserialize)
        .collect()
}

/// Flatten the accepted document shapes into a list of recipe entries.
fn collect_entries(mut documents: Vec<Value>, errors: &mut Vec<String>) -> Vec<Value> {
    if documents.len() != 1 {
        return documents;
    }

    let document = documents.remove(0);
    if !document.is_mapping() {
        errors.push("Invalid format: YAML document must be an object".into());
        return Vec::new();
    }

    if let Some(Value::Sequence(recipes)) = document.get("recipes") {
        recipes.clone()
    } else if document.get("recipe").is_some() {
        vec![document]
    } else {
        errors.push("Invalid format: YAML must contain 'recipe' or 'recipes' key".into());
        Vec::new()
    }
}

fn report(added: usize, errors: Vec<String>) -> ImportReport {
    if added == 0 {
        return ImportReport {
            success: false,
            message: "No recipes were imported".into(),
            recipes_added: 0,
            errors,
        };
    }

    let mut message = format!("Successfully imported {added} {}", plural(added, "recipe"));
    if !errors.is_empty() {
        message.push_str(&format!(" with {} {}", errors.len(), plural(errors.len(), "error")));
    }
    ImportReport {
        success: true,
        message,
        recipes_added: added,
        errors,
    }
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 { noun.to_string() } else { format!("{noun}s") }
}
