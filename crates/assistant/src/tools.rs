//! The two knowledge-base tools the model may call during a turn.

use serde::Deserialize;
use serde_json::json;
use souschef_core::error::ToolError;
use souschef_core::message::{MessageToolCall, TenantId};
use souschef_core::provider::ToolDefinition;
use souschef_core::Result;

use crate::recipes::RecipeBook;

pub const ADD_RECIPE: &str = "add_recipe";
pub const UPDATE_RECIPE: &str = "update_recipe";

/// A parsed tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum RecipeTool {
    Add { recipe_yaml: String },
    Update { recipe_id: String, recipe_yaml: String },
    Unsupported { name: String },
}

#[derive(Deserialize)]
struct AddArgs {
    #[serde(alias = "recipe_text")]
    recipe_yaml: String,
}

#[derive(Deserialize)]
struct UpdateArgs {
    recipe_id: String,
    #[serde(alias = "recipe_text")]
    recipe_yaml: String,
}

/// What a finished tool call hands back to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub content: String,
}

impl RecipeTool {
    /// Decode a model-issued call. Unknown names are not an error here;
    /// malformed arguments for a known tool are.
    pub fn parse(call: &MessageToolCall) -> std::result::Result<Self, ToolError> {
        match call.name.as_str() {
            ADD_RECIPE => {
                let args: AddArgs = decode(call)?;
                Ok(Self::Add { recipe_yaml: args.recipe_yaml })
            }
            UPDATE_RECIPE => {
                let args: UpdateArgs = decode(call)?;
                Ok(Self::Update {
                    recipe_id: args.recipe_id,
                    recipe_yaml: args.recipe_yaml,
                })
            }
            other => Ok(Self::Unsupported { name: other.to_string() }),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Add { .. } => ADD_RECIPE,
            Self::Update { .. } => UPDATE_RECIPE,
            Self::Unsupported { name } => name,
        }
    }

    /// Progress text shown before the tool runs; `None` for unknown tools.
    pub fn progress_message(&self) -> Option<&'static str> {
        match self {
            Self::Add { .. } => Some("Adding new recipe to your database..."),
            Self::Update { .. } => Some("Updating existing recipe in your database..."),
            Self::Unsupported { .. } => None,
        }
    }

    pub fn completion_message(&self) -> Option<&'static str> {
        match self {
            Self::Add { .. } => Some("✅ Recipe added successfully!"),
            Self::Update { .. } => Some("✅ Recipe updated successfully!"),
            Self::Unsupported { .. } => None,
        }
    }

    /// Run against the caller's recipe book.
    pub async fn execute(&self, book: &RecipeBook, tenant: &TenantId) -> Result<ToolOutcome> {
        let content = match self {
            Self::Add { recipe_yaml } => {
                let recipe_id = book.create(recipe_yaml, tenant).await?;
                json!({ "recipe_id": recipe_id }).to_string()
            }
            Self::Update { recipe_id, recipe_yaml } => {
                book.upsert(recipe_id, recipe_yaml, tenant).await?;
                json!({ "status": "success" }).to_string()
            }
            Self::Unsupported { name } => ToolError::Unsupported(name.clone()).to_string(),
        };
        Ok(ToolOutcome { content })
    }
}

fn decode<T: for<'de> Deserialize<'de>>(call: &MessageToolCall) -> std::result::Result<T, ToolError> {
    serde_json::from_str(&call.arguments).map_err(|e| ToolError::InvalidArguments {
        tool_name: call.name.clone(),
        reason: e.to_string(),
    })
}

/// Tool definitions offered to the model on the first call of a turn.
pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: ADD_RECIPE.into(),
            description: "Adds a recipe to our recipe library".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "recipe_yaml": {
                        "type": "string",
                        "description": "The full recipe as a YAML document"
                    }
                },
                "required": ["recipe_yaml"]
            }),
        },
        ToolDefinition {
            name: UPDATE_RECIPE.into(),
            description: "Updates an existing recipe to our recipe library".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "recipe_id": {
                        "type": "string",
                        "description": "The recipe_id of the recipe being replaced"
                    },
                    "recipe_yaml": {
                        "type": "string",
                        "description": "The complete updated recipe as a YAML document"
                    }
                },
                "required": ["recipe_id", "recipe_yaml"]
            }),
        },
    ]
}
