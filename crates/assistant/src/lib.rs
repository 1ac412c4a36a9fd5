//! Conversation orchestration for SousChef.
//!
//! [`Assistant`] runs one turn of a tenant's conversation: URL and image
//! normalization, recipe retrieval, token-budgeted prompt assembly, the
//! model call with recipe tools, and persistence. Recipes themselves are
//! managed through [`RecipeBook`], either by the model's tool calls or by
//! [`import_recipes`].

pub mod bootstrap;
pub mod import;
pub mod normalizer;
pub mod orchestrator;
pub mod prompt;
pub mod recipes;
pub mod retrieval;
pub mod token;
pub mod tools;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use bootstrap::build_assistant;
pub use import::{import_recipes, is_yaml_filename, ImportReport};
pub use orchestrator::{Assistant, AssistantSettings, ChatReply, ChatRequest, Collaborators, FALLBACK_REPLY};
pub use prompt::PromptAssembler;
pub use recipes::RecipeBook;
pub use retrieval::Retriever;
pub use token::TokenBudgeter;
