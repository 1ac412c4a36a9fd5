//! # SousChef Core
//!
//! Domain types, traits, and error definitions for the SousChef recipe
//! assistant. This crate has no framework dependencies: it defines the
//! model every other crate implements against.
//!
//! The three external collaborators of a conversation turn are traits here:
//! - [`Provider`]: chat completion and embeddings
//! - [`VectorIndex`]: namespaced nearest-neighbour storage
//! - [`ConversationStore`]: durable thread logs
//!
//! Implementations live in their own crates and are injected into the
//! assistant, so tests can swap any of them for an in-process fake.

pub mod error;
pub mod event;
pub mod index;
pub mod message;
pub mod provider;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ErrorKind, Result};
pub use event::ProgressEvent;
pub use index::{IndexMatch, IndexRecord, VectorIndex};
pub use message::{Message, MessageToolCall, Role, TenantId, Thread, ThreadId};
pub use provider::{Provider, ProviderRequest, ProviderResponse};
pub use store::ConversationStore;
