//! Conversation store trait: durable, tenant-owned thread logs.

use async_trait::async_trait;
use crate::error::StoreError;
use crate::message::{Message, TenantId, Thread, ThreadId};

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Load a thread with its messages, oldest first. `None` if unknown.
    async fn get_thread(&self, id: &ThreadId) -> Result<Option<Thread>, StoreError>;

    /// Create an empty thread owned by `tenant`.
    async fn create_thread(&self, tenant: &TenantId) -> Result<Thread, StoreError>;

    /// Create a thread owned by `tenant` holding `messages`, in one
    /// transaction. On error neither the thread nor any message exists.
    async fn create_thread_with_messages(
        &self,
        tenant: &TenantId,
        messages: &[Message],
    ) -> Result<Thread, StoreError>;

    /// Append messages in one transaction: all of them land or none do.
    async fn append_messages(&self, id: &ThreadId, messages: &[Message]) -> Result<(), StoreError>;
}
