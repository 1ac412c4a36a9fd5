//! In-memory store: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use souschef_core::error::StoreError;
use souschef_core::message::{Message, TenantId, Thread, ThreadId};
use souschef_core::store::ConversationStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct InMemoryStore {
    threads: Arc<RwLock<HashMap<ThreadId, Thread>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            threads: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn thread_count(&self) -> usize {
        self.threads.read().await.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn get_thread(&self, id: &ThreadId) -> Result<Option<Thread>, StoreError> {
        Ok(self.threads.read().await.get(id).cloned())
    }

    async fn create_thread(&self, tenant: &TenantId) -> Result<Thread, StoreError> {
        let thread = Thread::new(tenant.clone());
        self.threads
            .write()
            .await
            .insert(thread.id.clone(), thread.clone());
        Ok(thread)
    }

    async fn create_thread_with_messages(
        &self,
        tenant: &TenantId,
        messages: &[Message],
    ) -> Result<Thread, StoreError> {
        let mut thread = Thread::new(tenant.clone());
        thread.messages.extend_from_slice(messages);
        self.threads
            .write()
            .await
            .insert(thread.id.clone(), thread.clone());
        Ok(thread)
    }

    async fn append_messages(&self, id: &ThreadId, messages: &[Message]) -> Result<(), StoreError> {
        // One write guard covers the whole batch.
        let mut threads = self.threads.write().await;
        let thread = threads
            .get_mut(id)
            .ok_or_else(|| StoreError::QueryFailed(format!("thread {id} does not exist")))?;
        thread.messages.extend_from_slice(messages);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_and_load_thread() {
        let store = InMemoryStore::new();
        let thread = store.create_thread(&TenantId::from("u1")).await.unwrap();

        let loaded = store.get_thread(&thread.id).await.unwrap().unwrap();
        assert_eq!(loaded.tenant, TenantId::from("u1"));
        assert!(loaded.messages.is_empty());
    }

    #[tokio::test]
    async fn append_preserves_order() {
        let store = InMemoryStore::new();
        let thread = store.create_thread(&TenantId::from("u1")).await.unwrap();
        store
            .append_messages(&thread.id, &[Message::user("hi"), Message::assistant("hello")])
            .await
            .unwrap();
        store
            .append_messages(&thread.id, &[Message::user("soup?"), Message::assistant("yes")])
            .await
            .unwrap();

        let loaded = store.get_thread(&thread.id).await.unwrap().unwrap();
        let contents: Vec<&str> = loaded.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["hi", "hello", "soup?", "yes"]);
    }

    #[tokio::test]
    async fn create_with_messages() {
        let store = InMemoryStore::new();
        let thread = store
            .create_thread_with_messages(&TenantId::from("u1"), &[Message::user("hi"), Message::assistant("hello")])
            .await
            .unwrap();

        let loaded = store.get_thread(&thread.id).await.unwrap().unwrap();
        assert_eq!(loaded.tenant, TenantId::from("u1"));
        assert_eq!(loaded.messages.len(), 2);
        assert_eq!(store.thread_count().await, 1);
    }

    #[tokio::test]
    async fn unknown_thread() {
        let store = InMemoryStore::new();
        assert!(store.get_thread(&ThreadId::from("nope")).await.unwrap().is_none());
        assert!(store
            .append_messages(&ThreadId::from("nope"), &[Message::user("x")])
            .await
            .is_err());
    }
}
