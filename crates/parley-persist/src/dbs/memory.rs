use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{PersistError, Result};
use crate::models::Conversation;
use crate::trait_client::ConversationStore;

/// Process-local store, used when no database is wired in (tests, local runs)
#[derive(Default)]
pub struct InMemoryConversationStore {
    records: RwLock<HashMap<String, Conversation>>,
    upserts: AtomicUsize,
    fail_upserts: AtomicBool,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record as if it had been saved earlier
    pub async fn insert(&self, conversation: Conversation) {
        self.records
            .write()
            .await
            .insert(conversation.thread_id.clone(), conversation);
    }

    pub async fn get(&self, thread_id: &str) -> Option<Conversation> {
        self.records.read().await.get(thread_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Number of successful upserts so far
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    /// Make every following upsert fail with an internal error
    pub fn fail_upserts(&self, fail: bool) {
        self.fail_upserts.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn find_conversation(&self, thread_id: &str) -> Result<Option<Conversation>> {
        Ok(self.get(thread_id).await)
    }

    async fn upsert_conversation(&self, conversation: &Conversation) -> Result<()> {
        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(PersistError::Internal("upsert rejected".to_string()));
        }
        self.records
            .write()
            .await
            .insert(conversation.thread_id.clone(), conversation.clone());
        self.upserts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
