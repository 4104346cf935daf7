use async_trait::async_trait;
use mongodb::{bson::doc, options::IndexOptions, Collection, Database, IndexModel};

use crate::error::Result;
use crate::models::Conversation;
use crate::trait_client::ConversationStore;

#[derive(Clone)]
pub struct MongoConversationStore {
    collection: Collection<Conversation>,
}

impl MongoConversationStore {
    pub fn new(database: &Database, collection: &str) -> Self {
        let collection = database.collection(collection);
        Self { collection }
    }

    /// Unique index on `thread_id`, the only lookup key
    pub async fn ensure_indexes(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "thread_id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        self.collection.create_index(index).await?;
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for MongoConversationStore {
    async fn find_conversation(&self, thread_id: &str) -> Result<Option<Conversation>> {
        let filter = doc! { "thread_id": thread_id };
        Ok(self.collection.find_one(filter).await?)
    }

    async fn upsert_conversation(&self, conversation: &Conversation) -> Result<()> {
        let filter = doc! { "thread_id": &conversation.thread_id };
        let result = self
            .collection
            .replace_one(filter, conversation)
            .upsert(true)
            .await?;

        tracing::debug!(
            thread_id = %conversation.thread_id,
            matched = result.matched_count,
            upserted = result.upserted_id.is_some(),
            turns = conversation.messages.len(),
            "Conversation saved"
        );
        Ok(())
    }
}
