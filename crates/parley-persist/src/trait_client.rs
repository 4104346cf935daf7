use async_trait::async_trait;
use crate::models::Conversation;
use crate::error::Result;

/// Storage for per-thread conversation records
///
/// Records are looked up by `thread_id` only. Writes replace the whole
/// record (last write wins); callers that need read-modify-write atomicity
/// per thread must serialize themselves.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Load the record for a thread, if one was ever saved
    async fn find_conversation(&self, thread_id: &str) -> Result<Option<Conversation>>;

    /// Insert or replace the record keyed by `conversation.thread_id`
    async fn upsert_conversation(&self, conversation: &Conversation) -> Result<()>;
}
