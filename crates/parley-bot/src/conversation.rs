use std::sync::Arc;

use futures::future::try_join_all;
use parley_llm::{ChatClient, ChatOptions, ChatRequest, LlmError, Message, RetryPolicy};
use parley_persist::{ContentBlock, Conversation, ConversationStore, Turn, DEFAULT_MAX_MESSAGES};

use crate::error::ChatError;
use crate::images::ImageResolver;
use crate::locks::ThreadLocks;

/// Completion and history parameters applied to every reply
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Turns kept per thread
    pub max_history: usize,
    pub retry: RetryPolicy,
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4.1".to_string(),
            max_tokens: 4096,
            temperature: 0.7,
            max_history: DEFAULT_MAX_MESSAGES,
            retry: RetryPolicy::default(),
        }
    }
}

/// Builds replies from a thread's stored history and keeps that history current
pub struct ConversationService {
    store: Arc<dyn ConversationStore>,
    llm: Arc<dyn ChatClient>,
    images: Arc<dyn ImageResolver>,
    settings: ConversationSettings,
    locks: ThreadLocks,
}

impl ConversationService {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        llm: Arc<dyn ChatClient>,
        images: Arc<dyn ImageResolver>,
        settings: ConversationSettings,
    ) -> Self {
        Self {
            store,
            llm,
            images,
            settings,
            locks: ThreadLocks::new(),
        }
    }

    /// Append the user's turn to the thread, ask the model, store both turns
    /// and return the assistant's reply.
    ///
    /// Calls for the same `thread_id` are serialized.
    pub async fn build_reply(
        &self,
        channel: &str,
        thread_id: &str,
        user_text: Option<&str>,
        image_refs: &[String],
    ) -> Result<String, ChatError> {
        // Stored as sent; blank text counts as absent
        let user_text = user_text.filter(|text| !text.trim().is_empty());
        if user_text.is_none() && image_refs.is_empty() {
            return Err(ChatError::EmptyInput);
        }

        let _guard = self.locks.lock(thread_id).await;

        let mut conversation = match self
            .store
            .find_conversation(thread_id)
            .await
            .map_err(ChatError::Load)?
        {
            Some(conversation) => conversation,
            None => {
                tracing::debug!(thread_id, channel, "Starting new conversation");
                Conversation::new(thread_id, channel)
            }
        };

        let content = self.user_content(user_text, image_refs).await?;
        conversation.push_turn(Turn::user(content), self.settings.max_history);

        let reply = self.complete(&conversation).await?;

        conversation.push_turn(Turn::assistant(reply.clone()), self.settings.max_history);
        conversation.touch();

        if let Err(source) = self.store.upsert_conversation(&conversation).await {
            return Err(ChatError::Persistence { reply, source });
        }

        tracing::info!(
            thread_id,
            turns = conversation.messages.len(),
            "Conversation updated"
        );

        Ok(reply)
    }

    /// Images first, then text
    async fn user_content(
        &self,
        user_text: Option<&str>,
        image_refs: &[String],
    ) -> Result<Vec<ContentBlock>, ChatError> {
        let resolved = try_join_all(
            image_refs
                .iter()
                .map(|reference| self.images.resolve(reference)),
        )
        .await?;

        let mut content: Vec<ContentBlock> =
            resolved.into_iter().map(ContentBlock::image).collect();
        if let Some(text) = user_text {
            content.push(ContentBlock::text(text));
        }
        Ok(content)
    }

    async fn complete(&self, conversation: &Conversation) -> Result<String, ChatError> {
        let messages: Vec<Message> = conversation.messages.iter().map(Message::from).collect();
        let options = ChatOptions::new()
            .max_tokens(self.settings.max_tokens)
            .temperature(self.settings.temperature);

        let response = self
            .settings
            .retry
            .run(
                |attempt| {
                    tracing::debug!(
                        attempt,
                        model = %self.settings.model,
                        messages = messages.len(),
                        "Requesting completion"
                    );
                    let request = ChatRequest::new(self.settings.model.clone(), messages.clone())
                        .with_options(options.clone());
                    self.llm.chat(request)
                },
                LlmError::is_rate_limit,
            )
            .await?;

        if response.finish_reason.as_deref() == Some("length") {
            tracing::warn!(
                max_tokens = self.settings.max_tokens,
                "Reply was cut off at the token limit"
            );
        }

        if let Some(usage) = &response.usage {
            tracing::debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "Completion usage"
            );
        }

        response
            .content
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
            .ok_or(ChatError::Completion(LlmError::EmptyResponse))
    }
}
