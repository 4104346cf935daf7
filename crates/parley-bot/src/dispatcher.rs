use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::conversation::ConversationService;
use crate::error::ChatError;

pub const REJECTION_MESSAGE: &str =
    "Sorry, I can only process image attachments. Please send only image files.";

pub const APOLOGY_MESSAGE: &str =
    "Sorry, I encountered an error while processing your message. Please try again.";

/// A message event as delivered by the chat platform
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundEvent {
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    pub channel: String,
    pub ts: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub files: Vec<FileAttachment>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileAttachment {
    #[serde(default)]
    pub mimetype: String,
    #[serde(default)]
    pub url_private: String,
}

impl InboundEvent {
    /// Replies go under the root message; a root message starts its own thread
    pub fn thread_id(&self) -> &str {
        self.thread_ts.as_deref().unwrap_or(&self.ts)
    }

    pub fn is_bot_authored(&self) -> bool {
        self.subtype.as_deref() == Some("bot_message") || self.bot_id.is_some()
    }

    fn text(&self) -> Option<&str> {
        self.text.as_deref().filter(|text| !text.trim().is_empty())
    }
}

impl FileAttachment {
    pub fn is_image(&self) -> bool {
        self.mimetype.starts_with("image/")
    }
}

/// Posts a message into a thread
#[async_trait]
pub trait ReplyPoster: Send + Sync {
    async fn post_reply(&self, channel: &str, thread_ts: &str, text: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    BotMessage,
    ChannelNotAllowed,
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Ignored(IgnoreReason),
    /// Non-image attachment; fixed rejection posted
    Rejected,
    Replied,
    /// Reply failed; fixed apology posted
    Apologized,
}

pub struct Dispatcher {
    conversations: Arc<ConversationService>,
    poster: Arc<dyn ReplyPoster>,
    allowed_channels: Vec<String>,
}

impl Dispatcher {
    pub fn new(
        conversations: Arc<ConversationService>,
        poster: Arc<dyn ReplyPoster>,
        allowed_channels: Vec<String>,
    ) -> Self {
        Self {
            conversations,
            poster,
            allowed_channels,
        }
    }

    fn channel_allowed(&self, channel: &str) -> bool {
        self.allowed_channels.is_empty() || self.allowed_channels.iter().any(|c| c == channel)
    }

    /// Handle one inbound event end to end. Never fails: errors are logged
    /// and turned into a user-facing message.
    pub async fn dispatch(&self, event: InboundEvent) -> DispatchOutcome {
        if event.is_bot_authored() {
            return DispatchOutcome::Ignored(IgnoreReason::BotMessage);
        }

        if !self.channel_allowed(&event.channel) {
            tracing::debug!(channel = %event.channel, "Ignoring message from channel outside allow-list");
            return DispatchOutcome::Ignored(IgnoreReason::ChannelNotAllowed);
        }

        let channel = event.channel.as_str();
        let thread_id = event.thread_id();

        if event.files.iter().any(|file| !file.is_image()) {
            tracing::info!(channel, thread_id, "Rejecting non-image attachment");
            self.post(channel, thread_id, REJECTION_MESSAGE).await;
            return DispatchOutcome::Rejected;
        }

        let image_refs: Vec<String> = event
            .files
            .iter()
            .map(|file| file.url_private.clone())
            .collect();
        let text = event.text();

        if text.is_none() && image_refs.is_empty() {
            return DispatchOutcome::Ignored(IgnoreReason::Empty);
        }

        tracing::info!(
            channel,
            thread_id,
            images = image_refs.len(),
            has_text = text.is_some(),
            "Received message"
        );

        match self
            .conversations
            .build_reply(channel, thread_id, text, &image_refs)
            .await
        {
            Ok(reply) => {
                self.post(channel, thread_id, &reply).await;
                DispatchOutcome::Replied
            }
            Err(ChatError::Persistence { reply, source }) => {
                tracing::error!(
                    channel,
                    thread_id,
                    error = %source,
                    "Reply generated but conversation was not saved"
                );
                self.post(channel, thread_id, &reply).await;
                DispatchOutcome::Replied
            }
            Err(error) => {
                tracing::error!(channel, thread_id, %error, "Error handling message event");
                self.post(channel, thread_id, APOLOGY_MESSAGE).await;
                DispatchOutcome::Apologized
            }
        }
    }

    async fn post(&self, channel: &str, thread_id: &str, text: &str) {
        if let Err(error) = self.poster.post_reply(channel, thread_id, text).await {
            tracing::error!(channel, thread_id, error = %error, "Failed to post reply");
        }
    }
}
