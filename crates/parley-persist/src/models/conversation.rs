use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// History window kept per thread unless configured otherwise
pub const DEFAULT_MAX_MESSAGES: usize = 50;

/// One conversation per chat thread, keyed by `thread_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub thread_id: String,
    pub channel_id: String,
    #[serde(default)]
    pub messages: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Stored in the same shape the chat completions API accepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ImageUrl { image_url: ImageRef },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    /// `data:<mime>;base64,<payload>`
    pub url: String,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(data_uri: impl Into<String>) -> Self {
        Self::ImageUrl {
            image_url: ImageRef { url: data_uri.into() },
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::ImageUrl { .. } => None,
        }
    }
}

impl Turn {
    pub fn user(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// Concatenated text blocks, images skipped
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Conversation {
    /// Fresh, empty record for a thread seen for the first time
    pub fn new(thread_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            thread_id: thread_id.into(),
            channel_id: channel_id.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a turn, then drop the oldest turns beyond `max_messages`
    pub fn push_turn(&mut self, turn: Turn, max_messages: usize) {
        self.messages.push(turn);
        self.truncate_history(max_messages);
    }

    /// Keep only the most recent `max_messages` turns
    pub fn truncate_history(&mut self, max_messages: usize) {
        if self.messages.len() > max_messages {
            let excess = self.messages.len() - max_messages;
            self.messages.drain(..excess);
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// Conversion: Turn → parley_llm::Message
impl From<&Turn> for parley_llm::Message {
    fn from(turn: &Turn) -> Self {
        match turn.role {
            Role::User => {
                let parts = turn
                    .content
                    .iter()
                    .map(|block| match block {
                        ContentBlock::Text { text } => parley_llm::ContentPart::text(text.clone()),
                        ContentBlock::ImageUrl { image_url } => {
                            parley_llm::ContentPart::image_url(image_url.url.clone())
                        }
                    })
                    .collect::<Vec<_>>();
                parley_llm::Message::user(parley_llm::Content::Parts(parts))
            }
            Role::Assistant => parley_llm::Message::assistant(turn.text()),
        }
    }
}
