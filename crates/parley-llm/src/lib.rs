pub mod types;
pub mod traits;
pub mod config;
pub mod error;
pub mod retry;
pub mod openai;

pub use traits::{ChatClient, ChatRequest, ChatResponse, ChatOptions, TokenUsage};
pub use config::{ClientFactory, OpenAIConfig};
pub use error::LlmError;
pub use retry::{Backoff, RetryPolicy};
pub use openai::OpenAIClient;
pub use types::{Message, MessageRole, Content, ContentPart, ImageUrl};
