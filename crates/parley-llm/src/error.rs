use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Rate limited by upstream: {body}")]
    RateLimited { body: String },

    #[error("OpenAI API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Completion returned no message content")]
    EmptyResponse,

    #[error("Invalid client configuration: {0}")]
    Config(String),
}

impl LlmError {
    /// Whether the upstream asked us to slow down (HTTP 429)
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;
