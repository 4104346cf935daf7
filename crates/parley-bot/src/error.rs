use parley_llm::LlmError;
use parley_persist::PersistError;
use thiserror::Error;

use crate::images::ImageError;

/// Failures of one `build_reply` call
///
/// None of these reach the end user verbatim; the dispatcher logs them and
/// posts a fixed apology instead.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Nothing to send: message has neither text nor images")]
    EmptyInput,

    #[error("Failed to load conversation: {0}")]
    Load(#[source] PersistError),

    #[error("Failed to process conversation: {0}")]
    ConversationBuild(#[from] ImageError),

    #[error("Failed to generate reply: {0}")]
    Completion(#[from] LlmError),

    /// The reply was generated but the updated history was not saved
    #[error("Failed to save conversation: {source}")]
    Persistence {
        reply: String,
        #[source]
        source: PersistError,
    },
}

impl ChatError {
    /// A reply that was produced before the failure and can still be delivered
    pub fn recovered_reply(&self) -> Option<&str> {
        match self {
            Self::Persistence { reply, .. } => Some(reply),
            _ => None,
        }
    }
}
