mod conversation;

pub use conversation::{Conversation, ContentBlock, ImageRef, Role, Turn, DEFAULT_MAX_MESSAGES};
